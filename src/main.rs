mod action;
mod api;
mod app;
mod auth;
mod config;
mod deferred;
mod effects;
mod error;
mod event;
mod members;
mod package_create;
mod reconcile;
mod reducer;
mod settings;
mod store;
mod tui;
mod types;
mod ui;

use std::panic;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::action::{Action, Route};
use crate::api::BuilderClient;
use crate::app::App;
use crate::config::Config;
use crate::effects::ApiEffects;
use crate::event::Event;
use crate::store::Store;
use crate::tui::EventHandler;

/// Terminal console for Builder project settings
#[derive(Debug, Parser)]
#[command(name = "bldr", version, about)]
struct Cli {
    /// Origin that owns the package
    #[arg(long)]
    origin: String,

    /// Package whose settings to open
    #[arg(long)]
    package: String,

    /// Open the connection form for this target (linux, linux-kernel2, windows)
    #[arg(long)]
    target: Option<String>,

    /// Alternate config file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };

    let token = auth::load_token(&config.builder)?;
    let client = BuilderClient::new(
        config.builder_api_url(),
        token.clone(),
        config.github.api_url.clone(),
        config.github_token(),
    )?;

    // Set up panic hook to restore terminal
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = tui::restore();
        original_hook(panic_info);
    }));

    let result = run(cli, config, client, token).await;

    tui::restore()?;

    result
}

async fn run(
    cli: Cli,
    config: Config,
    client: BuilderClient,
    token: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut terminal = tui::init()?;

    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<Action>();
    let store = Store::new(ApiEffects::new(Arc::new(client), action_tx.clone()));
    let mut app = App::new(
        Rc::clone(&store),
        Rc::new(config),
        action_tx.clone(),
        cli.origin.clone(),
        cli.package.clone(),
    );

    store.dispatch(Action::SessionStarted { token });
    store.dispatch(Action::FetchProfile);
    store.dispatch(Action::FetchOrigin(cli.origin.clone()));
    store.dispatch(Action::FetchProjects {
        origin: cli.origin.clone(),
        name: cli.package.clone(),
    });
    store.dispatch(Action::FetchProjectIntegration {
        origin: cli.origin.clone(),
        name: cli.package.clone(),
        integration: "docker".into(),
    });
    if cli.target.is_some() {
        action_tx.send(Action::Navigate(Route::PackageSettings {
            origin: cli.origin,
            name: cli.package,
            target: cli.target,
        }))?;
    }

    let tick_rate = Duration::from_millis(250);
    let render_rate = Duration::from_millis(16); // ~60fps
    let mut events = EventHandler::new(tick_rate, render_rate);

    loop {
        tokio::select! {
            Some(event) = events.next() => {
                if event.is_quit() {
                    break;
                }

                match event {
                    Event::Render => {
                        terminal.draw(|frame| ui::render(frame, &app))?;
                        app.after_render();
                    }
                    _ => {
                        let action = app.handle_event(event);
                        if !matches!(action, Action::None) {
                            action_tx.send(action)?;
                        }
                    }
                }
            }
            Some(action) = action_rx.recv() => {
                app.update(action);
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
