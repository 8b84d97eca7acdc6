use std::rc::Rc;

use crossterm::event::{KeyCode, KeyEvent};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::action::{Action, Route, SettingsPane};
use crate::config::Config;
use crate::event::Event;
use crate::members::OriginMembersTab;
use crate::package_create::PackageCreateDialog;
use crate::settings::{Changes, ProjectSettings};
use crate::store::{Store, Subscribable};
use crate::types::{target_from, DockerSettings, PackageVisibility, Project, TargetField, TARGETS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Settings, // Project settings for one package
    Members,  // Origin members tab
}

pub enum Popup {
    CreatePackage(PackageCreateDialog),
    ConfirmDisconnect(Project),
}

pub struct App {
    pub screen: Screen,
    pub pane: SettingsPane,
    pub settings: ProjectSettings,
    pub members: OriginMembersTab,
    pub popup: Option<Popup>,
    /// Cursor over TARGETS while no connection is being edited
    pub target_index: usize,
    pub status: Option<String>,
    pub error: Option<String>,
    pub should_quit: bool,
    projects_loaded: bool,
    pending_target: Option<String>,
    store: Rc<Store>,
    config: Rc<Config>,
    action_tx: mpsc::UnboundedSender<Action>,
}

impl App {
    pub fn new(
        store: Rc<Store>,
        config: Rc<Config>,
        action_tx: mpsc::UnboundedSender<Action>,
        origin: String,
        package: String,
    ) -> Self {
        let settings = ProjectSettings::new(
            Rc::clone(&store),
            Rc::clone(&config),
            action_tx.clone(),
            origin.clone(),
            package,
        );
        let members = OriginMembersTab::new(Rc::clone(&store), origin);

        Self {
            screen: Screen::Settings,
            pane: SettingsPane::default(),
            settings,
            members,
            popup: None,
            target_index: 0,
            status: None,
            error: None,
            should_quit: false,
            projects_loaded: false,
            pending_target: None,
            store,
            config,
            action_tx,
        }
    }

    pub fn loading(&self) -> bool {
        let state = self.store.snapshot();
        state.github.ui.installations.loading || state.github.ui.repositories.loading
    }

    /// Post-render hook; runs at most one deferred view effect.
    pub fn after_render(&mut self) {
        if self.screen == Screen::Settings {
            self.settings.after_render();
        }
    }

    pub fn handle_event(&self, event: Event) -> Action {
        match event {
            Event::Key(key) => self.handle_key(key),
            _ => Action::None,
        }
    }

    fn typing(&self) -> bool {
        match &self.popup {
            Some(Popup::CreatePackage(_)) => true,
            Some(Popup::ConfirmDisconnect(_)) => false,
            None => match self.screen {
                Screen::Settings => {
                    self.settings.connecting()
                        && self.pane == SettingsPane::PlanPath
                        && self.settings.plan_field().is_some()
                }
                Screen::Members => self.members.invite.is_some(),
            },
        }
    }

    fn handle_key(&self, key: KeyEvent) -> Action {
        if let Some(Popup::ConfirmDisconnect(_)) = &self.popup {
            return match key.code {
                KeyCode::Char('y') | KeyCode::Enter => Action::ConfirmYes,
                KeyCode::Char('n') | KeyCode::Esc | KeyCode::Char('q') => Action::ConfirmNo,
                _ => Action::None,
            };
        }

        if self.typing() {
            return match key.code {
                KeyCode::Char(c) => Action::Input(c),
                KeyCode::Backspace => Action::Backspace,
                KeyCode::Enter => Action::Select,
                KeyCode::Esc => Action::Back,
                KeyCode::Tab => Action::NextPane,
                _ => Action::None,
            };
        }

        match key.code {
            KeyCode::Char('Q') => Action::Quit,
            KeyCode::Char('q') | KeyCode::Esc => Action::Back,
            KeyCode::Char('j') | KeyCode::Down => Action::ScrollDown,
            KeyCode::Char('k') | KeyCode::Up => Action::ScrollUp,
            KeyCode::Enter => Action::Select,
            KeyCode::Tab => Action::NextPane,
            KeyCode::Char('n') => Action::ShowCreatePackage,
            KeyCode::Char('m') => Action::Navigate(Route::OriginMembers {
                origin: self.settings.origin.clone(),
            }),
            _ => match self.screen {
                Screen::Settings => self.handle_settings_key(key),
                Screen::Members => match key.code {
                    KeyCode::Char('i') => Action::Select,
                    KeyCode::Char('x') => Action::ConfirmYes,
                    _ => Action::None,
                },
            },
        }
    }

    fn handle_settings_key(&self, key: KeyEvent) -> Action {
        match key.code {
            KeyCode::Char('s') if self.settings.connecting() => Action::SaveConnection,
            KeyCode::Char('f') if self.settings.connecting() => Action::CheckPlanFile,
            KeyCode::Char('g') => Action::OpenGitHubApp,
            KeyCode::Char('a') => Action::ToggleAutoBuild,
            KeyCode::Char('v') => Action::CycleVisibility,
            KeyCode::Char('d') if !self.settings.connecting() => Action::ShowDisconnect,
            _ => Action::None,
        }
    }

    pub fn update(&mut self, action: Action) {
        if self.error.is_some() && !matches!(action, Action::Quit | Action::Back) {
            self.error = None;
        }

        match action {
            Action::None => {}
            Action::Quit => self.should_quit = true,
            Action::Back => self.back(),
            Action::ScrollUp => self.scroll(-1),
            Action::ScrollDown => self.scroll(1),
            Action::Select => self.select(),
            Action::NextPane => {
                self.pane = match self.pane {
                    SettingsPane::Installations => SettingsPane::Repositories,
                    SettingsPane::Repositories => SettingsPane::PlanPath,
                    SettingsPane::PlanPath => SettingsPane::Installations,
                };
            }
            Action::Input(c) => self.input(Some(c)),
            Action::Backspace => self.input(None),

            // Settings screen
            Action::SaveConnection => self.settings.save_connection(),
            Action::ShowDisconnect => {
                if let Some(project) = self.cursor_project() {
                    self.popup = Some(Popup::ConfirmDisconnect(project));
                }
            }
            Action::ToggleAutoBuild => {
                let v = !self.settings.auto_build();
                self.settings.set_auto_build(v);
            }
            Action::CycleVisibility => {
                let next = match self.settings.visibility() {
                    PackageVisibility::Public => PackageVisibility::Private,
                    PackageVisibility::Private => PackageVisibility::Hidden,
                    PackageVisibility::Hidden => PackageVisibility::Public,
                };
                self.settings.setting_changed(next);
            }
            Action::OpenGitHubApp => {
                if let Err(e) = open::that(self.settings.git_hub_app_url()) {
                    self.error = Some(format!("Failed to open browser: {}", e));
                }
            }
            Action::CheckPlanFile => {
                if !self.settings.does_file_exist() {
                    self.status = Some("Pick a repository first".into());
                }
            }

            // Popups
            Action::ShowCreatePackage => {
                self.popup = Some(Popup::CreatePackage(PackageCreateDialog::new(
                    Rc::clone(&self.store),
                    self.action_tx.clone(),
                    self.settings.origin.clone(),
                )));
            }
            Action::ConfirmYes => match self.popup.take() {
                Some(Popup::ConfirmDisconnect(project)) => self.settings.disconnect(&project),
                Some(popup) => self.popup = Some(popup),
                None if self.screen == Screen::Members => {
                    if let Some(member) = self.members.selected_member() {
                        if !self.members.remove(&member) {
                            self.status = Some("Only the origin owner can remove members".into());
                        }
                    }
                }
                None => {}
            },
            Action::ConfirmNo => self.popup = None,

            // Component outputs
            Action::Navigate(route) => self.navigate(route),
            Action::ConnectionToggled(connecting) => {
                self.pane = SettingsPane::Installations;
                if !connecting {
                    self.status = None;
                }
            }
            Action::ProjectConnected { origin, name } => {
                info!(%origin, %name, "project connected");
                self.status = Some(format!("Connected {}/{}", origin, name));
            }
            Action::DialogClosed { created } => {
                if created {
                    if let Some(Popup::CreatePackage(dialog)) = &self.popup {
                        self.status = Some(format!("Created {}/{}", dialog.origin, dialog.input.trim()));
                    }
                }
                self.popup = None;
            }

            Action::Error(msg) => {
                warn!(error = %msg, "action failed");
                self.error = Some(msg);
            }

            // Everything else goes through the store
            other => self.dispatch(other),
        }
    }

    fn dispatch(&mut self, action: Action) {
        let saved = match &action {
            Action::ProjectSaved(outcome) => Some(outcome.clone()),
            _ => None,
        };
        let projects_changed = matches!(
            action,
            Action::ProjectsLoaded(_) | Action::ProjectLoaded(_) | Action::ProjectDeleted { .. }
        );
        let integration = match &action {
            Action::ProjectIntegrationLoaded {
                integration,
                settings,
            } => Some(Some((integration.clone(), settings.clone()))),
            Action::ProjectIntegrationDeleted { .. } => Some(None),
            _ => None,
        };

        self.store.dispatch(action);

        if projects_changed {
            let state = self.store.snapshot();
            self.settings.set_projects(state.projects.list.clone());
            if let Some(project) = state.projects.current.project.clone() {
                self.settings.on_changes(Changes {
                    project: Some(project),
                    target: None,
                });
            }
            self.projects_loaded = true;
            if let Some(target) = self.pending_target.take() {
                self.settings.on_changes(Changes {
                    project: None,
                    target: Some(target),
                });
            }
        }

        match integration {
            Some(Some((name, settings))) => {
                self.settings.docker = DockerSettings {
                    enabled: true,
                    name,
                    settings,
                    valid: true,
                };
            }
            Some(None) => self.settings.docker = DockerSettings::default(),
            None => {}
        }

        if let Some(outcome) = saved {
            if let Some(message) = outcome.failure_message() {
                self.error = Some(message);
            }
            self.settings.handle_saved(&outcome);
        }
    }

    fn navigate(&mut self, route: Route) {
        match route {
            Route::PackageSettings {
                origin,
                name,
                target,
            } => {
                self.screen = Screen::Settings;
                if origin != self.settings.origin || name != self.settings.name {
                    self.settings = ProjectSettings::new(
                        Rc::clone(&self.store),
                        Rc::clone(&self.config),
                        self.action_tx.clone(),
                        origin.clone(),
                        name.clone(),
                    );
                    self.projects_loaded = false;
                    self.store.dispatch(Action::FetchProjects { origin, name });
                }

                let Some(param) = target else {
                    return;
                };
                let Some(target) = target_from(TargetField::Param, &param) else {
                    self.error = Some(format!("Unknown target '{}'", param));
                    return;
                };
                if self.projects_loaded {
                    self.settings.on_changes(Changes {
                        project: None,
                        target: Some(target.id.to_string()),
                    });
                } else {
                    self.pending_target = Some(target.id.to_string());
                }
            }
            Route::OriginMembers { origin } => {
                self.screen = Screen::Members;
                if origin != self.members.origin {
                    self.members = OriginMembersTab::new(Rc::clone(&self.store), origin);
                }
                self.members.open();
            }
        }
    }

    fn back(&mut self) {
        if self.popup.is_some() {
            if let Some(Popup::CreatePackage(dialog)) = &self.popup {
                dialog.cancel();
            }
            self.popup = None;
            return;
        }
        match self.screen {
            Screen::Members => {
                if self.members.invite.is_some() {
                    self.members.invite = None;
                } else {
                    self.screen = Screen::Settings;
                }
            }
            Screen::Settings => {
                if self.settings.connecting() {
                    self.settings.clear_connection();
                } else {
                    self.should_quit = true;
                }
            }
        }
    }

    /// Project connected for the target under the cursor, if any
    pub fn cursor_project(&self) -> Option<Project> {
        let target = TARGETS.get(self.target_index)?;
        self.settings
            .projects()
            .iter()
            .find(|p| p.target == target.id)
            .cloned()
    }

    fn scroll(&mut self, delta: i32) {
        if self.popup.is_some() {
            return;
        }
        match self.screen {
            Screen::Members => {
                if delta > 0 {
                    self.members.select_next();
                } else {
                    self.members.select_prev();
                }
            }
            Screen::Settings if !self.settings.connecting() => {
                self.target_index = step(Some(self.target_index), delta, TARGETS.len()).unwrap_or(0);
            }
            Screen::Settings => match self.pane {
                SettingsPane::Installations => {
                    let len = self.settings.installations().len();
                    let state = &mut self.settings.view_mut().installations;
                    state.select(step(state.selected(), delta, len));
                }
                SettingsPane::Repositories => {
                    let len = self.settings.repositories().len();
                    let state = &mut self.settings.view_mut().repositories;
                    state.select(step(state.selected(), delta, len));
                }
                SettingsPane::PlanPath => {}
            },
        }
    }

    fn select(&mut self) {
        if let Some(Popup::CreatePackage(dialog)) = &mut self.popup {
            dialog.submit();
            return;
        }
        match self.screen {
            Screen::Members => match self.members.invite.clone() {
                None => self.members.invite = Some(String::new()),
                Some(account) => {
                    if !self.members.invite(&account) {
                        self.status = Some("Only the origin owner can invite members".into());
                    }
                }
            },
            Screen::Settings if !self.settings.connecting() => {
                let Some(target) = TARGETS.get(self.target_index) else {
                    return;
                };
                match self.cursor_project() {
                    Some(project) => self.settings.open_connect_edit(&project),
                    None => self.settings.open_connect(target.param),
                }
            }
            Screen::Settings => match self.pane {
                SettingsPane::Installations => {
                    let installations = self.settings.installations();
                    if let Some(install) = self
                        .settings
                        .view()
                        .installations
                        .selected()
                        .and_then(|i| installations.get(i))
                    {
                        self.settings.pick_installation(install);
                        self.pane = SettingsPane::Repositories;
                    }
                }
                SettingsPane::Repositories => {
                    let repositories = self.settings.repositories();
                    if let Some(repo) = self
                        .settings
                        .view()
                        .repositories
                        .selected()
                        .and_then(|i| repositories.get(i))
                    {
                        self.settings.pick_repo(repo);
                        self.pane = SettingsPane::PlanPath;
                    }
                }
                SettingsPane::PlanPath => self.settings.next(),
            },
        }
    }

    /// `Some(c)` types a character, `None` deletes one.
    fn input(&mut self, c: Option<char>) {
        if let Some(Popup::CreatePackage(dialog)) = &mut self.popup {
            match c {
                Some(c) => dialog.input.push(c),
                None => {
                    dialog.input.pop();
                }
            }
            return;
        }
        match self.screen {
            Screen::Members => match (&mut self.members.invite, c) {
                (Some(account), Some(c)) => account.push(c),
                (Some(account), None) => {
                    account.pop();
                }
                (None, _) => {}
            },
            Screen::Settings => self.settings.edit_plan_path(|path| match c {
                Some(c) => path.push(c),
                None => {
                    path.pop();
                }
            }),
        }
    }
}

fn step(current: Option<usize>, delta: i32, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let i = match current {
        None => 0,
        Some(i) if delta < 0 => i.saturating_sub(1),
        Some(i) => (i + 1).min(len - 1),
    };
    Some(i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NoEffects;
    use crossterm::event::KeyModifiers;

    fn app() -> (App, mpsc::UnboundedReceiver<Action>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let app = App::new(
            Store::new(NoEffects),
            Rc::new(Config::default()),
            tx,
            "core".into(),
            "widgets".into(),
        );
        (app, rx)
    }

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn cursor_steps_within_bounds() {
        assert_eq!(step(None, 1, 3), Some(0));
        assert_eq!(step(Some(2), 1, 3), Some(2));
        assert_eq!(step(Some(0), -1, 3), Some(0));
        assert_eq!(step(Some(1), 1, 0), None);
    }

    #[test]
    fn target_applies_after_projects_load() {
        let (mut app, _rx) = app();
        app.update(Action::Navigate(Route::PackageSettings {
            origin: "core".into(),
            name: "widgets".into(),
            target: Some("windows".into()),
        }));
        assert!(!app.settings.connecting());

        app.update(Action::ProjectsLoaded(Vec::new()));
        assert!(app.settings.connecting());
        assert_eq!(app.settings.target(), Some("x86_64-windows"));
        assert_eq!(app.settings.default_path(), "habitat/plan.ps1");
    }

    #[test]
    fn back_while_connecting_clears_connection() {
        let (mut app, mut rx) = app();
        app.update(Action::ProjectsLoaded(Vec::new()));
        app.update(Action::Navigate(Route::PackageSettings {
            origin: "core".into(),
            name: "widgets".into(),
            target: Some("linux".into()),
        }));
        assert!(app.settings.connecting());

        app.update(Action::Back);
        assert!(!app.settings.connecting());
        assert!(!app.should_quit);

        let mut outputs = Vec::new();
        while let Ok(action) = rx.try_recv() {
            outputs.push(action);
        }
        assert!(matches!(
            outputs.last(),
            Some(Action::Navigate(Route::PackageSettings { target: None, .. }))
        ));
    }

    #[test]
    fn typing_goes_to_create_package_popup() {
        let (mut app, _rx) = app();
        app.update(Action::ShowCreatePackage);
        assert!(matches!(app.handle_event(key(KeyCode::Char('q'))), Action::Input('q')));

        app.update(Action::Input('x'));
        app.update(Action::Input('y'));
        app.update(Action::Backspace);
        match &app.popup {
            Some(Popup::CreatePackage(dialog)) => assert_eq!(dialog.input, "x"),
            _ => panic!("popup closed"),
        }
    }

    #[test]
    fn members_route_opens_members_screen() {
        let (mut app, _rx) = app();
        app.update(Action::Navigate(Route::OriginMembers {
            origin: "core".into(),
        }));
        assert_eq!(app.screen, Screen::Members);

        app.update(Action::Back);
        assert_eq!(app.screen, Screen::Settings);
    }
}
