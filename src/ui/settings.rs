use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;

use crate::action::SettingsPane;
use crate::app::App;
use crate::types::TARGETS;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    if app.settings.connecting() {
        render_connect(frame, app, area);
    } else {
        render_overview(frame, app, area);
    }
}

fn pane_block(title: String, focused: bool) -> Block<'static> {
    let style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(style)
        .title(title)
}

fn render_overview(frame: &mut Frame, app: &App, area: Rect) {
    let settings = &app.settings;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(5)])
        .split(area);

    let items: Vec<ListItem> = TARGETS
        .iter()
        .enumerate()
        .map(|(i, target)| {
            let style = if i == app.target_index {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let connection = match settings.projects().iter().find(|p| p.target == target.id) {
                Some(project) => Span::styled(
                    project.connection_summary(),
                    Style::default().fg(Color::Green),
                ),
                None => Span::styled("not connected", Style::default().fg(Color::DarkGray)),
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:<28}", target.name), style),
                connection,
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Build targets"))
        .highlight_style(Style::default().bg(Color::DarkGray));
    let mut state = ListState::default();
    state.select(Some(app.target_index));
    frame.render_stateful_widget(list, chunks[0], &mut state);

    let mut lines = vec![
        Line::from(vec![
            Span::styled("Visibility: ", Style::default().fg(Color::Gray)),
            Span::raw(settings.visibility().to_string()),
        ]),
        Line::from(vec![
            Span::styled("Auto-build: ", Style::default().fg(Color::Gray)),
            Span::raw(if settings.auto_build() { "on" } else { "off" }),
            Span::styled("   Docker: ", Style::default().fg(Color::Gray)),
            Span::raw(if settings.docker_enabled() { "enabled" } else { "disabled" }),
        ]),
    ];
    if !settings.has_private_key() {
        lines.push(Line::from(Span::styled(
            "This origin has no private key; builds will fail until one is uploaded.",
            Style::default().fg(Color::Red),
        )));
    }
    let info = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Settings"));
    frame.render_widget(info, chunks[1]);
}

fn render_connect(frame: &mut Frame, app: &App, area: Rect) {
    let settings = &app.settings;
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let note = Paragraph::new(Line::from(vec![
        Span::raw(settings.git_hub_app_note()),
        Span::styled(
            format!("  [g] {} GitHub app", settings.git_hub_app_label()),
            Style::default().fg(Color::Cyan),
        ),
    ]))
    .wrap(Wrap { trim: true })
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(note, rows[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Percentage(30),
            Constraint::Percentage(40),
        ])
        .split(rows[1]);

    render_installations(frame, app, columns[0]);
    render_repositories(frame, app, columns[1]);
    render_plan(frame, app, columns[2]);
}

fn active_style(active: bool) -> Style {
    if active {
        Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    }
}

fn render_installations(frame: &mut Frame, app: &App, area: Rect) {
    let settings = &app.settings;
    let active = settings.active_installation().map(|i| i.id);
    let installations = settings.installations();

    let items: Vec<ListItem> = installations
        .iter()
        .map(|install| {
            ListItem::new(Span::styled(
                install.account.login.clone(),
                active_style(Some(install.id) == active),
            ))
        })
        .collect();

    let title = if settings.loading_installations() {
        "Organizations (loading)".to_string()
    } else {
        format!("Organizations ({})", installations.len())
    };
    let list = List::new(items)
        .block(pane_block(title, app.pane == SettingsPane::Installations))
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("> ");
    let mut state = settings.view().installations.clone();
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_repositories(frame: &mut Frame, app: &App, area: Rect) {
    let settings = &app.settings;
    let active = settings.active_repo().map(|r| r.id);
    let repositories = settings.repositories();

    let items: Vec<ListItem> = repositories
        .iter()
        .map(|repo| {
            ListItem::new(Span::styled(
                repo.name.clone(),
                active_style(Some(repo.id) == active),
            ))
        })
        .collect();

    let title = if settings.loading_repositories() {
        "Repositories (loading)".to_string()
    } else if settings.active_installation().is_none() {
        "Repositories".to_string()
    } else {
        format!("Repositories ({})", repositories.len())
    };
    let list = List::new(items)
        .block(pane_block(title, app.pane == SettingsPane::Repositories))
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("> ");
    let mut state = settings.view().repositories.clone();
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_plan(frame: &mut Frame, app: &App, area: Rect) {
    let settings = &app.settings;
    let mut lines = Vec::new();

    match settings.repo_url() {
        Some(url) => {
            lines.push(Line::from(Span::styled(url, Style::default().fg(Color::Cyan))));
            if let Some(selected) = settings.selected_installation() {
                lines.push(Line::from(Span::styled(
                    format!(
                        "{} / {} via app {} (installation {})",
                        selected.org(),
                        selected.name(),
                        selected.app_id(),
                        selected.installation_id()
                    ),
                    Style::default().fg(Color::Gray),
                )));
            }
        }
        None if settings.reconciling() => lines.push(Line::from(Span::styled(
            format!(
                "Finding {}...",
                settings.selected_repo().unwrap_or_default()
            ),
            Style::default().fg(Color::Yellow),
        ))),
        None => lines.push(Line::from(Span::styled(
            "Pick an organization and a repository",
            Style::default().fg(Color::DarkGray),
        ))),
    }
    lines.push(Line::from(""));

    if let Some(field) = settings.plan_field() {
        lines.push(Line::from(vec![
            Span::styled("Plan file: ", Style::default().fg(Color::Gray)),
            Span::raw(field.value.clone()),
        ]));
        if field.dirty && !settings.filename_is_valid(&field.value) {
            lines.push(Line::from(Span::styled(
                settings.invalid_filename_message(),
                Style::default().fg(Color::Red),
            )));
        }
        match settings.plan_file_found() {
            Some(true) => lines.push(Line::from(Span::styled(
                "Plan file found",
                Style::default().fg(Color::Green),
            ))),
            Some(false) => lines.push(Line::from(Span::styled(
                "Plan file not found in this repository",
                Style::default().fg(Color::Red),
            ))),
            None => {}
        }
    }

    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("Auto-build: ", Style::default().fg(Color::Gray)),
        Span::raw(if settings.auto_build() { "on" } else { "off" }),
    ]));
    if settings.is_windows_target() {
        lines.push(Line::from(Span::styled(
            "Windows builds run in a Windows worker.",
            Style::default().fg(Color::Gray),
        )));
    }
    lines.push(Line::from(""));
    let button = format!("[s] {}", settings.connect_button_label());
    let button_style = if settings.valid_project() {
        Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    lines.push(Line::from(Span::styled(button, button_style)));

    let title = match settings.plan_target_name() {
        Some(name) => format!("{} plan", name),
        None => "Plan".to_string(),
    };
    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(pane_block(title, app.pane == SettingsPane::PlanPath));
    frame.render_widget(paragraph, area);
}
