mod members;
mod popup;
mod settings;

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::app::{App, Popup, Screen};

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);

    match app.screen {
        Screen::Settings => settings::render(frame, app, chunks[1]),
        Screen::Members => members::render(frame, app, chunks[1]),
    }

    render_status_bar(frame, app, chunks[2]);

    match &app.popup {
        Some(Popup::ConfirmDisconnect(project)) => popup::render_confirm(
            frame,
            "Disconnect",
            &format!("Disconnect {} for {}?", project.vcs_data, project.target),
        ),
        Some(Popup::CreatePackage(dialog)) => popup::render_input(
            frame,
            &format!("New package in {}", dialog.origin),
            &dialog.input,
            dialog.error.as_deref(),
        ),
        None => {}
    }
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let title = match app.screen {
        Screen::Settings => match app.settings.target() {
            Some(target) if app.settings.connecting() => format!(
                "bldr - {}/{} settings ({})",
                app.settings.origin, app.settings.name, target
            ),
            _ => format!("bldr - {}/{} settings", app.settings.origin, app.settings.name),
        },
        Screen::Members => format!("bldr - {} members", app.members.origin),
    };

    let header = Paragraph::new(Line::from(vec![Span::styled(
        title,
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )]))
    .style(Style::default().bg(Color::DarkGray));

    frame.render_widget(header, area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let status = if let Some(error) = &app.error {
        Line::from(vec![Span::styled(
            format!("Error: {}", error),
            Style::default().fg(Color::Red),
        )])
    } else if app.loading() {
        Line::from(vec![Span::styled(
            "Loading...",
            Style::default().fg(Color::Yellow),
        )])
    } else if let Some(status) = &app.status {
        Line::from(vec![Span::styled(
            status.as_str(),
            Style::default().fg(Color::Green),
        )])
    } else {
        let help = match app.screen {
            Screen::Settings if app.settings.connecting() => {
                "Tab: pane | j/k: nav | Enter: pick | s: save | f: check file | g: GitHub app | q: cancel"
            }
            Screen::Settings => {
                "j/k: targets | Enter: connect | d: disconnect | v: visibility | n: new package | m: members | q: quit"
            }
            Screen::Members => "j/k: nav | i: invite | x: remove | q: back",
        };
        Line::from(vec![Span::styled(help, Style::default().fg(Color::Gray))])
    };

    let status_bar = Paragraph::new(status).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(status_bar, area);
}
