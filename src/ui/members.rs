use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph};
use ratatui::Frame;

use crate::app::App;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let tab = &app.members;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(area);

    let members = tab.members();
    let invitations = tab.invitations();

    let mut items: Vec<ListItem> = members
        .iter()
        .map(|m| ListItem::new(Line::from(Span::raw(m.clone()))))
        .collect();
    items.extend(invitations.iter().map(|account| {
        ListItem::new(Line::from(vec![
            Span::raw(account.clone()),
            Span::styled(" (invited)", Style::default().fg(Color::DarkGray)),
        ]))
    }));

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Members ({})", members.len())),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        );
    let mut state = tab.list.clone();
    frame.render_stateful_widget(list, chunks[0], &mut state);

    let footer = match &tab.invite {
        Some(account) => Line::from(vec![
            Span::styled("Invite: ", Style::default().fg(Color::Cyan)),
            Span::raw(account.clone()),
            Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
        ]),
        None if tab.can_manage() => Line::from(Span::styled(
            "You own this origin",
            Style::default().fg(Color::Green),
        )),
        None => Line::from(Span::styled(
            "Only the origin owner can manage members",
            Style::default().fg(Color::DarkGray),
        )),
    };
    frame.render_widget(
        Paragraph::new(footer).block(Block::default().borders(Borders::ALL)),
        chunks[1],
    );
}
