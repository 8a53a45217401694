//! UI rendering for the TUI

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use super::app::{App, ConnectionState, Pane};
use super::compose;
use super::debug_log;
use super::help;
use super::messages;

/// Status indicator symbol and color for the connection state
fn status_indicator(state: &ConnectionState) -> (&'static str, &'static str, Color) {
    match state {
        ConnectionState::Connecting => ("o", "connecting", Color::Yellow),
        ConnectionState::Connected => ("*", "connected", Color::Green),
        ConnectionState::Failed(_) => ("x", "offline", Color::Red),
    }
}

/// Main render function
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let [header_area, main_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(header_area, frame.buffer_mut(), app);

    let [messages_area, compose_area] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(compose::COMPOSE_HEIGHT),
    ])
    .areas(main_area);

    messages::render(
        messages_area,
        frame.buffer_mut(),
        &app.messages,
        app.active_pane == Pane::Messages,
    );

    compose::render(
        compose_area,
        frame,
        &app.compose,
        app.active_pane == Pane::Compose,
    );

    render_status(status_area, frame.buffer_mut(), app);

    // Debug log covers the lower half of the main area.
    if app.debug_log.visible {
        let [_, log_area] =
            Layout::vertical([Constraint::Percentage(50), Constraint::Percentage(50)])
                .areas(main_area);
        debug_log::render(log_area, frame.buffer_mut(), &app.debug_log);
    }

    if app.show_help {
        help::render_help_popup(frame);
    }
}

/// Render the header bar: title on the left, identity on the right
fn render_header(area: Rect, buf: &mut Buffer, app: &App) {
    const TITLE: &str = " Burn Book";

    let (symbol, label, color) = status_indicator(&app.connection);
    let state = format!(" {} {} ", symbol, label);
    let help = " F1 Help ";

    let did = app.did.as_ref().map(|d| d.to_string()).unwrap_or_default();
    let fixed = TITLE.width() + help.width() + state.width() + 1;
    let room = (area.width as usize).saturating_sub(fixed);
    let did = if did.width() > room {
        let keep = room.saturating_sub(3);
        let head: String = did.chars().take(keep).collect();
        if room >= 3 {
            format!("{}...", head)
        } else {
            head
        }
    } else {
        did
    };
    let padding = room.saturating_sub(did.width());

    let header_line = Line::from(vec![
        Span::styled(
            TITLE,
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" ".repeat(padding)),
        Span::styled(help, Style::default().fg(Color::Gray)),
        Span::styled(state, Style::default().fg(color)),
        Span::styled(did, Style::default().fg(Color::Cyan)),
        Span::raw(" "),
    ]);

    Paragraph::new(header_line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

/// Render the status bar
fn render_status(area: Rect, buf: &mut Buffer, app: &App) {
    if let Some(ref msg) = app.status_message {
        let style = if app.status_is_error {
            Style::default().fg(Color::Red).bg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Green).bg(Color::DarkGray)
        };
        let line = Line::from(Span::styled(format!(" {} ", msg), style));
        Paragraph::new(line)
            .style(Style::default().bg(Color::DarkGray))
            .render(area, buf);
        return;
    }

    let (symbol, label, color) = status_indicator(&app.connection);
    let sep_style = Style::default().fg(Color::Gray);
    let hint_style = Style::default().fg(Color::Gray);

    let status_line = Line::from(vec![
        Span::styled(format!(" {} {} ", symbol, label), Style::default().fg(color)),
        Span::styled(" | ", sep_style),
        Span::styled(
            format!("Tab: {} ", app.active_pane.as_str()),
            Style::default().fg(Color::Cyan),
        ),
        Span::styled(" | ", sep_style),
        Span::styled("C-r: refresh", hint_style),
        Span::styled(" | ", sep_style),
        Span::styled("C-y: DID", hint_style),
        Span::styled(" | ", sep_style),
        Span::styled("C-d: log", hint_style),
        Span::styled(" | ", sep_style),
        Span::styled("F1: help", hint_style),
    ]);

    Paragraph::new(status_line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}
