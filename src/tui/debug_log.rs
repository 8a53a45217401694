//! Debug log overlay showing captured tracing output.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget},
};

use super::log_capture::LogBuffer;

/// Scrollback kept by the pane, independent of the capture queue.
const SCROLLBACK: usize = 1000;

/// Level token as printed by the tracing fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Level {
    /// First level token among the leading words of `line`.
    fn parse(line: &str) -> Option<Self> {
        line.split_whitespace().take(3).find_map(|word| match word {
            "ERROR" => Some(Level::Error),
            "WARN" => Some(Level::Warn),
            "INFO" => Some(Level::Info),
            "DEBUG" => Some(Level::Debug),
            "TRACE" => Some(Level::Trace),
            _ => None,
        })
    }

    fn color(&self) -> Color {
        match self {
            Level::Error => Color::Red,
            Level::Warn => Color::Yellow,
            Level::Info => Color::Green,
            Level::Debug | Level::Trace => Color::DarkGray,
        }
    }
}

pub struct DebugLogState {
    source: LogBuffer,
    lines: Vec<String>,
    pub visible: bool,
    /// Lines back from the newest; 0 follows the tail.
    scroll_back: usize,
}

impl DebugLogState {
    pub fn new(source: LogBuffer) -> Self {
        Self {
            source,
            lines: Vec::new(),
            visible: false,
            scroll_back: 0,
        }
    }

    /// Pull captured lines into the scrollback. Called every tick.
    pub fn refresh(&mut self) {
        let fresh = self.source.drain();
        if fresh.is_empty() {
            return;
        }
        self.lines.extend(fresh);
        if self.lines.len() > SCROLLBACK {
            let excess = self.lines.len() - SCROLLBACK;
            self.lines.drain(..excess);
            self.scroll_back = self.scroll_back.min(self.lines.len().saturating_sub(1));
        }
    }

    /// Show or hide the pane; showing jumps to the newest lines.
    pub fn toggle(&mut self) {
        self.visible = !self.visible;
        if self.visible {
            self.scroll_back = 0;
        }
    }

    pub fn scroll_up(&mut self, n: usize) {
        let max = self.lines.len().saturating_sub(1);
        self.scroll_back = (self.scroll_back + n).min(max);
    }

    pub fn scroll_down(&mut self, n: usize) {
        self.scroll_back = self.scroll_back.saturating_sub(n);
    }

    /// Lines to show in a pane `height` rows tall, oldest first.
    fn window(&self, height: usize) -> &[String] {
        let end = self.lines.len().saturating_sub(self.scroll_back);
        let start = end.saturating_sub(height);
        &self.lines[start..end]
    }
}

/// Render the log pane over `area`.
pub fn render(area: Rect, buf: &mut Buffer, state: &DebugLogState) {
    Clear.render(area, buf);

    let title = if state.scroll_back > 0 {
        format!(" Debug Log (-{}) ", state.scroll_back)
    } else {
        " Debug Log ".to_string()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            title,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
        .title_bottom(Span::styled(
            " PgUp/PgDn scroll  Ctrl+D close ",
            Style::default().fg(Color::DarkGray),
        ));

    let inner = block.inner(area);
    block.render(area, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let lines: Vec<Line> = state
        .window(inner.height as usize)
        .iter()
        .map(|line| {
            let color = Level::parse(line).map_or(Color::White, |l| l.color());
            Line::from(Span::styled(line.clone(), Style::default().fg(color)))
        })
        .collect();

    Paragraph::new(lines).render(inner, buf);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(n: usize) -> DebugLogState {
        let source = LogBuffer::with_capacity(n);
        for i in 0..n {
            source.push(format!("line {}", i));
        }
        let mut state = DebugLogState::new(source);
        state.refresh();
        state
    }

    #[test]
    fn test_refresh_accumulates() {
        let source = LogBuffer::new();
        let mut state = DebugLogState::new(source.clone());
        source.push("a".to_string());
        state.refresh();
        source.push("b".to_string());
        state.refresh();
        assert_eq!(state.window(10), ["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_toggle_jumps_to_tail() {
        let mut state = filled(20);
        state.scroll_up(5);
        state.toggle();
        assert!(state.visible);
        assert_eq!(state.scroll_back, 0);
        state.toggle();
        assert!(!state.visible);
    }

    #[test]
    fn test_scroll_window() {
        let mut state = filled(20);
        assert_eq!(state.window(3)[0], "line 17");

        state.scroll_up(5);
        assert_eq!(state.window(3)[2], "line 14");

        state.scroll_down(10);
        assert_eq!(state.scroll_back, 0);

        state.scroll_up(100);
        assert_eq!(state.scroll_back, 19);
        assert_eq!(state.window(3), ["line 0".to_string()]);
    }

    #[test]
    fn test_scrollback_is_capped() {
        let state = filled(SCROLLBACK + 50);
        assert_eq!(state.lines.len(), SCROLLBACK);
        assert_eq!(state.lines[0], "line 50");
    }

    #[test]
    fn test_level_parse() {
        assert_eq!(
            Level::parse("2024-01-02T03:04:05Z  WARN Skipping received record"),
            Some(Level::Warn)
        );
        assert_eq!(Level::parse(" ERROR Failed to create record"), Some(Level::Error));
        assert_eq!(Level::parse("plain text with ERROR later on"), None);
    }
}
