//! Messages pane: the display list as bordered cards.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};
use unicode_width::UnicodeWidthStr;

use crate::book::{DisplayList, PendingDeletes};
use crate::dwn::Did;
use crate::models::{Message, MessageKind};

/// State for the messages pane.
#[derive(Default)]
pub struct MessagesState {
    pub list: DisplayList,
    pub pending: PendingDeletes,
    /// Our identity, once the backend has connected.
    pub own: Option<Did>,
    /// Vertical scroll offset (in rendered lines, 0 = top).
    pub scroll_offset: usize,
    /// Index of the currently selected message.
    pub selected: usize,
    /// A refresh is outstanding.
    pub loading: bool,
}

impl MessagesState {
    pub fn select_previous(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
        }
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.list.len() {
            self.selected += 1;
        }
    }

    /// Keep the selection inside the list after it changed size.
    pub fn clamp_selection(&mut self) {
        self.selected = self.selected.min(self.list.len().saturating_sub(1));
    }

    pub fn selected_message(&self) -> Option<&Message> {
        self.list.messages().get(self.selected)
    }

    pub fn is_own(&self, msg: &Message) -> bool {
        self.own.as_ref() == Some(&msg.sender)
    }

    /// Record id of the selected message if we may delete it.
    pub fn deletable_selection(&self) -> Option<String> {
        let msg = self.selected_message()?;
        if !self.is_own(msg) {
            return None;
        }
        msg.record_id.clone()
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render the messages pane into the given area.
pub fn render(area: Rect, buf: &mut Buffer, state: &MessagesState, focused: bool) {
    let border_style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let border_type = if focused {
        BorderType::Double
    } else {
        BorderType::Plain
    };

    let title = if state.loading {
        format!(" Messages ({}) refreshing... ", state.list.len())
    } else {
        format!(" Messages ({}) ", state.list.len())
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(border_style)
        .title(Span::styled(
            title,
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(area);
    block.render(area, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    if state.list.is_empty() {
        let line = Line::from(Span::styled(
            " No messages yet. Spill some tea in the composer below.",
            Style::default().fg(Color::DarkGray),
        ));
        Paragraph::new(line).render(inner, buf);
        return;
    }

    let (all_lines, msg_line_ranges) = build_message_lines(state, inner.width as usize);
    let total_lines = all_lines.len();
    let visible_height = inner.height as usize;

    let scroll = compute_auto_scroll(
        state.scroll_offset,
        state.selected,
        &msg_line_ranges,
        visible_height,
        total_lines,
    );

    for (row, line_idx) in (scroll..total_lines).take(visible_height).enumerate() {
        let line_area = Rect::new(inner.x, inner.y + row as u16, inner.width, 1);
        Paragraph::new(all_lines[line_idx].clone()).render(line_area, buf);
    }

    if total_lines > visible_height {
        let indicator_x = inner.x + inner.width.saturating_sub(1);
        if scroll > 0 {
            let cell = &mut buf[(indicator_x, inner.y)];
            cell.set_char('^');
            cell.set_style(Style::default().fg(Color::DarkGray));
        }
        if scroll + visible_height < total_lines {
            let bottom_y = inner.y + inner.height.saturating_sub(1);
            let cell = &mut buf[(indicator_x, bottom_y)];
            cell.set_char('v');
            cell.set_style(Style::default().fg(Color::DarkGray));
        }
    }
}

/// Build the flat line buffer and per-message line ranges in a single pass.
fn build_message_lines(
    state: &MessagesState,
    width: usize,
) -> (Vec<Line<'static>>, Vec<(usize, usize)>) {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut ranges: Vec<(usize, usize)> = Vec::new();

    for (msg_idx, msg) in state.list.messages().iter().enumerate() {
        let start = lines.len();
        let card = CardStyle {
            selected: msg_idx == state.selected,
            own: state.is_own(msg),
            deleting: msg
                .record_id
                .as_deref()
                .is_some_and(|id| state.pending.contains(id)),
        };
        render_message_card(&mut lines, msg, width, &card);
        lines.push(Line::from(""));
        ranges.push((start, lines.len()));
    }

    (lines, ranges)
}

struct CardStyle {
    selected: bool,
    own: bool,
    deleting: bool,
}

fn kind_color(kind: MessageKind) -> Color {
    match kind {
        MessageKind::Secret => Color::Magenta,
        MessageKind::Direct => Color::Cyan,
    }
}

/// One bordered row: `| <spans padded to content_width> |`.
fn card_row(
    spans: Vec<Span<'static>>,
    used: usize,
    content_width: usize,
    border: Style,
) -> Line<'static> {
    let mut row = vec![Span::styled("| ".to_string(), border)];
    row.extend(spans);
    row.push(Span::raw(" ".repeat(content_width.saturating_sub(used))));
    row.push(Span::styled(" |".to_string(), border));
    Line::from(row)
}

/// Render a single message card into the line buffer.
fn render_message_card(
    lines: &mut Vec<Line<'static>>,
    msg: &Message,
    width: usize,
    card: &CardStyle,
) {
    let card_inner_width = width.saturating_sub(2);
    if card_inner_width < 10 {
        return;
    }
    let content_width = card_inner_width.saturating_sub(2);

    let border = if card.selected {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::Gray)
    };
    let horizontal = format!("+-{}-+", "-".repeat(card_inner_width.saturating_sub(2)));

    lines.push(Line::from(Span::styled(horizontal.clone(), border)));

    // Header: "[Secret] did:... (you)        1/2/2024 3:04:05 PM"
    let tag = format!("[{}] ", msg.kind);
    let you = if card.own { " (you)" } else { "" };
    let budget = content_width
        .saturating_sub(tag.width())
        .saturating_sub(you.width())
        .saturating_sub(msg.timestamp.width() + 1);
    let sender = truncate(msg.sender.as_str(), budget);
    let used = tag.width() + sender.width() + you.width() + msg.timestamp.width();
    lines.push(card_row(
        vec![
            Span::styled(tag, Style::default().fg(kind_color(msg.kind))),
            Span::styled(
                sender,
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
            Span::styled(you.to_string(), Style::default().fg(Color::Green)),
            Span::raw(" ".repeat(content_width.saturating_sub(used))),
            Span::styled(msg.timestamp.clone(), Style::default().fg(Color::DarkGray)),
        ],
        content_width.max(used),
        content_width,
        border,
    ));

    if let Some(ref to) = msg.recipient_did {
        let text = truncate(&format!("to {}", to), content_width);
        let used = text.width();
        lines.push(card_row(
            vec![Span::styled(text, Style::default().fg(Color::DarkGray))],
            used,
            content_width,
            border,
        ));
    }

    for cl in wrap_text(&msg.text, content_width) {
        let used = cl.width();
        lines.push(card_row(vec![Span::raw(cl)], used, content_width, border));
    }

    if let Some(ref url) = msg.image_url {
        let text = truncate(&format!("[image] {}", url), content_width);
        let used = text.width();
        lines.push(card_row(
            vec![Span::styled(
                text,
                Style::default().fg(Color::Cyan).add_modifier(Modifier::DIM),
            )],
            used,
            content_width,
            border,
        ));
    }

    if card.deleting {
        let text = "deleting...".to_string();
        let used = text.width();
        lines.push(card_row(
            vec![Span::styled(text, Style::default().fg(Color::Red))],
            used,
            content_width,
            border,
        ));
    } else if card.selected && card.own {
        let text = "d: delete".to_string();
        let used = text.width();
        lines.push(card_row(
            vec![Span::styled(text, Style::default().fg(Color::DarkGray))],
            used,
            content_width,
            border,
        ));
    }

    lines.push(Line::from(Span::styled(horizontal, border)));
}

/// Cut `s` to at most `max` columns, marking the cut with "...".
fn truncate(s: &str, max: usize) -> String {
    if s.width() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out = String::new();
    for ch in s.chars() {
        if out.width() + ch.to_string().width() > keep {
            break;
        }
        out.push(ch);
    }
    if max >= 3 {
        out.push_str("...");
    }
    out
}

/// Simple word-wrapping: split content by newlines first, then wrap long lines.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if max_width == 0 {
        return vec![];
    }
    let mut result = Vec::new();
    for line in text.lines() {
        if line.width() <= max_width {
            result.push(line.to_string());
            continue;
        }
        let mut current = String::new();
        for word in line.split_whitespace() {
            if current.is_empty() {
                current = word.to_string();
            } else if current.width() + 1 + word.width() <= max_width {
                current.push(' ');
                current.push_str(word);
            } else {
                result.push(std::mem::take(&mut current));
                current = word.to_string();
            }
            // A single word wider than the card gets hard-split.
            while current.width() > max_width {
                let head = truncate_exact(&current, max_width);
                current = current[head.len()..].to_string();
                result.push(head);
            }
        }
        if !current.is_empty() {
            result.push(current);
        }
    }
    result
}

/// Longest prefix of `s` that fits in `max` columns (at least one char).
fn truncate_exact(s: &str, max: usize) -> String {
    let mut out = String::new();
    for ch in s.chars() {
        if !out.is_empty() && out.width() + ch.to_string().width() > max {
            break;
        }
        out.push(ch);
    }
    out
}

/// Compute scroll offset that keeps the selected message visible.
fn compute_auto_scroll(
    current_scroll: usize,
    selected: usize,
    ranges: &[(usize, usize)],
    visible_height: usize,
    total_lines: usize,
) -> usize {
    if ranges.is_empty() || total_lines <= visible_height {
        return 0;
    }

    let Some(&(sel_start, sel_end)) = ranges.get(selected) else {
        return current_scroll;
    };

    let mut scroll = current_scroll;

    let msg_height = sel_end.saturating_sub(sel_start);
    if msg_height >= visible_height {
        scroll = sel_start;
    } else {
        if sel_start < scroll {
            scroll = sel_start;
        }
        if sel_end > scroll + visible_height {
            scroll = sel_end.saturating_sub(visible_height);
        }
    }

    scroll.min(total_lines.saturating_sub(visible_height))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: &str, sender: &str) -> Message {
        Message {
            text: format!("text of {}", id),
            timestamp: "1/2/2024 3:04:05 PM".to_string(),
            sender: Did::from(sender),
            kind: MessageKind::Secret,
            recipient_did: None,
            image_url: None,
            record_id: Some(id.to_string()),
        }
    }

    fn state_with(messages: Vec<Message>) -> MessagesState {
        let mut state = MessagesState {
            own: Some(Did::from("did:example:me")),
            ..MessagesState::default()
        };
        let ticket = state.list.begin_refresh();
        state.list.apply_refresh(ticket, messages);
        state
    }

    #[test]
    fn test_selection_bounds() {
        let mut state = state_with(vec![msg("a", "did:example:me"), msg("b", "did:example:me")]);
        state.select_previous();
        assert_eq!(state.selected, 0);
        state.select_next();
        state.select_next();
        assert_eq!(state.selected, 1);

        state.list.remove("b");
        state.clamp_selection();
        assert_eq!(state.selected, 0);
    }

    #[test]
    fn test_only_own_messages_are_deletable() {
        let mut state = state_with(vec![msg("a", "did:example:me"), msg("b", "did:example:other")]);
        assert_eq!(state.deletable_selection().as_deref(), Some("a"));
        state.select_next();
        assert_eq!(state.deletable_selection(), None);
    }

    #[test]
    fn test_card_shows_image_and_recipient() {
        let mut m = msg("a", "did:example:me");
        m.kind = MessageKind::Direct;
        m.recipient_did = Some(Did::from("did:example:bob"));
        m.image_url = Some("https://img.example/cat.png".to_string());
        let state = state_with(vec![m]);

        let (lines, ranges) = build_message_lines(&state, 60);
        let rendered: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
        // border, header, to, text, image, delete hint, border, blank
        assert_eq!(ranges, vec![(0, 8)]);
        assert!(rendered[1].contains("[Direct] did:example:me (you)"));
        assert!(rendered[2].contains("to did:example:bob"));
        assert!(rendered[4].contains("[image] https://img.example/cat.png"));
        assert!(rendered[5].contains("d: delete"));
        assert!(rendered.iter().all(|l| l.width() <= 60));
    }

    #[test]
    fn test_pending_delete_marker() {
        let mut state = state_with(vec![msg("a", "did:example:me")]);
        state.pending.try_begin("a");
        let (lines, _) = build_message_lines(&state, 60);
        assert!(lines.iter().any(|l| l.to_string().contains("deleting...")));
    }

    #[test]
    fn test_wrap_text() {
        assert_eq!(wrap_text("one two three", 7), vec!["one two", "three"]);
        assert_eq!(wrap_text("a\nb", 10), vec!["a", "b"]);
        assert_eq!(wrap_text("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert!(wrap_text("x", 0).is_empty());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("did:example:me", 20), "did:example:me");
        assert_eq!(truncate("did:example:me", 8), "did:e...");
    }

    #[test]
    fn test_auto_scroll_keeps_selection_visible() {
        let ranges = vec![(0, 5), (5, 10), (10, 15)];
        assert_eq!(compute_auto_scroll(0, 2, &ranges, 6, 15), 9);
        assert_eq!(compute_auto_scroll(9, 0, &ranges, 6, 15), 0);
        assert_eq!(compute_auto_scroll(0, 0, &ranges, 20, 15), 0);
    }
}
