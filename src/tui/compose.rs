//! Composer form: message text, image URL, type toggle and recipient.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
    Frame,
};

use crate::book::{Composer, ComposerPhase};
use crate::models::{Draft, MessageKind};

/// Form fields in focus order.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ComposeField {
    #[default]
    Text,
    Image,
    Kind,
    Recipient,
}

impl ComposeField {
    fn label(&self) -> &'static str {
        match self {
            ComposeField::Text => "Message",
            ComposeField::Image => "Image URL",
            ComposeField::Kind => "Type",
            ComposeField::Recipient => "To (DID)",
        }
    }

    fn index(&self) -> usize {
        match self {
            ComposeField::Text => 0,
            ComposeField::Image => 1,
            ComposeField::Kind => 2,
            ComposeField::Recipient => 3,
        }
    }
}

/// State for the composer form.
#[derive(Default)]
pub struct ComposeState {
    pub composer: Composer,
    /// Focused field.
    pub field: ComposeField,
    /// Cursor per field (character offset); unused for `Kind`.
    cursors: [usize; 4],
}

impl ComposeState {
    pub fn draft(&self) -> &Draft {
        &self.composer.draft
    }

    pub fn phase(&self) -> &ComposerPhase {
        &self.composer.phase
    }

    /// Fields currently on the form. The recipient only exists for direct messages.
    pub fn visible_fields(&self) -> &'static [ComposeField] {
        match self.composer.draft.kind {
            MessageKind::Secret => &[ComposeField::Text, ComposeField::Image, ComposeField::Kind],
            MessageKind::Direct => &[
                ComposeField::Text,
                ComposeField::Image,
                ComposeField::Kind,
                ComposeField::Recipient,
            ],
        }
    }

    /// Focus the next field, wrapping around.
    pub fn next_field(&mut self) {
        let fields = self.visible_fields();
        let pos = fields.iter().position(|f| *f == self.field).unwrap_or(0);
        self.field = fields[(pos + 1) % fields.len()];
    }

    /// Focus the previous field, wrapping around.
    pub fn prev_field(&mut self) {
        let fields = self.visible_fields();
        let pos = fields.iter().position(|f| *f == self.field).unwrap_or(0);
        self.field = fields[(pos + fields.len() - 1) % fields.len()];
    }

    /// Switch between secret and direct.
    pub fn toggle_kind(&mut self) {
        let draft = &mut self.composer.draft;
        draft.kind = draft.kind.toggle();
        if !self.visible_fields().contains(&self.field) {
            self.field = ComposeField::Kind;
        }
    }

    /// Cursor of the focused field.
    #[cfg(test)]
    pub fn cursor(&self) -> usize {
        self.cursors[self.field.index()]
    }

    fn input_mut(&mut self) -> Option<(&mut String, &mut usize)> {
        let cursor = &mut self.cursors[self.field.index()];
        let draft = &mut self.composer.draft;
        let input = match self.field {
            ComposeField::Text => &mut draft.text,
            ComposeField::Image => &mut draft.image_url,
            ComposeField::Recipient => &mut draft.recipient,
            ComposeField::Kind => return None,
        };
        // Submits clear fields behind our back.
        *cursor = (*cursor).min(input.chars().count());
        Some((input, cursor))
    }

    /// Insert a character at the cursor of the focused text field.
    pub fn insert_char(&mut self, c: char) {
        if let Some((input, cursor)) = self.input_mut() {
            let byte_pos = char_to_byte(input, *cursor);
            input.insert(byte_pos, c);
            *cursor += 1;
        }
    }

    /// Insert a newline; only the message body is multi-line.
    pub fn insert_newline(&mut self) {
        if self.field == ComposeField::Text {
            self.insert_char('\n');
        }
    }

    /// Delete the character before the cursor (backspace).
    pub fn backspace(&mut self) {
        if let Some((input, cursor)) = self.input_mut() {
            if *cursor > 0 {
                let byte_pos = char_to_byte(input, *cursor);
                let prev_byte_pos = char_to_byte(input, *cursor - 1);
                input.drain(prev_byte_pos..byte_pos);
                *cursor -= 1;
            }
        }
    }

    /// Delete the character at the cursor (delete key).
    pub fn delete(&mut self) {
        if let Some((input, cursor)) = self.input_mut() {
            if *cursor < input.chars().count() {
                let byte_pos = char_to_byte(input, *cursor);
                let next_byte_pos = char_to_byte(input, *cursor + 1);
                input.drain(byte_pos..next_byte_pos);
            }
        }
    }

    pub fn move_left(&mut self) {
        if let Some((_, cursor)) = self.input_mut() {
            *cursor = cursor.saturating_sub(1);
        }
    }

    pub fn move_right(&mut self) {
        if let Some((input, cursor)) = self.input_mut() {
            if *cursor < input.chars().count() {
                *cursor += 1;
            }
        }
    }

    pub fn move_home(&mut self) {
        if let Some((_, cursor)) = self.input_mut() {
            *cursor = 0;
        }
    }

    pub fn move_end(&mut self) {
        if let Some((input, cursor)) = self.input_mut() {
            *cursor = input.chars().count();
        }
    }

    /// Clear the focused field (Ctrl+U).
    pub fn clear(&mut self) {
        if let Some((input, cursor)) = self.input_mut() {
            input.clear();
            *cursor = 0;
        }
    }

    /// Start a submit and return the draft snapshot to send.
    /// Returns None if the message text is empty or whitespace-only.
    pub fn submit(&mut self) -> Option<Draft> {
        if self.composer.draft.text.trim().is_empty() {
            return None;
        }
        Some(self.composer.begin_submit())
    }
}

/// Convert a char-based cursor position to a byte offset.
fn char_to_byte(input: &str, char_pos: usize) -> usize {
    input
        .char_indices()
        .nth(char_pos)
        .map(|(i, _)| i)
        .unwrap_or(input.len())
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// 2 borders + 4 field rows + 1 status row.
pub const COMPOSE_HEIGHT: u16 = 7;

const LABEL_WIDTH: usize = 11;

/// Render the composer form into the given area.
///
/// Uses `Frame` directly so we can both write to the buffer and set cursor.
pub fn render(area: Rect, frame: &mut Frame, state: &ComposeState, focused: bool) {
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

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(border_style)
        .title(Span::styled(
            " New message ",
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let fields = state.visible_fields();
    for (row, field) in fields.iter().enumerate() {
        if row as u16 >= inner.height {
            return;
        }
        let row_area = Rect::new(inner.x, inner.y + row as u16, inner.width, 1);
        let is_focused = focused && *field == state.field;
        match field {
            ComposeField::Kind => render_kind_row(row_area, frame.buffer_mut(), state, is_focused),
            _ => {
                if let Some(cursor) = render_input_row(row_area, frame.buffer_mut(), state, *field, is_focused) {
                    frame.set_cursor_position(cursor);
                }
            }
        }
    }

    // Status row sits on the last inner line.
    if inner.height > fields.len() as u16 {
        let status_area = Rect::new(inner.x, inner.y + inner.height - 1, inner.width, 1);
        render_phase(status_area, frame.buffer_mut(), state.phase());
    }
}

fn label_span(field: ComposeField, focused: bool) -> Span<'static> {
    let style = if focused {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };
    Span::styled(format!(" {:<w$}", field.label(), w = LABEL_WIDTH - 1), style)
}

/// Render one text field row and return the cursor cell when focused.
fn render_input_row(
    area: Rect,
    buf: &mut Buffer,
    state: &ComposeState,
    field: ComposeField,
    focused: bool,
) -> Option<(u16, u16)> {
    let draft = state.draft();
    let (value, placeholder) = match field {
        ComposeField::Text => (&draft.text, "What's the tea?"),
        ComposeField::Image => (&draft.image_url, "optional"),
        ComposeField::Recipient => (&draft.recipient, "did:..."),
        ComposeField::Kind => return None,
    };

    let value_width = (area.width as usize).saturating_sub(LABEL_WIDTH);
    let cursor_pos = state.cursors[field.index()].min(value.chars().count());
    let display = compose_display_text(value, cursor_pos, value_width);

    let value_span = if value.is_empty() {
        let truncated: String = format!(" {}", placeholder).chars().take(value_width).collect();
        Span::styled(truncated, Style::default().fg(Color::DarkGray))
    } else {
        Span::styled(format!(" {}", display.visible), Style::default().fg(Color::White))
    };

    Paragraph::new(Line::from(vec![label_span(field, focused), value_span])).render(area, buf);

    if !focused || value_width == 0 {
        return None;
    }
    let offset = if value.is_empty() { 0 } else { display.cursor_offset };
    Some((area.x + LABEL_WIDTH as u16 + 1 + offset as u16, area.y))
}

fn render_kind_row(area: Rect, buf: &mut Buffer, state: &ComposeState, focused: bool) {
    let kind = state.draft().kind;
    let option = |k: MessageKind| {
        let selected = k == kind;
        let mark = if selected { "(*)" } else { "( )" };
        let style = if selected {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        Span::styled(format!(" {} {} ", mark, k), style)
    };

    let mut spans = vec![
        label_span(ComposeField::Kind, focused),
        option(MessageKind::Secret),
        option(MessageKind::Direct),
    ];
    if focused {
        spans.push(Span::styled(" Space to switch", Style::default().fg(Color::DarkGray)));
    }
    Paragraph::new(Line::from(spans)).render(area, buf);
}

fn render_phase(area: Rect, buf: &mut Buffer, phase: &ComposerPhase) {
    let Some(text) = phase.status_text() else {
        let hint = Span::styled(
            " Enter: submit  Alt+Enter: newline",
            Style::default().fg(Color::DarkGray),
        );
        Paragraph::new(Line::from(hint)).render(area, buf);
        return;
    };
    let color = match phase {
        ComposerPhase::Error(_) => Color::Red,
        ComposerPhase::Success => Color::Green,
        _ => Color::Yellow,
    };
    let truncated: String = format!(" {}", text).chars().take(area.width as usize).collect();
    Paragraph::new(Line::from(Span::styled(truncated, Style::default().fg(color))))
        .render(area, buf);
}

/// Information about what text to display and where the cursor is.
struct DisplayText {
    /// The visible portion of text to render.
    visible: String,
    /// The cursor offset within the visible text (in columns).
    cursor_offset: usize,
}

/// Compute the visible text and cursor offset for display.
///
/// Newlines are shown as " | " separators on the single display line.
/// Horizontal scrolling keeps the cursor visible.
fn compose_display_text(input: &str, cursor_pos: usize, width: usize) -> DisplayText {
    let flat: String = input.replace('\n', " | ");

    // Newline expands to three columns.
    let flat_cursor: usize = input
        .chars()
        .take(cursor_pos)
        .map(|ch| if ch == '\n' { 3 } else { 1 })
        .sum();

    // One column goes to the leading space.
    let avail = width.saturating_sub(1);
    if avail == 0 {
        return DisplayText {
            visible: String::new(),
            cursor_offset: 0,
        };
    }

    let flat_chars: Vec<char> = flat.chars().collect();
    if flat_chars.len() <= avail {
        return DisplayText {
            visible: flat,
            cursor_offset: flat_cursor,
        };
    }

    let scroll_start = if flat_cursor < avail {
        0
    } else {
        flat_cursor - avail + 1
    };
    let end = (scroll_start + avail).min(flat_chars.len());
    DisplayText {
        visible: flat_chars[scroll_start..end].iter().collect(),
        cursor_offset: flat_cursor - scroll_start,
    }
}
