//! TUI application state and main event loop

use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::{FutureExt, StreamExt};
use ratatui::DefaultTerminal;

use super::backend::{Backend, BackendCommand, BackendResponse};
use super::compose::{ComposeField, ComposeState};
use super::debug_log::DebugLogState;
use super::log_capture::LogBuffer;
use super::messages::MessagesState;
use super::ui;
use crate::config::Config;
use crate::dwn::Did;
use crate::session::Mode;

/// Housekeeping interval: log drain and status expiry.
const TICK_MS: u64 = 250;

/// How long a transient status line stays up.
const STATUS_TTL: Duration = Duration::from_secs(3);

/// Active pane in the TUI
#[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
pub enum Pane {
    #[default]
    Compose,
    Messages,
}

impl Pane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pane::Compose => "compose",
            Pane::Messages => "messages",
        }
    }

    fn other(&self) -> Self {
        match self {
            Pane::Compose => Pane::Messages,
            Pane::Messages => Pane::Compose,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Failed(String),
}

/// Application state
pub struct App {
    pub should_exit: bool,
    /// Our identity once the backend has connected.
    pub did: Option<Did>,
    pub connection: ConnectionState,
    pub active_pane: Pane,
    pub compose: ComposeState,
    pub messages: MessagesState,
    pub status_message: Option<String>,
    pub status_is_error: bool,
    status_until: Option<Instant>,
    pub show_help: bool,
    pub debug_log: DebugLogState,
}

impl App {
    pub fn new(logs: LogBuffer) -> Self {
        Self {
            should_exit: false,
            did: None,
            connection: ConnectionState::Connecting,
            active_pane: Pane::default(),
            compose: ComposeState::default(),
            messages: MessagesState::default(),
            status_message: None,
            status_is_error: false,
            status_until: None,
            show_help: false,
            debug_log: DebugLogState::new(logs),
        }
    }

    fn set_status(&mut self, msg: impl Into<String>, is_error: bool) {
        self.status_message = Some(msg.into());
        self.status_is_error = is_error;
        self.status_until = Some(Instant::now() + STATUS_TTL);
    }

    /// Drain captured logs and expire the status line.
    pub fn tick(&mut self) {
        self.debug_log.refresh();
        if self.status_until.is_some_and(|t| Instant::now() >= t) {
            self.status_message = None;
            self.status_until = None;
        }
    }

    fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }

    /// Issue a refresh with a fresh ticket.
    fn request_refresh(&mut self) -> Option<BackendCommand> {
        if !self.is_connected() {
            return None;
        }
        let ticket = self.messages.list.begin_refresh();
        self.messages.loading = true;
        Some(BackendCommand::Refresh { ticket })
    }

    fn request_submit(&mut self) -> Option<BackendCommand> {
        if !self.is_connected() {
            self.set_status("Not connected yet", true);
            return None;
        }
        let Some(draft) = self.compose.submit() else {
            self.set_status("Message is empty", true);
            return None;
        };
        Some(BackendCommand::Submit { draft })
    }

    fn request_delete(&mut self) -> Option<BackendCommand> {
        let Some(record_id) = self.messages.deletable_selection() else {
            self.set_status("Only your own messages can be deleted", true);
            return None;
        };
        if !self.messages.pending.try_begin(&record_id) {
            self.set_status("Delete already in progress", true);
            return None;
        }
        Some(BackendCommand::Delete { record_id })
    }

    /// Apply a backend response; may ask for a follow-up command.
    pub fn handle_response(&mut self, resp: BackendResponse) -> Option<BackendCommand> {
        match resp {
            BackendResponse::Connected { did } => {
                self.messages.own = Some(did.clone());
                self.did = Some(did);
                self.connection = ConnectionState::Connected;
                None
            }
            BackendResponse::Bootstrapped(report) => {
                tracing::debug!(
                    "Bootstrap: local installed {}, remote installed {}",
                    report.local_installed,
                    report.remote_installed
                );
                self.request_refresh()
            }
            BackendResponse::Submitted(result) => {
                if self.compose.composer.finish_submit(&result) {
                    self.request_refresh()
                } else {
                    None
                }
            }
            BackendResponse::Refreshed { ticket, messages } => {
                if self.messages.list.apply_refresh(ticket, messages) {
                    self.messages.loading = false;
                    self.messages.clamp_selection();
                }
                None
            }
            BackendResponse::Deleted { record_id, ok } => {
                self.messages.pending.finish(&record_id);
                if ok {
                    self.messages.list.remove(&record_id);
                    self.messages.clamp_selection();
                    self.set_status("Message deleted", false);
                } else {
                    self.set_status("Error deleting message (see debug log)", true);
                }
                None
            }
            BackendResponse::SessionError(e) => {
                tracing::error!("Session failed: {}", e);
                self.set_status(format!("Session failed: {}", e), true);
                self.connection = ConnectionState::Failed(e);
                None
            }
        }
    }

    /// Handle a key press; may produce a backend command.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<BackendCommand> {
        if self.show_help {
            self.show_help = false;
            return None;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => {
                self.should_exit = true;
                return None;
            }
            KeyCode::Char('r') if ctrl => return self.request_refresh(),
            KeyCode::Char('d') if ctrl => {
                self.debug_log.toggle();
                return None;
            }
            KeyCode::Char('y') if ctrl => {
                let text = match self.did {
                    Some(ref did) => format!("DID: {}", did),
                    None => "Not connected yet".to_string(),
                };
                self.set_status(text, false);
                return None;
            }
            KeyCode::F(1) => {
                self.show_help = true;
                return None;
            }
            KeyCode::Tab | KeyCode::BackTab => {
                self.active_pane = self.active_pane.other();
                return None;
            }
            KeyCode::PageUp if self.debug_log.visible => {
                self.debug_log.scroll_up(10);
                return None;
            }
            KeyCode::PageDown if self.debug_log.visible => {
                self.debug_log.scroll_down(10);
                return None;
            }
            _ => {}
        }

        match self.active_pane {
            Pane::Compose => self.handle_compose_key(key),
            Pane::Messages => self.handle_messages_key(key),
        }
    }

    fn handle_compose_key(&mut self, key: KeyEvent) -> Option<BackendCommand> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let alt = key.modifiers.contains(KeyModifiers::ALT);
        let on_kind = self.compose.field == ComposeField::Kind;

        match key.code {
            KeyCode::Enter if alt => self.compose.insert_newline(),
            KeyCode::Enter => return self.request_submit(),
            KeyCode::Up => self.compose.prev_field(),
            KeyCode::Down => self.compose.next_field(),
            KeyCode::Esc => self.active_pane = Pane::Messages,
            KeyCode::Char('u') if ctrl => self.compose.clear(),
            KeyCode::Char(' ') | KeyCode::Left | KeyCode::Right if on_kind => {
                self.compose.toggle_kind()
            }
            KeyCode::Char(c) if !ctrl => self.compose.insert_char(c),
            KeyCode::Backspace => self.compose.backspace(),
            KeyCode::Delete => self.compose.delete(),
            KeyCode::Left => self.compose.move_left(),
            KeyCode::Right => self.compose.move_right(),
            KeyCode::Home => self.compose.move_home(),
            KeyCode::End => self.compose.move_end(),
            _ => {}
        }
        None
    }

    fn handle_messages_key(&mut self, key: KeyEvent) -> Option<BackendCommand> {
        match key.code {
            KeyCode::Char('q') => self.should_exit = true,
            KeyCode::Up | KeyCode::Char('k') => self.messages.select_previous(),
            KeyCode::Down | KeyCode::Char('j') => self.messages.select_next(),
            KeyCode::Char('d') | KeyCode::Delete => return self.request_delete(),
            KeyCode::Char('r') => return self.request_refresh(),
            KeyCode::Esc => self.active_pane = Pane::Compose,
            _ => {}
        }
        None
    }

    /// Render the UI
    pub fn render(&self, frame: &mut ratatui::Frame) {
        ui::render(frame, self);
    }
}

/// Run the TUI with panic-safe terminal restore.
pub async fn run(config: Config, mode: Mode, logs: LogBuffer) -> Result<()> {
    let mut terminal = ratatui::init();
    let result = AssertUnwindSafe(run_app(&mut terminal, config, mode, logs))
        .catch_unwind()
        .await;
    ratatui::restore();

    match result {
        Ok(r) => r,
        Err(e) => std::panic::resume_unwind(e),
    }
}

async fn run_app(
    terminal: &mut DefaultTerminal,
    config: Config,
    mode: Mode,
    logs: LogBuffer,
) -> Result<()> {
    let mut app = App::new(logs);
    let mut backend = Backend::start(config, mode);
    let mut events = EventStream::new();
    let mut tick = tokio::time::interval(Duration::from_millis(TICK_MS));
    let mut backend_closed = false;

    while !app.should_exit {
        terminal.draw(|frame| app.render(frame))?;

        tokio::select! {
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    if let Some(cmd) = app.handle_key(key) {
                        backend.send(cmd);
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => app.should_exit = true,
            },
            resp = backend.recv(), if !backend_closed => match resp {
                Some(resp) => {
                    if let Some(cmd) = app.handle_response(resp) {
                        backend.send(cmd);
                    }
                }
                None => backend_closed = true,
            },
            _ = tick.tick() => app.tick(),
        }
    }

    Ok(())
}
