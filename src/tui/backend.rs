//! Async backend: runs DWN work off the TUI event loop.
//!
//! Uses an mpsc channel pair. The TUI sends `BackendCommand` values, and a
//! background tokio task executes them and sends `BackendResponse` values back.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;

use crate::book::{self, RefreshTicket};
use crate::config::Config;
use crate::dwn::Did;
use crate::gateway::{self, BootstrapReport};
use crate::models::{Draft, Message};
use crate::session::{Mode, Session};

/// Commands sent from the TUI event loop to the async backend.
#[derive(Debug)]
pub enum BackendCommand {
    Submit { draft: Draft },
    Refresh { ticket: RefreshTicket },
    Delete { record_id: String },
}

/// Responses from the async backend to the TUI.
#[derive(Debug)]
pub enum BackendResponse {
    Connected { did: Did },
    Bootstrapped(BootstrapReport),
    Submitted(Result<Message>),
    Refreshed {
        ticket: RefreshTicket,
        messages: Vec<Message>,
    },
    Deleted { record_id: String, ok: bool },
    /// Session creation failed; nothing else will arrive.
    SessionError(String),
}

/// Handle for interacting with the backend from the TUI side.
pub struct Backend {
    cmd_tx: mpsc::UnboundedSender<BackendCommand>,
    resp_rx: mpsc::UnboundedReceiver<BackendResponse>,
}

impl Backend {
    /// Start the backend. Spawns a tokio task that connects the session and
    /// then processes commands.
    pub fn start(config: Config, mode: Mode) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (resp_tx, resp_rx) = mpsc::unbounded_channel();

        tokio::spawn(backend_loop(config, mode, cmd_rx, resp_tx));

        Self { cmd_tx, resp_rx }
    }

    /// Send a command to the backend (non-blocking).
    pub fn send(&self, cmd: BackendCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            tracing::error!("Backend channel closed -- command dropped");
        }
    }

    /// Receive a response from the backend.
    ///
    /// Returns `None` only when the backend channel is permanently closed.
    /// Designed to be used inside `tokio::select!`.
    pub async fn recv(&mut self) -> Option<BackendResponse> {
        self.resp_rx.recv().await
    }
}

/// Background loop that processes commands.
///
/// Connects one session, installs the protocol where missing, and shares the
/// session across all command tasks.
async fn backend_loop(
    mut config: Config,
    mode: Mode,
    mut cmd_rx: mpsc::UnboundedReceiver<BackendCommand>,
    resp_tx: mpsc::UnboundedSender<BackendResponse>,
) {
    let session = match Session::connect(&mut config, mode).await {
        Ok(s) => Arc::new(s),
        Err(e) => {
            let _ = resp_tx.send(BackendResponse::SessionError(format!("{:#}", e)));
            return;
        }
    };
    let _ = resp_tx.send(BackendResponse::Connected {
        did: session.did().clone(),
    });

    let report = gateway::ensure_installed(&session, session.definition()).await;
    let _ = resp_tx.send(BackendResponse::Bootstrapped(report));

    while let Some(cmd) = cmd_rx.recv().await {
        let session = Arc::clone(&session);
        let resp_tx = resp_tx.clone();

        // Each command runs on its own task; overlapping submits are allowed.
        tokio::spawn(async move {
            let response = execute(&session, cmd).await;
            let _ = resp_tx.send(response);
        });
    }

    // In-flight tasks may still hold a clone.
    match Arc::try_unwrap(session) {
        Ok(session) => session.close(),
        Err(_) => tracing::debug!("Session still in use at shutdown"),
    }
}

async fn execute(session: &Session, cmd: BackendCommand) -> BackendResponse {
    match cmd {
        BackendCommand::Submit { draft } => {
            BackendResponse::Submitted(book::submit(session, &draft).await)
        }
        BackendCommand::Refresh { ticket } => BackendResponse::Refreshed {
            ticket,
            messages: gateway::fetch_all(session).await,
        },
        BackendCommand::Delete { record_id } => {
            let ok = gateway::remove(session, &record_id).await;
            BackendResponse::Deleted { record_id, ok }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::DisplayList;
    use crate::gateway::testing::bootstrapped_session;

    #[tokio::test]
    async fn test_execute_submit_then_refresh() {
        let (_dwn, session) = bootstrapped_session().await;

        let draft = Draft {
            text: "from the backend".to_string(),
            ..Draft::default()
        };
        let resp = execute(&session, BackendCommand::Submit { draft }).await;
        let BackendResponse::Submitted(result) = resp else {
            panic!("expected Submitted");
        };
        let id = tokio_test::assert_ok!(result).record_id.unwrap();

        let mut list = DisplayList::default();
        let ticket = list.begin_refresh();
        let resp = execute(&session, BackendCommand::Refresh { ticket }).await;
        let BackendResponse::Refreshed { ticket, messages } = resp else {
            panic!("expected Refreshed");
        };
        assert!(list.apply_refresh(ticket, messages));
        assert_eq!(list.messages()[0].record_id.as_deref(), Some(id.as_str()));
    }

    #[tokio::test]
    async fn test_execute_delete_unknown() {
        let (_dwn, session) = bootstrapped_session().await;
        let resp = execute(
            &session,
            BackendCommand::Delete {
                record_id: "nope".to_string(),
            },
        )
        .await;
        match resp {
            BackendResponse::Deleted { record_id, ok } => {
                assert_eq!(record_id, "nope");
                assert!(!ok);
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_offline_backend_connects_and_bootstraps() {
        let mut backend = Backend::start(Config::default(), Mode::Offline);

        let did = match backend.recv().await {
            Some(BackendResponse::Connected { did }) => did,
            other => panic!("unexpected response: {:?}", other),
        };
        assert!(did.as_str().starts_with("did:key:"));

        match backend.recv().await {
            Some(BackendResponse::Bootstrapped(report)) => {
                assert!(report.local_installed);
                assert!(report.remote_installed);
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }
}
