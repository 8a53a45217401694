//! Composer state machine and the display list.
//!
//! Submissions are deliberately not serialized: two overlapping submits both
//! reach the node. Refreshes carry a generation ticket so a slow, stale fetch
//! cannot overwrite a newer list, and a record id can only have one delete in
//! flight at a time.

use std::collections::HashSet;

use anyhow::{bail, Result};
use chrono::Local;

use crate::gateway::{persist, send_to_target};
use crate::models::{Draft, Message};
use crate::session::Session;

/// Construct, persist and send one message.
///
/// The send step is informational; only a failed write fails the submit.
pub async fn submit(session: &Session, draft: &Draft) -> Result<Message> {
    tracing::info!("Submitting {} message...", draft.kind);
    let message = Message::from_draft(draft, session.did(), &Local::now());

    let Some(persisted) = persist(session, message).await else {
        bail!("Failed to create record");
    };

    if let Some(status) = send_to_target(session, &persisted).await {
        tracing::debug!("Send record status after submit: {}", status);
    }

    Ok(persisted)
}

/// Composer lifecycle: Idle -> Submitting -> Success | Error.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum ComposerPhase {
    #[default]
    Idle,
    Submitting,
    Success,
    Error(String),
}

impl ComposerPhase {
    /// Status line shown under the composer.
    pub fn status_text(&self) -> Option<String> {
        match self {
            ComposerPhase::Idle => None,
            ComposerPhase::Submitting => Some("Submitting...".to_string()),
            ComposerPhase::Success => Some("Message submitted successfully".to_string()),
            ComposerPhase::Error(msg) => Some(format!("Error submitting message: {}", msg)),
        }
    }

    #[cfg(test)]
    pub fn is_error(&self) -> bool {
        matches!(self, ComposerPhase::Error(_))
    }
}

/// Draft fields plus where the last submit stands.
#[derive(Debug, Default)]
pub struct Composer {
    pub draft: Draft,
    pub phase: ComposerPhase,
}

impl Composer {
    /// Enter `Submitting` and hand out a snapshot of the draft to submit.
    pub fn begin_submit(&mut self) -> Draft {
        self.phase = ComposerPhase::Submitting;
        self.draft.clone()
    }

    /// Apply a submit outcome. Success clears text and image and leaves kind
    /// and recipient for the next message; failure keeps the whole draft.
    /// Returns true when the list should be refreshed.
    pub fn finish_submit(&mut self, result: &Result<Message>) -> bool {
        match result {
            Ok(_) => {
                self.phase = ComposerPhase::Success;
                self.draft.text.clear();
                self.draft.image_url.clear();
                true
            }
            Err(e) => {
                tracing::error!("Error in submit: {:#}", e);
                self.phase = ComposerPhase::Error(format!("{:#}", e));
                false
            }
        }
    }
}

/// Generation of a refresh request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RefreshTicket(u64);

/// Messages as shown to the user, rebuilt wholesale on every refresh.
#[derive(Debug, Default)]
pub struct DisplayList {
    messages: Vec<Message>,
    issued: u64,
    applied: u64,
}

impl DisplayList {
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn begin_refresh(&mut self) -> RefreshTicket {
        self.issued += 1;
        RefreshTicket(self.issued)
    }

    /// Replace the list with a fetch result unless a newer refresh already landed.
    pub fn apply_refresh(&mut self, ticket: RefreshTicket, messages: Vec<Message>) -> bool {
        if ticket.0 <= self.applied {
            tracing::debug!(
                "Dropping stale refresh #{} (already showing #{})",
                ticket.0,
                self.applied
            );
            return false;
        }
        self.applied = ticket.0;
        self.messages = messages;
        true
    }

    /// Remove the first entry with `record_id`, keeping the order of the rest.
    pub fn remove(&mut self, record_id: &str) -> bool {
        match self
            .messages
            .iter()
            .position(|m| m.record_id.as_deref() == Some(record_id))
        {
            Some(pos) => {
                self.messages.remove(pos);
                true
            }
            None => false,
        }
    }
}

/// Record ids with a delete in flight.
#[derive(Debug, Default)]
pub struct PendingDeletes {
    ids: HashSet<String>,
}

impl PendingDeletes {
    /// Claim `record_id`; false when a delete for it is already running.
    pub fn try_begin(&mut self, record_id: &str) -> bool {
        self.ids.insert(record_id.to_string())
    }

    pub fn finish(&mut self, record_id: &str) {
        self.ids.remove(record_id);
    }

    pub fn contains(&self, record_id: &str) -> bool {
        self.ids.contains(record_id)
    }
}
