//! Message persistence: write a message as a protocol record, then send it on.

use crate::dwn::{Did, Status, WriteRequest};
use crate::models::{Message, MessageKind};
use crate::session::Session;

/// Write `message` under its protocol path and return it with the assigned
/// record id. `None` means the write failed; the reason is logged.
pub async fn persist(session: &Session, mut message: Message) -> Option<Message> {
    let definition = session.definition();
    let path = message.kind.protocol_path();
    let schema = definition
        .schema_for(path)
        .unwrap_or_else(|| message.kind.schema())
        .to_string();

    // Secrets are addressed to ourselves; directs to whoever the draft named.
    let recipient = match message.kind {
        MessageKind::Secret => session.did().clone(),
        MessageKind::Direct => message
            .recipient_did
            .clone()
            .unwrap_or_else(|| Did::new("")),
    };

    let data = match message.payload() {
        Ok(data) => data,
        Err(e) => {
            tracing::error!("Error encoding {} message: {:#}", message.kind, e);
            return None;
        }
    };

    let request = WriteRequest {
        data,
        protocol: definition.protocol.clone(),
        protocol_path: path.to_string(),
        schema,
        recipient,
    };

    match session.dwn().write_record(request).await {
        Ok(reply) if reply.status.is_ok() => match reply.record {
            Some(record) => {
                tracing::debug!("{} message written as {}", message.kind, record.id);
                message.record_id = Some(record.id);
                Some(message)
            }
            None => {
                tracing::error!("{} message write returned no record", message.kind);
                None
            }
        },
        Ok(reply) => {
            tracing::error!("{} message write rejected: {}", message.kind, reply.status);
            None
        }
        Err(e) => {
            tracing::error!("Error writing {} message to DWN: {:#}", message.kind, e);
            None
        }
    }
}

/// Transmit a persisted message to its logical target (self for secrets, the
/// recipient for directs). The outcome is informational only.
pub async fn send_to_target(session: &Session, message: &Message) -> Option<Status> {
    let Some(record_id) = message.record_id.as_deref() else {
        tracing::warn!("Refusing to send a message that was never written");
        return None;
    };
    let target = message.target(session.did());

    match session.dwn().send_record(record_id, &target).await {
        Ok(status) => {
            tracing::info!("Send record {} to {}: {}", record_id, target, status);
            Some(status)
        }
        Err(e) => {
            tracing::error!("Error sending record {} to {}: {:#}", record_id, target, e);
            None
        }
    }
}
