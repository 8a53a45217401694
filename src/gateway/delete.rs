//! Message deletion by record id.

use crate::dwn::RecordsFilter;
use crate::session::Session;

/// Locate the record with `record_id` and delete it. True only when the node
/// accepted the delete; every other outcome is logged. Never retried.
pub async fn remove(session: &Session, record_id: &str) -> bool {
    let filter = RecordsFilter::record_id(record_id);
    let reply = match session.dwn().query_records(None, &filter).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!("Error looking up record {}: {:#}", record_id, e);
            return false;
        }
    };

    let Some(record) = reply.records.first() else {
        tracing::error!("No record found with id {}", record_id);
        return false;
    };

    match session.dwn().delete_record(&record.id).await {
        Ok(status) if status.is_accepted() => {
            tracing::info!("Message {} deleted", record_id);
            true
        }
        Ok(status) => {
            tracing::error!("Error deleting message {}: {}", record_id, status);
            false
        }
        Err(e) => {
            tracing::error!("Error deleting message {}: {:#}", record_id, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::persist::persist;
    use crate::gateway::retrieve::fetch_inbound;
    use crate::gateway::testing::bootstrapped_session;
    use crate::models::{Draft, Message};
    use chrono::Local;

    #[tokio::test]
    async fn test_remove_existing_record() {
        let (dwn, session) = bootstrapped_session().await;
        let draft = Draft {
            text: "delete me".to_string(),
            ..Draft::default()
        };
        let message = Message::from_draft(&draft, session.did(), &Local::now());
        let persisted = persist(&session, message).await.unwrap();
        let id = persisted.record_id.unwrap();

        assert!(remove(&session, &id).await);
        assert!(fetch_inbound(&session).await.is_empty());
        assert_eq!(dwn.calls().record_deletes, 1);
    }

    #[tokio::test]
    async fn test_remove_unknown_record() {
        let (dwn, session) = bootstrapped_session().await;

        assert!(!remove(&session, "no-such-record").await);
        // Nothing found means no delete is attempted.
        assert_eq!(dwn.calls().record_deletes, 0);
    }

    #[tokio::test]
    async fn test_remove_when_node_unavailable() {
        let (dwn, session) = bootstrapped_session().await;
        dwn.set_unavailable(true);
        assert!(!remove(&session, "anything").await);
    }
}
