//! Message retrieval: self-authored direct messages followed by everything
//! the local node lets us read.

use crate::dwn::{Did, Record, RecordsFilter};
use crate::models::{Message, DIRECT_MESSAGE_SCHEMA};
use crate::session::Session;

/// Direct messages authored by us.
pub async fn fetch_authored(session: &Session) -> Vec<Message> {
    tracing::debug!("Fetching sent messages...");
    let filter = RecordsFilter::protocol(&session.definition().protocol)
        .with_schema(DIRECT_MESSAGE_SCHEMA);
    query_branch(session, Some(session.did()), &filter, "sent").await
}

/// Every protocol record the local node lets us read, of any type.
pub async fn fetch_inbound(session: &Session) -> Vec<Message> {
    tracing::debug!("Fetching received messages...");
    let filter = RecordsFilter::protocol(&session.definition().protocol);
    query_branch(session, None, &filter, "received").await
}

/// Authored messages followed by inbound ones. No de-duplication: an own
/// direct message matches both queries and appears twice.
pub async fn fetch_all(session: &Session) -> Vec<Message> {
    let mut messages = fetch_authored(session).await;
    messages.extend(fetch_inbound(session).await);
    messages
}

async fn query_branch(
    session: &Session,
    from: Option<&Did>,
    filter: &RecordsFilter,
    branch: &str,
) -> Vec<Message> {
    match session.dwn().query_records(from, filter).await {
        Ok(reply) if reply.status.is_ok() => decode_records(&reply.records, branch),
        Ok(reply) => {
            tracing::error!("Error fetching {} messages: {}", branch, reply.status);
            Vec::new()
        }
        Err(e) => {
            tracing::error!("Error fetching {} messages: {:#}", branch, e);
            Vec::new()
        }
    }
}

/// Records that fail validation are skipped; the rest of the branch survives.
fn decode_records(records: &[Record], branch: &str) -> Vec<Message> {
    records
        .iter()
        .filter_map(|record| match Message::from_record(record) {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::warn!("Skipping {} record {}: {}", branch, record.id, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::dwn::{
        ConfigureReply, Dwn, DwnError, ProtocolsFilter, ProtocolsQueryReply, RecordsQueryReply,
        Status, WriteReply, WriteRequest,
    };
    use crate::models::ProtocolDefinition;

    /// Collaborator whose record queries return canned answers per branch.
    struct ScriptedDwn {
        authored: Result<RecordsQueryReply, u16>,
        inbound: Result<RecordsQueryReply, u16>,
    }

    fn answer(script: &Result<RecordsQueryReply, u16>) -> Result<RecordsQueryReply, DwnError> {
        match script {
            Ok(reply) => Ok(reply.clone()),
            Err(code) => Err(DwnError::Http {
                code: *code,
                url: "http://agent/rpc".to_string(),
                body: String::new(),
            }),
        }
    }

    #[async_trait]
    impl Dwn for ScriptedDwn {
        async fn query_protocols(
            &self,
            _from: Option<&Did>,
            _filter: &ProtocolsFilter,
        ) -> Result<ProtocolsQueryReply, DwnError> {
            unimplemented!()
        }

        async fn configure_protocol(
            &self,
            _definition: &ProtocolDefinition,
        ) -> Result<ConfigureReply, DwnError> {
            unimplemented!()
        }

        async fn send_protocol(
            &self,
            _definition: &ProtocolDefinition,
            _target: &Did,
        ) -> Result<Status, DwnError> {
            unimplemented!()
        }

        async fn write_record(&self, _request: WriteRequest) -> Result<WriteReply, DwnError> {
            unimplemented!()
        }

        async fn send_record(&self, _record_id: &str, _target: &Did) -> Result<Status, DwnError> {
            unimplemented!()
        }

        async fn query_records(
            &self,
            from: Option<&Did>,
            _filter: &RecordsFilter,
        ) -> Result<RecordsQueryReply, DwnError> {
            match from {
                Some(_) => answer(&self.authored),
                None => answer(&self.inbound),
            }
        }

        async fn delete_record(&self, _record_id: &str) -> Result<Status, DwnError> {
            unimplemented!()
        }
    }

    fn record(id: &str, text: &str) -> Record {
        let payload = serde_json::json!({
            "text": text,
            "timestamp": "1/2/2024 3:04:05 PM",
            "sender": "did:example:someone",
            "type": "Secret",
        });
        Record {
            id: id.to_string(),
            author: Did::from("did:example:someone"),
            recipient: Did::from("did:example:someone"),
            protocol: "p".to_string(),
            protocol_path: "secretMessage".to_string(),
            schema: "s".to_string(),
            data: serde_json::to_vec(&payload).unwrap(),
        }
    }

    fn ok(records: Vec<Record>) -> Result<RecordsQueryReply, u16> {
        Ok(RecordsQueryReply {
            records,
            status: Status::ok(),
        })
    }

    fn session(dwn: ScriptedDwn) -> Session {
        Session::new(Arc::new(dwn), Did::from("did:example:me"))
    }

    fn ids(messages: &[Message]) -> Vec<&str> {
        messages
            .iter()
            .map(|m| m.record_id.as_deref().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_fetch_all_is_authored_then_inbound() {
        let s = session(ScriptedDwn {
            authored: ok(vec![record("s1", "a"), record("s2", "b")]),
            inbound: ok(vec![record("r1", "c"), record("s1", "a"), record("r2", "d")]),
        });

        let all = fetch_all(&s).await;
        assert_eq!(ids(&all), vec!["s1", "s2", "r1", "s1", "r2"]);
        assert_eq!(all[2].text, "c");
    }

    #[tokio::test]
    async fn test_failed_branch_is_empty() {
        let s = session(ScriptedDwn {
            authored: Ok(RecordsQueryReply {
                records: vec![record("s1", "a")],
                status: Status::new(500, "Internal Server Error"),
            }),
            inbound: ok(vec![record("r1", "c")]),
        });
        assert_eq!(ids(&fetch_all(&s).await), vec!["r1"]);

        let s = session(ScriptedDwn {
            authored: ok(vec![record("s1", "a")]),
            inbound: Err(502),
        });
        assert_eq!(ids(&fetch_all(&s).await), vec!["s1"]);
    }

    #[tokio::test]
    async fn test_undecodable_record_is_skipped() {
        let mut broken = record("bad", "x");
        broken.data = b"{\"text\": 1}".to_vec();
        let s = session(ScriptedDwn {
            authored: ok(vec![]),
            inbound: ok(vec![record("r1", "c"), broken, record("r2", "d")]),
        });
        assert_eq!(ids(&fetch_inbound(&s).await), vec!["r1", "r2"]);
    }
}
