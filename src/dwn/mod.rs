//! Decentralized web node collaborator
//!
//! Everything durable (identity, signing, storage, replication) lives behind
//! the [`Dwn`] trait. Two implementations exist: [`AgentClient`] talks to a
//! local DWN agent over HTTP, [`MemoryNetwork`] keeps nodes in process.

pub mod client;
mod error;
pub mod memory;

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::models::ProtocolDefinition;

pub use client::AgentClient;
pub use error::DwnError;
pub use memory::MemoryNetwork;
#[cfg(test)]
pub use memory::MemoryDwn;

/// Decentralized identifier. Opaque: never parsed, only compared and passed on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Did(String);

impl Did {
    pub fn new(did: impl Into<String>) -> Self {
        Self(did.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Did {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Reply status of a node operation (HTTP-like codes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub code: u16,
    #[serde(default)]
    pub detail: String,
}

impl Status {
    pub const OK: u16 = 200;
    pub const ACCEPTED: u16 = 202;

    pub fn new(code: u16, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
        }
    }

    pub fn ok() -> Self {
        Self::new(Self::OK, "OK")
    }

    pub fn accepted() -> Self {
        Self::new(Self::ACCEPTED, "Accepted")
    }

    pub fn is_ok(&self) -> bool {
        self.code == Self::OK
    }

    pub fn is_accepted(&self) -> bool {
        self.code == Self::ACCEPTED
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.detail)
    }
}

/// Filter for protocol queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolsFilter {
    pub protocol: String,
}

#[derive(Debug, Clone)]
pub struct ProtocolsQueryReply {
    pub protocols: Vec<ProtocolDefinition>,
    pub status: Status,
}

#[derive(Debug, Clone)]
pub struct ConfigureReply {
    /// The configured protocol, present when the node accepted it.
    pub protocol: Option<ProtocolDefinition>,
    pub status: Status,
}

/// Filter for record queries. Unset fields do not constrain the match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
}

impl RecordsFilter {
    pub fn protocol(protocol: impl Into<String>) -> Self {
        Self {
            protocol: Some(protocol.into()),
            ..Self::default()
        }
    }

    pub fn record_id(record_id: impl Into<String>) -> Self {
        Self {
            record_id: Some(record_id.into()),
            ..Self::default()
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Whether a record satisfies every set field of this filter.
    pub fn matches(&self, record: &Record) -> bool {
        self.protocol
            .as_deref()
            .map_or(true, |p| record.protocol == p)
            && self.schema.as_deref().map_or(true, |s| record.schema == s)
            && self.record_id.as_deref().map_or(true, |id| record.id == id)
    }
}

/// A record write request.
#[derive(Debug, Clone)]
pub struct WriteRequest {
    /// JSON-encoded payload.
    pub data: Vec<u8>,
    pub protocol: String,
    pub protocol_path: String,
    pub schema: String,
    pub recipient: Did,
}

#[derive(Debug, Clone)]
pub struct WriteReply {
    pub record: Option<Record>,
    pub status: Status,
}

#[derive(Debug, Clone)]
pub struct RecordsQueryReply {
    pub records: Vec<Record>,
    pub status: Status,
}

/// A stored record as seen by this client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: String,
    pub author: Did,
    pub recipient: Did,
    pub protocol: String,
    pub protocol_path: String,
    pub schema: String,
    pub data: Vec<u8>,
}

impl Record {
    /// Decode the record payload as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, DwnError> {
        serde_json::from_slice(&self.data).map_err(DwnError::decode)
    }
}

/// Protocol and record operations of a decentralized web node, addressed on
/// behalf of one identity.
///
/// `from: None` targets the local node, `from: Some(did)` the node of `did`.
#[async_trait]
pub trait Dwn: Send + Sync {
    async fn query_protocols(
        &self,
        from: Option<&Did>,
        filter: &ProtocolsFilter,
    ) -> Result<ProtocolsQueryReply, DwnError>;

    /// Install a protocol on the local node.
    async fn configure_protocol(
        &self,
        definition: &ProtocolDefinition,
    ) -> Result<ConfigureReply, DwnError>;

    /// Replicate a configured protocol to the node of `target`.
    async fn send_protocol(
        &self,
        definition: &ProtocolDefinition,
        target: &Did,
    ) -> Result<Status, DwnError>;

    async fn write_record(&self, request: WriteRequest) -> Result<WriteReply, DwnError>;

    /// Transmit a locally written record to the node of `target`.
    async fn send_record(&self, record_id: &str, target: &Did) -> Result<Status, DwnError>;

    async fn query_records(
        &self,
        from: Option<&Did>,
        filter: &RecordsFilter,
    ) -> Result<RecordsQueryReply, DwnError>;

    async fn delete_record(&self, record_id: &str) -> Result<Status, DwnError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, protocol: &str, schema: &str) -> Record {
        Record {
            id: id.to_string(),
            author: Did::from("did:example:a"),
            recipient: Did::from("did:example:a"),
            protocol: protocol.to_string(),
            protocol_path: "secretMessage".to_string(),
            schema: schema.to_string(),
            data: br#"{"text":"x"}"#.to_vec(),
        }
    }

    #[test]
    fn test_filter_matches_only_set_fields() {
        let r = record("rec-1", "https://p", "https://s");

        assert!(RecordsFilter::default().matches(&r));
        assert!(RecordsFilter::protocol("https://p").matches(&r));
        assert!(!RecordsFilter::protocol("https://other").matches(&r));
        assert!(RecordsFilter::protocol("https://p")
            .with_schema("https://s")
            .matches(&r));
        assert!(!RecordsFilter::protocol("https://p")
            .with_schema("https://t")
            .matches(&r));
        assert!(RecordsFilter::record_id("rec-1").matches(&r));
        assert!(!RecordsFilter::record_id("rec-2").matches(&r));
    }

    #[test]
    fn test_filter_serializes_camel_case_without_nulls() {
        let json = serde_json::to_value(RecordsFilter::record_id("abc")).unwrap();
        assert_eq!(json, serde_json::json!({ "recordId": "abc" }));
    }

    #[test]
    fn test_status_codes() {
        assert!(Status::ok().is_ok());
        assert!(!Status::ok().is_accepted());
        assert!(Status::accepted().is_accepted());
        assert!(!Status::new(404, "Not Found").is_ok());
    }

    #[test]
    fn test_record_json_reports_decode_error() {
        let mut r = record("rec-1", "p", "s");
        r.data = b"not json".to_vec();
        let err = r.json::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, DwnError::Decode(_)));
    }
}
