//! HTTP client for a local DWN agent
//!
//! The agent owns the keys: it signs every message, persists to its local
//! node and syncs with remote nodes. We speak JSON-RPC 2.0 to its `/rpc`
//! endpoint; record payloads travel base64url-encoded.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{
    ConfigureReply, Did, Dwn, DwnError, ProtocolsFilter, ProtocolsQueryReply, Record,
    RecordsFilter, RecordsQueryReply, Status, WriteReply, WriteRequest,
};
use crate::models::ProtocolDefinition;

const JSON_DATA_FORMAT: &str = "application/json";

// -- JSON-RPC envelope --

#[derive(Serialize)]
struct RpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: String,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct RpcResponse<R> {
    result: Option<R>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

// -- Method params and results --

#[derive(Serialize)]
struct ConnectParams {
    sync: String,
}

#[derive(Deserialize)]
struct ConnectResult {
    did: Did,
}

#[derive(Serialize)]
struct ProtocolsQueryParams<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<&'a Did>,
    filter: &'a ProtocolsFilter,
}

#[derive(Deserialize)]
struct ProtocolsQueryResult {
    #[serde(default)]
    protocols: Vec<ProtocolDefinition>,
    status: Status,
}

#[derive(Serialize)]
struct ConfigureParams<'a> {
    definition: &'a ProtocolDefinition,
}

#[derive(Deserialize)]
struct ConfigureResult {
    protocol: Option<ProtocolDefinition>,
    status: Status,
}

#[derive(Serialize)]
struct ProtocolSendParams<'a> {
    definition: &'a ProtocolDefinition,
    target: &'a Did,
}

#[derive(Deserialize)]
struct StatusResult {
    status: Status,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WriteParams {
    encoded_data: String,
    data_format: &'static str,
    protocol: String,
    protocol_path: String,
    schema: String,
    recipient: Did,
}

/// Record as the agent serializes it.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRecord {
    record_id: String,
    author: Did,
    recipient: Did,
    protocol: String,
    protocol_path: String,
    schema: String,
    #[serde(default)]
    encoded_data: String,
}

impl TryFrom<WireRecord> for Record {
    type Error = DwnError;

    fn try_from(wire: WireRecord) -> Result<Self, Self::Error> {
        let data = URL_SAFE_NO_PAD
            .decode(wire.encoded_data.as_bytes())
            .map_err(|e| DwnError::Decode(format!("record {}: {}", wire.record_id, e)))?;
        Ok(Record {
            id: wire.record_id,
            author: wire.author,
            recipient: wire.recipient,
            protocol: wire.protocol,
            protocol_path: wire.protocol_path,
            schema: wire.schema,
            data,
        })
    }
}

/// Decode wire records one at a time; a record with bad `encodedData` is dropped.
fn decode_records(wire: Vec<WireRecord>) -> Vec<Record> {
    wire.into_iter()
        .filter_map(|w| match Record::try_from(w) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("Skipping undecodable record: {}", e);
                None
            }
        })
        .collect()
}

#[derive(Deserialize)]
struct WriteResult {
    record: Option<WireRecord>,
    status: Status,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordRefParams<'a> {
    record_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<&'a Did>,
}

#[derive(Serialize)]
struct RecordsQueryParams<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<&'a Did>,
    filter: &'a RecordsFilter,
}

#[derive(Deserialize)]
struct RecordsQueryResult {
    #[serde(default)]
    records: Vec<WireRecord>,
    status: Status,
}

/// Collaborator backed by a DWN agent reachable over HTTP.
pub struct AgentClient {
    http: reqwest::Client,
    rpc_url: Url,
}

impl AgentClient {
    /// Build a client for the agent at `endpoint` (e.g. `http://localhost:8085`).
    pub fn new(endpoint: &str) -> Result<Self, DwnError> {
        Ok(Self {
            http: reqwest::Client::new(),
            rpc_url: rpc_url(endpoint)?,
        })
    }

    /// Ask the agent for its identity, starting periodic sync at `sync_interval`.
    pub async fn connect(&self, sync_interval: Duration) -> Result<Did, DwnError> {
        let params = ConnectParams {
            sync: format!("{}s", sync_interval.as_secs()),
        };
        let result: ConnectResult = self.call("connect", params).await?;
        Ok(result.did)
    }

    async fn call<P, R>(&self, method: &str, params: P) -> Result<R, DwnError>
    where
        P: Serialize + Send,
        R: DeserializeOwned + Send,
    {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: uuid::Uuid::new_v4().to_string(),
            method,
            params,
        };
        tracing::debug!("Agent RPC {} -> {}", method, self.rpc_url);

        let resp = self
            .http
            .post(self.rpc_url.clone())
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DwnError::Http {
                code: status.as_u16(),
                url: self.rpc_url.to_string(),
                body,
            });
        }

        let body: RpcResponse<R> = resp.json().await?;
        unwrap_rpc(method, body)
    }
}

fn rpc_url(endpoint: &str) -> Result<Url, DwnError> {
    let mut base = Url::parse(endpoint)
        .map_err(|e| DwnError::Encode(format!("invalid agent endpoint {}: {}", endpoint, e)))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("rpc")
        .map_err(|e| DwnError::Encode(format!("invalid agent endpoint {}: {}", endpoint, e)))
}

fn unwrap_rpc<R>(method: &str, body: RpcResponse<R>) -> Result<R, DwnError> {
    if let Some(err) = body.error {
        return Err(DwnError::Rpc {
            code: err.code,
            message: err.message,
        });
    }
    body.result
        .ok_or_else(|| DwnError::Decode(format!("{} reply has neither result nor error", method)))
}

#[async_trait]
impl Dwn for AgentClient {
    async fn query_protocols(
        &self,
        from: Option<&Did>,
        filter: &ProtocolsFilter,
    ) -> Result<ProtocolsQueryReply, DwnError> {
        let result: ProtocolsQueryResult = self
            .call("dwn.protocols.query", ProtocolsQueryParams { from, filter })
            .await?;
        Ok(ProtocolsQueryReply {
            protocols: result.protocols,
            status: result.status,
        })
    }

    async fn configure_protocol(
        &self,
        definition: &ProtocolDefinition,
    ) -> Result<ConfigureReply, DwnError> {
        let result: ConfigureResult = self
            .call("dwn.protocols.configure", ConfigureParams { definition })
            .await?;
        Ok(ConfigureReply {
            protocol: result.protocol,
            status: result.status,
        })
    }

    async fn send_protocol(
        &self,
        definition: &ProtocolDefinition,
        target: &Did,
    ) -> Result<Status, DwnError> {
        let result: StatusResult = self
            .call("dwn.protocols.send", ProtocolSendParams { definition, target })
            .await?;
        Ok(result.status)
    }

    async fn write_record(&self, request: WriteRequest) -> Result<WriteReply, DwnError> {
        let params = WriteParams {
            encoded_data: URL_SAFE_NO_PAD.encode(&request.data),
            data_format: JSON_DATA_FORMAT,
            protocol: request.protocol,
            protocol_path: request.protocol_path,
            schema: request.schema,
            recipient: request.recipient,
        };
        let result: WriteResult = self.call("dwn.records.write", params).await?;
        Ok(WriteReply {
            record: result.record.map(Record::try_from).transpose()?,
            status: result.status,
        })
    }

    async fn send_record(&self, record_id: &str, target: &Did) -> Result<Status, DwnError> {
        let params = RecordRefParams {
            record_id,
            target: Some(target),
        };
        let result: StatusResult = self.call("dwn.records.send", params).await?;
        Ok(result.status)
    }

    async fn query_records(
        &self,
        from: Option<&Did>,
        filter: &RecordsFilter,
    ) -> Result<RecordsQueryReply, DwnError> {
        let result: RecordsQueryResult = self
            .call("dwn.records.query", RecordsQueryParams { from, filter })
            .await?;
        Ok(RecordsQueryReply {
            records: decode_records(result.records),
            status: result.status,
        })
    }

    async fn delete_record(&self, record_id: &str) -> Result<Status, DwnError> {
        let params = RecordRefParams {
            record_id,
            target: None,
        };
        let result: StatusResult = self.call("dwn.records.delete", params).await?;
        Ok(result.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_url_appends_segment() {
        assert_eq!(
            rpc_url("http://localhost:8085").unwrap().as_str(),
            "http://localhost:8085/rpc"
        );
        assert_eq!(
            rpc_url("https://agent.example/v1").unwrap().as_str(),
            "https://agent.example/v1/rpc"
        );
        assert!(rpc_url("not a url").is_err());
    }

    #[test]
    fn test_wire_record_decodes_payload() {
        let wire = WireRecord {
            record_id: "bafy123".to_string(),
            author: Did::from("did:example:a"),
            recipient: Did::from("did:example:b"),
            protocol: "p".to_string(),
            protocol_path: "directMessage".to_string(),
            schema: "s".to_string(),
            encoded_data: URL_SAFE_NO_PAD.encode(br#"{"text":"hi"}"#),
        };
        let record = Record::try_from(wire).unwrap();
        assert_eq!(record.id, "bafy123");
        assert_eq!(record.data, br#"{"text":"hi"}"#);
    }

    #[test]
    fn test_wire_record_rejects_bad_base64() {
        let json = serde_json::json!({
            "recordId": "r", "author": "a", "recipient": "b", "protocol": "p",
            "protocolPath": "x", "schema": "s", "encodedData": "%%%"
        });
        let wire: WireRecord = serde_json::from_value(json).unwrap();
        assert!(matches!(Record::try_from(wire), Err(DwnError::Decode(_))));
    }

    #[test]
    fn test_bad_record_does_not_drop_its_siblings() {
        let json = serde_json::json!({
            "status": { "code": 200, "detail": "OK" },
            "records": [
                {
                    "recordId": "good", "author": "a", "recipient": "b", "protocol": "p",
                    "protocolPath": "x", "schema": "s", "encodedData": "e30"
                },
                {
                    "recordId": "bad", "author": "a", "recipient": "b", "protocol": "p",
                    "protocolPath": "x", "schema": "s", "encodedData": "%%%"
                }
            ]
        });
        let result: RecordsQueryResult = serde_json::from_value(json).unwrap();
        let records = decode_records(result.records);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "good");
        assert_eq!(records[0].data, b"{}");
    }

    #[test]
    fn test_request_envelope_shape() {
        let filter = RecordsFilter::protocol("https://p");
        let from = Did::from("did:example:me");
        let req = RpcRequest {
            jsonrpc: "2.0",
            id: "1".to_string(),
            method: "dwn.records.query",
            params: RecordsQueryParams {
                from: Some(&from),
                filter: &filter,
            },
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": "1",
                "method": "dwn.records.query",
                "params": { "from": "did:example:me", "filter": { "protocol": "https://p" } }
            })
        );
    }

    #[test]
    fn test_rpc_error_object_surfaces() {
        let body: RpcResponse<StatusResult> = serde_json::from_value(serde_json::json!({
            "jsonrpc": "2.0", "id": "1",
            "error": { "code": -32601, "message": "method not found" }
        }))
        .unwrap();
        let err = unwrap_rpc("dwn.records.delete", body).err().unwrap();
        assert!(matches!(err, DwnError::Rpc { code: -32601, .. }));
    }

    #[test]
    fn test_rpc_result_unwraps() {
        let body: RpcResponse<StatusResult> = serde_json::from_value(serde_json::json!({
            "jsonrpc": "2.0", "id": "1",
            "result": { "status": { "code": 202, "detail": "Accepted" } }
        }))
        .unwrap();
        let result = unwrap_rpc("dwn.records.delete", body).ok().unwrap();
        assert!(result.status.is_accepted());
    }
}
