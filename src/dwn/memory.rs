//! In-process decentralized web nodes.
//!
//! A [`MemoryNetwork`] holds one node per identity; a [`MemoryDwn`] is the
//! collaborator handle of a single identity on that network. Used by tests
//! and by `--offline` mode.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    ConfigureReply, Did, Dwn, DwnError, ProtocolsFilter, ProtocolsQueryReply, Record,
    RecordsFilter, RecordsQueryReply, Status, WriteReply, WriteRequest,
};
use crate::models::{Action, Actor, ProtocolDefinition};

#[derive(Default)]
struct Node {
    /// Protocols configured by the node owner's own agent.
    local_protocols: Vec<ProtocolDefinition>,
    /// Protocols replicated to the node's remote endpoint.
    remote_protocols: Vec<ProtocolDefinition>,
    records: Vec<Record>,
}

impl Node {
    fn local_protocol(&self, uri: &str) -> Option<&ProtocolDefinition> {
        self.local_protocols.iter().find(|p| p.protocol == uri)
    }

    fn has_remote_protocol(&self, uri: &str) -> bool {
        self.remote_protocols.iter().any(|p| p.protocol == uri)
    }

    /// Whether `reader` may read `record` under the node's installed protocol rules.
    fn can_read(&self, reader: &Did, record: &Record) -> bool {
        if &record.author == reader {
            return true;
        }
        if &record.recipient != reader {
            return false;
        }
        let definition = self
            .local_protocol(&record.protocol)
            .or_else(|| {
                self.remote_protocols
                    .iter()
                    .find(|p| p.protocol == record.protocol)
            });
        definition.map_or(false, |d| {
            d.allows(&record.protocol_path, Actor::Recipient, Action::Read)
        })
    }
}

fn install(protocols: &mut Vec<ProtocolDefinition>, definition: &ProtocolDefinition) {
    protocols.retain(|p| p.protocol != definition.protocol);
    protocols.push(definition.clone());
}

/// Shared state of every node on an in-process network.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    nodes: Arc<RwLock<HashMap<Did, Node>>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh `did:key`-style identity. No key material is involved.
    pub fn create_identity(&self) -> Did {
        Did::new(format!("did:key:z{}", uuid::Uuid::new_v4().simple()))
    }

    /// Collaborator handle acting as `did`.
    pub fn connect(&self, did: Did) -> MemoryDwn {
        MemoryDwn {
            network: self.clone(),
            did,
            calls: CallCounters::default(),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Number of records stored on the node of `did`.
    #[cfg(test)]
    pub async fn record_count(&self, did: &Did) -> usize {
        self.nodes
            .read()
            .await
            .get(did)
            .map_or(0, |n| n.records.len())
    }
}

#[derive(Default)]
struct CallCounters {
    protocol_queries: AtomicUsize,
    protocol_configures: AtomicUsize,
    protocol_sends: AtomicUsize,
    record_writes: AtomicUsize,
    record_sends: AtomicUsize,
    record_queries: AtomicUsize,
    record_deletes: AtomicUsize,
}

/// Snapshot of how often each operation was invoked on a [`MemoryDwn`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DwnCalls {
    pub protocol_queries: usize,
    pub protocol_configures: usize,
    pub protocol_sends: usize,
    pub record_writes: usize,
    pub record_sends: usize,
    pub record_queries: usize,
    pub record_deletes: usize,
}

/// In-process collaborator for one identity.
pub struct MemoryDwn {
    network: MemoryNetwork,
    did: Did,
    calls: CallCounters,
    unavailable: AtomicBool,
}

impl Drop for MemoryDwn {
    fn drop(&mut self) {
        tracing::debug!("Closing in-memory node for {}: {:?}", self.did, self.calls());
    }
}

impl MemoryDwn {
    #[cfg(test)]
    pub fn did(&self) -> &Did {
        &self.did
    }

    pub fn calls(&self) -> DwnCalls {
        let c = &self.calls;
        DwnCalls {
            protocol_queries: c.protocol_queries.load(Ordering::Relaxed),
            protocol_configures: c.protocol_configures.load(Ordering::Relaxed),
            protocol_sends: c.protocol_sends.load(Ordering::Relaxed),
            record_writes: c.record_writes.load(Ordering::Relaxed),
            record_sends: c.record_sends.load(Ordering::Relaxed),
            record_queries: c.record_queries.load(Ordering::Relaxed),
            record_deletes: c.record_deletes.load(Ordering::Relaxed),
        }
    }

    /// While set, every operation answers `503 Service Unavailable`.
    #[cfg(test)]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    fn unavailable(&self) -> Option<Status> {
        self.unavailable
            .load(Ordering::Relaxed)
            .then(|| Status::new(503, "Service Unavailable"))
    }
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::Relaxed);
}

#[async_trait]
impl Dwn for MemoryDwn {
    async fn query_protocols(
        &self,
        from: Option<&Did>,
        filter: &ProtocolsFilter,
    ) -> Result<ProtocolsQueryReply, DwnError> {
        bump(&self.calls.protocol_queries);
        if let Some(status) = self.unavailable() {
            return Ok(ProtocolsQueryReply {
                protocols: Vec::new(),
                status,
            });
        }

        let nodes = self.network.nodes.read().await;
        let protocols = match from {
            None => nodes.get(&self.did).map(|n| &n.local_protocols),
            Some(did) => nodes.get(did).map(|n| &n.remote_protocols),
        }
        .map(|list| {
            list.iter()
                .filter(|p| p.protocol == filter.protocol)
                .cloned()
                .collect()
        })
        .unwrap_or_default();

        Ok(ProtocolsQueryReply {
            protocols,
            status: Status::ok(),
        })
    }

    async fn configure_protocol(
        &self,
        definition: &ProtocolDefinition,
    ) -> Result<ConfigureReply, DwnError> {
        bump(&self.calls.protocol_configures);
        if let Some(status) = self.unavailable() {
            return Ok(ConfigureReply {
                protocol: None,
                status,
            });
        }

        let mut nodes = self.network.nodes.write().await;
        let node = nodes.entry(self.did.clone()).or_default();
        install(&mut node.local_protocols, definition);
        tracing::debug!(did = %self.did, protocol = %definition.protocol, "protocol configured");

        Ok(ConfigureReply {
            protocol: Some(definition.clone()),
            status: Status::accepted(),
        })
    }

    async fn send_protocol(
        &self,
        definition: &ProtocolDefinition,
        target: &Did,
    ) -> Result<Status, DwnError> {
        bump(&self.calls.protocol_sends);
        if let Some(status) = self.unavailable() {
            return Ok(status);
        }

        let mut nodes = self.network.nodes.write().await;
        let configured = nodes
            .get(&self.did)
            .map_or(false, |n| n.local_protocol(&definition.protocol).is_some());
        if !configured {
            return Ok(Status::new(400, "protocol not configured locally"));
        }
        let node = nodes.entry(target.clone()).or_default();
        install(&mut node.remote_protocols, definition);

        Ok(Status::accepted())
    }

    async fn write_record(&self, request: WriteRequest) -> Result<WriteReply, DwnError> {
        bump(&self.calls.record_writes);
        if let Some(status) = self.unavailable() {
            return Ok(WriteReply {
                record: None,
                status,
            });
        }

        let mut nodes = self.network.nodes.write().await;
        let node = nodes.entry(self.did.clone()).or_default();

        let rejected = |detail: &str| WriteReply {
            record: None,
            status: Status::new(400, detail),
        };
        let Some(definition) = node.local_protocol(&request.protocol) else {
            return Ok(rejected("protocol not installed"));
        };
        match definition.schema_for(&request.protocol_path) {
            Some(schema) if schema == request.schema => {}
            Some(_) => return Ok(rejected("schema does not match protocol path")),
            None => return Ok(rejected("unknown protocol path")),
        }

        let record = Record {
            id: uuid::Uuid::new_v4().to_string(),
            author: self.did.clone(),
            recipient: request.recipient,
            protocol: request.protocol,
            protocol_path: request.protocol_path,
            schema: request.schema,
            data: request.data,
        };
        node.records.push(record.clone());

        Ok(WriteReply {
            record: Some(record),
            status: Status::ok(),
        })
    }

    async fn send_record(&self, record_id: &str, target: &Did) -> Result<Status, DwnError> {
        bump(&self.calls.record_sends);
        if let Some(status) = self.unavailable() {
            return Ok(status);
        }

        let mut nodes = self.network.nodes.write().await;
        let Some(record) = nodes
            .get(&self.did)
            .and_then(|n| n.records.iter().find(|r| r.id == record_id))
            .cloned()
        else {
            return Ok(Status::new(404, "Not Found"));
        };

        if target == &self.did {
            return Ok(Status::accepted());
        }

        let node = nodes.entry(target.clone()).or_default();
        if !node.has_remote_protocol(&record.protocol) {
            return Ok(Status::new(400, "protocol not installed on target"));
        }
        if !node.records.iter().any(|r| r.id == record.id) {
            node.records.push(record);
        }

        Ok(Status::accepted())
    }

    async fn query_records(
        &self,
        from: Option<&Did>,
        filter: &RecordsFilter,
    ) -> Result<RecordsQueryReply, DwnError> {
        bump(&self.calls.record_queries);
        if let Some(status) = self.unavailable() {
            return Ok(RecordsQueryReply {
                records: Vec::new(),
                status,
            });
        }

        let nodes = self.network.nodes.read().await;
        let node_did = from.unwrap_or(&self.did);
        let records = nodes
            .get(node_did)
            .map(|node| {
                node.records
                    .iter()
                    .filter(|r| from.map_or(true, |did| &r.author == did))
                    .filter(|r| node.can_read(&self.did, r))
                    .filter(|r| filter.matches(r))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(RecordsQueryReply {
            records,
            status: Status::ok(),
        })
    }

    async fn delete_record(&self, record_id: &str) -> Result<Status, DwnError> {
        bump(&self.calls.record_deletes);
        if let Some(status) = self.unavailable() {
            return Ok(status);
        }

        let mut nodes = self.network.nodes.write().await;
        let Some(node) = nodes.get_mut(&self.did) else {
            return Ok(Status::new(404, "Not Found"));
        };
        let Some(pos) = node.records.iter().position(|r| r.id == record_id) else {
            return Ok(Status::new(404, "Not Found"));
        };
        if node.records[pos].author != self.did {
            return Ok(Status::new(401, "only the author may delete"));
        }
        node.records.remove(pos);

        Ok(Status::accepted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DIRECT_MESSAGE_PATH, DIRECT_MESSAGE_SCHEMA, PROTOCOL_URI};

    async fn bootstrapped(network: &MemoryNetwork) -> MemoryDwn {
        let dwn = network.connect(network.create_identity());
        let def = ProtocolDefinition::burn_book();
        dwn.configure_protocol(&def).await.unwrap();
        dwn.send_protocol(&def, &dwn.did().clone()).await.unwrap();
        dwn
    }

    fn direct_to(recipient: &Did) -> WriteRequest {
        WriteRequest {
            data: br#"{"text":"hi"}"#.to_vec(),
            protocol: PROTOCOL_URI.to_string(),
            protocol_path: DIRECT_MESSAGE_PATH.to_string(),
            schema: DIRECT_MESSAGE_SCHEMA.to_string(),
            recipient: recipient.clone(),
        }
    }

    #[tokio::test]
    async fn test_write_requires_local_protocol() {
        let network = MemoryNetwork::new();
        let dwn = network.connect(network.create_identity());

        let reply = dwn.write_record(direct_to(dwn.did())).await.unwrap();
        assert_eq!(reply.status.code, 400);
        assert!(reply.record.is_none());
    }

    #[tokio::test]
    async fn test_write_rejects_mismatched_schema() {
        let network = MemoryNetwork::new();
        let dwn = bootstrapped(&network).await;

        let mut req = direct_to(dwn.did());
        req.schema = "https://example.com/secretMessageSchema".to_string();
        let reply = dwn.write_record(req).await.unwrap();
        assert_eq!(reply.status.code, 400);
    }

    #[tokio::test]
    async fn test_direct_record_reaches_recipient() {
        let network = MemoryNetwork::new();
        let alice = bootstrapped(&network).await;
        let bob = bootstrapped(&network).await;

        let reply = alice.write_record(direct_to(bob.did())).await.unwrap();
        let record = reply.record.unwrap();
        let status = alice.send_record(&record.id, bob.did()).await.unwrap();
        assert!(status.is_accepted());

        let inbound = bob
            .query_records(None, &RecordsFilter::protocol(PROTOCOL_URI))
            .await
            .unwrap();
        assert_eq!(inbound.records.len(), 1);
        assert_eq!(inbound.records[0].author, *alice.did());

        // Bob cannot delete what Alice authored.
        let status = bob.delete_record(&record.id).await.unwrap();
        assert_eq!(status.code, 401);
    }

    #[tokio::test]
    async fn test_send_requires_remote_protocol_on_target() {
        let network = MemoryNetwork::new();
        let alice = bootstrapped(&network).await;
        let stranger = network.create_identity();

        let record = alice
            .write_record(direct_to(&stranger))
            .await
            .unwrap()
            .record
            .unwrap();
        let status = alice.send_record(&record.id, &stranger).await.unwrap();
        assert_eq!(status.code, 400);
        assert_eq!(network.record_count(&stranger).await, 0);
    }

    #[tokio::test]
    async fn test_unavailable_node_answers_503() {
        let network = MemoryNetwork::new();
        let dwn = bootstrapped(&network).await;
        dwn.set_unavailable(true);

        let reply = dwn
            .query_records(None, &RecordsFilter::protocol(PROTOCOL_URI))
            .await
            .unwrap();
        assert_eq!(reply.status.code, 503);
        assert_eq!(dwn.delete_record("x").await.unwrap().code, 503);
        assert_eq!(dwn.calls().record_queries, 1);
        assert_eq!(dwn.calls().record_deletes, 1);
    }
}
