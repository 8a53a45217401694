//! Session context: the local identity plus the collaborator handle.
//!
//! Created once at startup and passed explicitly into every gateway call.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::dwn::{AgentClient, Did, Dwn, MemoryNetwork};
use crate::models::ProtocolDefinition;

/// Where the session's nodes live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Talk to the DWN agent configured in `Config::endpoint`.
    Agent,
    /// Ephemeral in-process nodes; nothing survives the process.
    Offline,
}

pub struct Session {
    dwn: Arc<dyn Dwn>,
    did: Did,
    definition: ProtocolDefinition,
}

impl Session {
    pub fn new(dwn: Arc<dyn Dwn>, did: Did) -> Self {
        Self {
            dwn,
            did,
            definition: ProtocolDefinition::burn_book(),
        }
    }

    /// Obtain an identity and a collaborator handle.
    ///
    /// In agent mode the reported identity is remembered in the config file.
    pub async fn connect(config: &mut Config, mode: Mode) -> Result<Self> {
        match mode {
            Mode::Agent => {
                let client = AgentClient::new(&config.endpoint)
                    .context("Failed to build DWN agent client")?;
                let did = client.connect(config.sync_interval()).await.with_context(|| {
                    format!("Failed to connect to DWN agent at {}", config.endpoint)
                })?;
                tracing::info!("Connected to DWN agent as {}", did);

                if config.set_did(&did) {
                    if let Err(e) = config.save() {
                        tracing::warn!("Failed to remember identity: {:#}", e);
                    }
                }
                Ok(Self::new(Arc::new(client), did))
            }
            Mode::Offline => {
                let network = MemoryNetwork::new();
                let did = network.create_identity();
                tracing::info!("Offline session as {}", did);
                Ok(Self::new(Arc::new(network.connect(did.clone())), did))
            }
        }
    }

    pub fn dwn(&self) -> &dyn Dwn {
        self.dwn.as_ref()
    }

    pub fn did(&self) -> &Did {
        &self.did
    }

    pub fn definition(&self) -> &ProtocolDefinition {
        &self.definition
    }

    /// Tear down the session. The agent keeps syncing on its own.
    pub fn close(self) {
        tracing::debug!("Closing session for {}", self.did);
    }
}
