//! Protocol bootstrap: make sure the burn book protocol is installed on the
//! local node and on our remote node.
//!
//! Both checks run on every startup. Installing an identical definition is a
//! no-op on the node side, so the whole operation is safe to repeat; it is not
//! atomic, and a run interrupted between the two halves is finished by the next.

use crate::dwn::{Did, ProtocolsFilter};
use crate::models::ProtocolDefinition;
use crate::session::Session;

/// Which installs a bootstrap run actually performed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapReport {
    pub local_installed: bool,
    pub remote_installed: bool,
}

/// Install `definition` locally and remotely where it is missing.
///
/// Failures are logged, never returned: a broken bootstrap surfaces later as
/// failed writes.
pub async fn ensure_installed(session: &Session, definition: &ProtocolDefinition) -> BootstrapReport {
    let filter = ProtocolsFilter {
        protocol: definition.protocol.clone(),
    };
    let mut report = BootstrapReport::default();

    if !is_installed(session, None, &filter).await {
        report.local_installed = install_local(session, definition).await;
        if report.local_installed {
            tracing::info!("Protocol installed locally");
        }
    }

    let own = session.did();
    if !is_installed(session, Some(own), &filter).await {
        report.remote_installed = install_remote(session, definition, own).await;
        if report.remote_installed {
            tracing::info!("Protocol installed remotely");
        }
    }

    report
}

/// A failed query counts as "not installed".
async fn is_installed(session: &Session, from: Option<&Did>, filter: &ProtocolsFilter) -> bool {
    let side = if from.is_some() { "remote" } else { "local" };
    match session.dwn().query_protocols(from, filter).await {
        Ok(reply) if reply.status.is_ok() => {
            tracing::debug!("{} protocol query: {} match(es)", side, reply.protocols.len());
            !reply.protocols.is_empty()
        }
        Ok(reply) => {
            tracing::warn!("{} protocol query failed: {}", side, reply.status);
            false
        }
        Err(e) => {
            tracing::warn!("{} protocol query error: {:#}", side, e);
            false
        }
    }
}

async fn install_local(session: &Session, definition: &ProtocolDefinition) -> bool {
    match session.dwn().configure_protocol(definition).await {
        Ok(reply) => {
            tracing::debug!("local configure: {}", reply.status);
            reply.protocol.is_some()
        }
        Err(e) => {
            tracing::error!("Failed to install protocol locally: {:#}", e);
            false
        }
    }
}

async fn install_remote(session: &Session, definition: &ProtocolDefinition, own: &Did) -> bool {
    let configured = match session.dwn().configure_protocol(definition).await {
        Ok(reply) => reply.protocol,
        Err(e) => {
            tracing::error!("Failed to configure protocol for remote install: {:#}", e);
            return false;
        }
    };
    let Some(protocol) = configured else {
        tracing::error!("Node refused protocol configuration; remote install skipped");
        return false;
    };

    match session.dwn().send_protocol(&protocol, own).await {
        Ok(status) if status.is_ok() || status.is_accepted() => true,
        Ok(status) => {
            tracing::error!("Remote protocol install rejected: {}", status);
            false
        }
        Err(e) => {
            tracing::error!("Failed to send protocol to {}: {:#}", own, e);
            false
        }
    }
}
