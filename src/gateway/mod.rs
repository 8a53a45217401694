//! Gateways between the burn book and the DWN collaborator
//!
//! Each gateway logs its own failures and hands back an empty or negative
//! result instead of an error; only the composer turns failure into a
//! user-facing message.

pub mod bootstrap;
pub mod delete;
pub mod persist;
pub mod retrieve;

use anyhow::{bail, Result};

use crate::book;
use crate::models::{Draft, Message, MessageKind};
use crate::session::Session;

pub use bootstrap::{ensure_installed, BootstrapReport};
pub use delete::remove;
pub use persist::{persist, send_to_target};
pub use retrieve::fetch_all;
#[cfg(test)]
pub use retrieve::{fetch_authored, fetch_inbound};

/// Print the session identity.
pub fn whoami(session: &Session) {
    println!();
    println!("DID: {}", session.did());
}

/// Install the protocol where missing (prints to stdout).
pub async fn bootstrap(session: &Session) -> Result<()> {
    let report = ensure_installed(session, session.definition()).await;
    println!(
        "Protocol {}: local {}, remote {}",
        session.definition().protocol,
        if report.local_installed { "installed" } else { "unchanged" },
        if report.remote_installed { "installed" } else { "unchanged" },
    );
    Ok(())
}

/// Compose and submit a message from command-line arguments.
pub async fn post(
    session: &Session,
    text: &str,
    to: Option<String>,
    image_url: Option<String>,
) -> Result<()> {
    let draft = Draft {
        text: text.to_string(),
        image_url: image_url.unwrap_or_default(),
        kind: if to.is_some() {
            MessageKind::Direct
        } else {
            MessageKind::Secret
        },
        recipient: to.unwrap_or_default(),
    };

    let message = book::submit(session, &draft).await?;
    println!(
        "Message submitted successfully ({} record {})",
        message.kind,
        message.record_id.as_deref().unwrap_or("?")
    );
    Ok(())
}

/// Print every visible message, authored ones first.
pub async fn list(session: &Session) -> Result<()> {
    let messages = fetch_all(session).await;

    println!("\nMessages:");
    println!("{:-<60}", "");

    if messages.is_empty() {
        println!("  (no messages)");
        return Ok(());
    }

    for msg in &messages {
        print_message(msg, session);
        println!();
    }

    Ok(())
}

fn print_message(msg: &Message, session: &Session) {
    let own = if &msg.sender == session.did() { " (you)" } else { "" };
    println!("[{}] {}", msg.kind, msg.timestamp);
    println!("  From: {}{}", msg.sender, own);
    if let Some(ref to) = msg.recipient_did {
        println!("  To:   {}", to);
    }
    println!("  {}", msg.text);
    if let Some(ref url) = msg.image_url {
        println!("  Image: {}", url);
    }
    if let Some(ref id) = msg.record_id {
        println!("  ID: {}", id);
    }
}

/// Delete one of our records by id.
pub async fn delete(session: &Session, record_id: &str) -> Result<()> {
    if !remove(session, record_id).await {
        bail!("Message {} was not deleted (see log for details)", record_id);
    }
    println!("Message deleted.");
    Ok(())
}
