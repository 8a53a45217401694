//! Burn Book - secret and direct messages over a Decentralized Web Node
//!
//! A terminal client that stores messages as protocol records on the
//! user's DWN and sends direct messages to the recipient's node.

mod book;
mod config;
mod dwn;
mod gateway;
mod models;
mod session;
mod tui;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::session::{Mode, Session};

#[derive(Parser)]
#[command(name = "burn-book")]
#[command(about = "Secret and direct messages on your Decentralized Web Node", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use ephemeral in-process nodes instead of the DWN agent
    #[arg(long, global = true)]
    offline: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the identity this client acts as
    Whoami,

    /// Install the burn book protocol on the local and remote node
    Bootstrap,

    /// Submit a message (secret unless --to is given)
    Post {
        /// Message text
        text: String,

        /// Recipient DID; makes this a direct message
        #[arg(long)]
        to: Option<String>,

        /// Image URL to attach
        #[arg(long)]
        image: Option<String>,
    },

    /// List your messages and everything addressed to you
    List,

    /// Delete one of your messages
    Delete {
        /// Record ID (from `list` output)
        record_id: String,
    },

    /// Launch the terminal user interface
    Tui,
}

fn init_logging(verbose: bool, capture: Option<tui::LogBuffer>) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into());
    let registry = tracing_subscriber::registry().with(filter);

    match capture {
        // stderr would corrupt the alternate screen.
        Some(buffer) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(buffer),
            )
            .init(),
        None => registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mode = if cli.offline { Mode::Offline } else { Mode::Agent };

    let capture = matches!(cli.command, Commands::Tui).then(tui::LogBuffer::new);
    init_logging(cli.verbose, capture.clone());

    let mut config = Config::load()?;

    let command = match cli.command {
        Commands::Tui => {
            let logs = capture.unwrap_or_default();
            return tui::run(config, mode, logs).await;
        }
        command => command,
    };

    let session = Session::connect(&mut config, mode).await?;
    let result = run_command(&session, command).await;
    session.close();
    result
}

/// Run one non-interactive command against a connected session.
async fn run_command(session: &Session, command: Commands) -> Result<()> {
    match command {
        Commands::Whoami => {
            gateway::whoami(session);
            Ok(())
        }
        Commands::Bootstrap => gateway::bootstrap(session).await,
        Commands::Post { text, to, image } => {
            gateway::ensure_installed(session, session.definition()).await;
            gateway::post(session, &text, to, image).await
        }
        Commands::List => {
            gateway::ensure_installed(session, session.definition()).await;
            gateway::list(session).await
        }
        Commands::Delete { record_id } => {
            gateway::ensure_installed(session, session.definition()).await;
            gateway::delete(session, &record_id).await
        }
        Commands::Tui => anyhow::bail!("the TUI manages its own session"),
    }
}
