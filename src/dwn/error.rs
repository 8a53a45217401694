//! Errors raised while talking to a decentralized web node.

use thiserror::Error;

/// Failure of a single collaborator call.
#[derive(Debug, Error)]
pub enum DwnError {
    /// The agent answered with a non-success HTTP status.
    #[error("HTTP {code} from {url}: {body}")]
    Http { code: u16, url: String, body: String },

    /// The request never produced a response (connect refused, reset, ...).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// JSON-RPC level error object returned by the agent.
    #[error("agent error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Payload or reply did not match the expected shape.
    #[error("decode error: {0}")]
    Decode(String),

    #[error("encode error: {0}")]
    Encode(String),
}

impl DwnError {
    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }
}
