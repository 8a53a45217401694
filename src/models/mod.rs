//! Data models for burn book messages and the exchange protocol

mod message;
mod protocol;

pub use message::*;
pub use protocol::*;
