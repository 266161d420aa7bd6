//! Error types for the chat client.

use chatrelay_shared::{
    discovery::DiscoveryError,
    protocol::{PacketType, ProtocolError},
};
use thiserror::Error;

/// Client-specific errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// Malformed frame from the server
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Connection error
    #[error("Connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// The server answered with a packet that does not fit the request
    #[error("unexpected reply from server: {0}")]
    UnexpectedReply(PacketType),

    #[error("server died")]
    ServerClosed,
}
