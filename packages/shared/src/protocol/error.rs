//! Error types for the wire protocol.

use thiserror::Error;

/// Errors produced while encoding or decoding packets.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The peer closed the stream cleanly between two packets.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// The stream ended in the middle of a packet.
    #[error("connection closed after {read} of {expected} bytes")]
    UnexpectedEof { read: usize, expected: usize },

    /// Any other transport failure.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown packet type tag {0}")]
    UnknownPacketType(u8),

    /// Declared payload length exceeds the configured maximum.
    #[error("payload of {length} bytes exceeds the maximum of {max} bytes")]
    PayloadTooLarge { length: usize, max: usize },

    #[error("field contains an embedded NUL byte")]
    EmbeddedNul,

    #[error("field is not valid UTF-8")]
    InvalidText,

    #[error("field '{0}' is not a valid number")]
    InvalidNumber(String),

    /// Payload carries fewer fields than the packet type requires.
    #[error("{kind} packet is missing field '{field}'")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    /// Packet type is valid on the wire but not in this direction.
    #[error("unexpected {0} packet")]
    UnexpectedPacket(&'static str),
}

impl ProtocolError {
    /// Whether the error comes from the transport (peer gone) rather than from
    /// malformed data.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ProtocolError::ConnectionClosed
                | ProtocolError::UnexpectedEof { .. }
                | ProtocolError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
