//! Framed wire protocol shared by the server and the client.
//!
//! A packet is a 1-byte type tag, a 4-byte big-endian payload length, and the
//! payload itself. Payloads carry NUL-terminated text fields whose order is
//! fixed per packet type.

mod error;
mod fields;
mod message;
mod packet;

pub use error::{ProtocolError, Result};
pub use fields::{decode_fields, encode_fields};
pub use message::{GroupSummary, Reply, Request};
pub use packet::{
    DEFAULT_MAX_PAYLOAD, HEADER_SIZE, Packet, PacketType, encode, read_packet, write_packet,
};
