//! Outbound delivery seam.

use chatrelay_shared::protocol::Packet;

use super::{ConnectionId, PushError};

/// Queues packets for delivery to a connection.
///
/// Delivery to one connection is independent of every other; callers decide
/// whether a failure matters.
#[cfg_attr(test, mockall::automock)]
pub trait PacketPusher {
    fn push(&self, connection: ConnectionId, packet: Packet) -> Result<(), PushError>;
}
