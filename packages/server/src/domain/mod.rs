//! Domain layer: groups, members, and the registry that owns them.
//!
//! Nothing here performs I/O. Outbound delivery is abstracted behind
//! [`PacketPusher`] so the use cases can be exercised without sockets.

mod connection;
mod error;
mod group;
mod pusher;
mod registry;

pub use connection::{ConnectionId, ConnectionIdFactory};
pub use error::{JoinRejection, PushError, RegistryError};
pub use group::{Group, GroupDefinition, GroupId, Member};
#[cfg(test)]
pub use pusher::MockPacketPusher;
pub use pusher::PacketPusher;
pub use registry::{MAX_NAME_LEN, Registry};
