//! Domain errors.

use thiserror::Error;

use super::ConnectionId;

/// Why a join request was refused. `Display` yields the reason text sent back
/// to the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinRejection {
    /// The connection already owns a member.
    #[error("already joined a group")]
    AlreadyJoined,

    #[error("no such group")]
    NoSuchGroup,

    /// Empty, or longer than [`MAX_NAME_LEN`](super::MAX_NAME_LEN) bytes.
    #[error("invalid member name")]
    InvalidName,

    /// Member names are unique across every group.
    #[error("member name already exists")]
    NameTaken,

    #[error("room is full")]
    RoomFull,
}

/// Invalid group table at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("duplicate group name '{0}'")]
    DuplicateGroup(String),

    #[error("group '{0}' must have a positive capacity")]
    ZeroCapacity(String),

    #[error("invalid group name '{0}'")]
    InvalidName(String),
}

/// Failure delivering a packet to one connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PushError {
    #[error("connection {0} is not registered")]
    ConnectionNotFound(ConnectionId),

    /// The connection's writer has already shut down.
    #[error("connection {0} is closed")]
    ChannelClosed(ConnectionId),

    /// The peer is not reading and its outbound queue is full.
    #[error("outbound queue of connection {0} is full")]
    QueueFull(ConnectionId),
}
