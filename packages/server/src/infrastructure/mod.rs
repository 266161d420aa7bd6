//! Infrastructure layer: startup configuration and outbound delivery.

pub mod groups_file;
pub mod message_pusher;

pub use groups_file::{ConfigError, load_groups_file};
pub use message_pusher::{ConnectionPusher, PusherChannel};
