//! UI 層: TCP の受け付けと接続ごとのタスク、イベントループ

mod connection;
mod multiplexer;
mod server;
mod signal;

pub use connection::{ConnectionEvent, ConnectionEventKind, ConnectionLimits};
pub use multiplexer::{ACCEPT_BACKOFF, Multiplexer};
pub use server::{Server, ServerConfig, ServerError};
pub use signal::shutdown_signal;
