//! Shared building blocks for the Chatrelay server and client.
//!
//! - `protocol`: framed wire protocol and typed messages
//! - `discovery`: port-link file publishing the server address
//! - `logger`, `time`: ambient utilities for the binaries

pub mod discovery;
pub mod logger;
pub mod protocol;
pub mod time;
