//! Multi-room chat relay server.
//!
//! Layers, inside out:
//!
//! - [`domain`]: groups, members and the registry
//! - [`usecase`]: join / leave / list / relay, one request at a time
//! - [`infrastructure`]: groups file loader and per-connection send queues
//! - [`ui`]: TCP accept loop, connection tasks and the multiplexer

pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
