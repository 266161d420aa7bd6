//! Chat relay client.
//!
//! [`ChatClient`] is the typed protocol session used by the interactive
//! binary and by the server's end-to-end tests.

pub mod error;
pub mod formatter;
pub mod runner;
pub mod session;

pub use error::ClientError;
pub use runner::run_client;
pub use session::{ChatClient, JoinOutcome};
