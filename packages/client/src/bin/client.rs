//! Interactive chat relay client.
//!
//! Lists the groups, asks for a group and a nickname, then relays typed lines to
//! the other members of the group. `/end` leaves the group; an empty answer or
//! `/end` at a selection prompt quits.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin chatrelay-client
//! cargo run --bin chatrelay-client -- --server 127.0.0.1:4000
//! ```

use std::path::PathBuf;

use chatrelay_client::{ClientError, run_client};
use chatrelay_shared::{
    discovery::{default_port_link_path, resolve},
    logger::setup_logger,
};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "chatrelay-client")]
#[command(about = "Interactive client for the multi-room chat relay", long_about = None)]
struct Args {
    /// Server address (host:port). Read from the port link when omitted
    #[arg(short = 's', long)]
    server: Option<String>,

    /// Port link published by the server [default: $HOME/.chatport]
    #[arg(long, conflicts_with = "server")]
    port_link: Option<PathBuf>,
}

async fn run(args: Args) -> Result<(), ClientError> {
    let address = match args.server {
        Some(address) => address,
        None => {
            let path = args.port_link.unwrap_or_else(default_port_link_path);
            resolve(&path)?
        }
    };
    run_client(address).await
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    // Run the client
    if let Err(e) = run(args).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
