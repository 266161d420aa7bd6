//! Multi-room chat relay server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin chatrelay-server -- groups.txt
//! cargo run --bin chatrelay-server -- groups.json --host 0.0.0.0 --port 4000
//! ```

use std::path::PathBuf;

use chatrelay_server::{
    domain::Registry,
    infrastructure::load_groups_file,
    ui::{Server, ServerConfig, ServerError},
};
use chatrelay_shared::{
    discovery::default_port_link_path, logger::setup_logger, protocol::DEFAULT_MAX_PAYLOAD,
};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "chatrelay-server")]
#[command(about = "Multi-room chat relay server", long_about = None)]
struct Args {
    /// Groups file: a count followed by `name capacity` pairs, or a `.json` file
    groups_file: PathBuf,

    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to (0 picks a free port)
    #[arg(short = 'p', long, default_value = "0")]
    port: u16,

    /// Where to publish the bound address [default: $HOME/.chatport]
    #[arg(long)]
    port_link: Option<PathBuf>,

    /// Do not publish the bound address
    #[arg(long, conflicts_with = "port_link")]
    no_port_link: bool,

    /// Maximum accepted payload size in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_PAYLOAD)]
    max_payload: usize,
}

async fn run(args: Args) -> Result<(), ServerError> {
    // 1. Groups file -> Registry
    let definitions = load_groups_file(&args.groups_file)?;
    let registry = Registry::load(definitions)?;
    for group in registry.groups() {
        tracing::info!("Group '{}' (capacity {})", group.name(), group.capacity());
    }

    // 2. Server
    let port_link = if args.no_port_link {
        None
    } else {
        Some(args.port_link.unwrap_or_else(default_port_link_path))
    };
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        port_link,
        max_payload: args.max_payload,
        ..ServerConfig::default()
    };
    let registry = Server::new(registry, config).run().await?;
    tracing::debug!("{} member(s) at shutdown", registry.member_count());

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();
    if let Err(e) = run(args).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
