//! Server execution logic.

use std::{
    future::Future,
    net::{Ipv4Addr, SocketAddr},
    path::PathBuf,
};

use chatrelay_shared::{
    discovery::{DiscoveryError, PortLink},
    protocol::DEFAULT_MAX_PAYLOAD,
};
use thiserror::Error;
use tokio::net::TcpListener;

use crate::{
    domain::{Registry, RegistryError},
    infrastructure::ConfigError,
};

use super::{connection::ConnectionLimits, multiplexer::Multiplexer, signal::shutdown_signal};

/// Fatal startup errors. The event loop itself never fails.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("unable to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

/// Runtime settings of the relay server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    /// `0` picks an ephemeral port.
    pub port: u16,
    /// Where to publish the bound address. `None` disables publishing.
    pub port_link: Option<PathBuf>,
    pub max_payload: usize,
    pub event_queue_depth: usize,
    /// Packets queued per connection before a peer that is not reading is dropped.
    pub outbound_queue_depth: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            port_link: None,
            max_payload: DEFAULT_MAX_PAYLOAD,
            event_queue_depth: 256,
            outbound_queue_depth: 64,
        }
    }
}

/// Multi-room chat relay server
///
/// # Example
///
/// ```ignore
/// let registry = Registry::load(load_groups_file(path)?)?;
/// Server::new(registry, ServerConfig::default()).run().await?;
/// ```
pub struct Server {
    registry: Registry,
    config: ServerConfig,
}

impl Server {
    pub fn new(registry: Registry, config: ServerConfig) -> Self {
        Self { registry, config }
    }

    /// Bind, publish the port link and serve until Ctrl+C / SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound or the port link is
    /// already owned by another server.
    pub async fn run(self) -> Result<Registry, ServerError> {
        let address = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ServerError::Bind { address, source })?;
        let local = listener.local_addr()?;
        tracing::info!("Chat relay server listening on {}", local);

        // Removed again when the guard drops at the end of this function.
        let _port_link = match &self.config.port_link {
            Some(path) => Some(PortLink::publish(path.clone(), &advertised(local))?),
            None => None,
        };
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        let registry = self.serve(listener, shutdown_signal()).await;
        tracing::info!("Server shutdown complete");
        Ok(registry)
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Registry
    where
        F: Future<Output = ()>,
    {
        let groups = self.registry.groups().len();
        tracing::debug!("Serving {} group(s)", groups);
        let limits = ConnectionLimits {
            max_payload: self.config.max_payload,
            outbound_queue_depth: self.config.outbound_queue_depth,
        };
        Multiplexer::new(self.registry, limits, self.config.event_queue_depth)
            .run(listener, shutdown)
            .await
    }
}

/// Address written to the port link. A wildcard bind is advertised as loopback.
fn advertised(local: SocketAddr) -> String {
    if local.ip().is_unspecified() {
        SocketAddr::from((Ipv4Addr::LOCALHOST, local.port())).to_string()
    } else {
        local.to_string()
    }
}
