//! Port-link service discovery.
//!
//! The server publishes its `host:port` into a well-known file (by default
//! `$HOME/.chatport`) and clients read it back. Only one server may own the file
//! at a time; the server's [`PortLink`] guard removes it when dropped.

use std::{
    fs::OpenOptions,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use thiserror::Error;

/// File name of the port link inside the home directory.
pub const PORT_LINK_FILE: &str = ".chatport";

#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Another server already published its address.
    #[error("server already exists (port link '{0}' is present)")]
    AlreadyPublished(PathBuf),

    #[error("no active chat server (port link '{0}' not found)")]
    NotFound(PathBuf),

    #[error("malformed port link '{0}', expected host:port")]
    Malformed(String),

    #[error("port link '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Default location of the port link: `$HOME/.chatport`, or `./.chatport`
/// when no home directory is set.
pub fn default_port_link_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(PORT_LINK_FILE)
}

/// Published server address. Removing the file is tied to this value's lifetime.
#[derive(Debug)]
pub struct PortLink {
    path: PathBuf,
}

impl PortLink {
    /// Publish `address` at `path`. Fails if the file already exists.
    pub fn publish(path: impl Into<PathBuf>, address: &str) -> Result<Self, DiscoveryError> {
        let path = path.into();
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| match source.kind() {
                ErrorKind::AlreadyExists => DiscoveryError::AlreadyPublished(path.clone()),
                _ => DiscoveryError::Io {
                    path: path.clone(),
                    source,
                },
            })?;

        let link = Self { path };
        file.write_all(address.as_bytes())
            .map_err(|source| DiscoveryError::Io {
                path: link.path.clone(),
                source,
            })?;

        tracing::info!("Published '{}' at {}", address, link.path.display());
        Ok(link)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PortLink {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::info!("Removed port link {}", self.path.display()),
            Err(e) => tracing::warn!(
                "Failed to remove port link {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// Read the `host:port` address published at `path`.
pub fn resolve(path: &Path) -> Result<String, DiscoveryError> {
    let raw = std::fs::read_to_string(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => DiscoveryError::NotFound(path.to_path_buf()),
        _ => DiscoveryError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;

    let address = raw.trim();
    match address.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
            Ok(address.to_string())
        }
        _ => Err(DiscoveryError::Malformed(address.to_string())),
    }
}
