//! Error types for instance startup.

use std::path::PathBuf;

use regmux_host::HostError;
use thiserror::Error;

/// Errors that can occur while configuring or starting an instance.
#[derive(Debug, Error)]
pub enum InstanceError {
    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for [`crate::InstanceConfig`].
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// The configuration is well-formed but unusable.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The host worker thread could not be spawned.
    #[error("failed to start host bridge: {0}")]
    BridgeStart(std::io::Error),

    /// The host did not answer the startup probe.
    #[error("host did not load: {0}")]
    HostNotLoaded(#[source] HostError),
}

/// Result type for instance startup.
pub type Result<T> = std::result::Result<T, InstanceError>;
