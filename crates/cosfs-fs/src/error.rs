use std::path::PathBuf;

use cosfs_connector::ConnectorError;
use cosfs_store::StoreError;
use thiserror::Error;

/// Errors from loading or validating a [`FileSystemConfig`](crate::FileSystemConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("client.endpoint-override is set but client.region is not")]
    EndpointWithoutRegion,

    /// A credential required by the configured source is missing.
    #[error("{origin} credentials: {name} is not set")]
    MissingCredential { origin: &'static str, name: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors from file-system operations.
#[derive(Debug, Error)]
pub enum FsError {
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl FsError {
    /// Returns `true` if the error means the file or blob does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Connector(ConnectorError::NotFound(_)))
    }
}

pub type FsResult<T> = Result<T, FsError>;
