//! File-system layer for cosfs.
//!
//! Sits on top of a [`BlobConnector`](cosfs_connector::BlobConnector) and adds
//! what the connector deliberately leaves out: mutual exclusion of mutations
//! per path, truncation, recursive directory creation, and building the whole
//! stack from a TOML configuration.
//!
//! ```
//! use bytes::Bytes;
//! use cosfs_fs::{FileSystemConfig, FileSystemCreator};
//! use cosfs_path::BlobPath;
//!
//! let fs = FileSystemCreator::new(FileSystemConfig::default()).create().unwrap();
//! let file: BlobPath = "bucket/logs/today".parse().unwrap();
//! fs.append(&file, &[Bytes::from_static(b"line one\n")]).unwrap();
//! assert_eq!(fs.file_size(&file).unwrap(), 9);
//! ```
//!
//! # Modules
//!
//! - [`filesystem`] -- [`BlobFileSystem`], the locking facade
//! - [`config`] -- [`FileSystemConfig`] and credential resolution
//! - [`creator`] -- [`FileSystemCreator`]: configuration to file system
//! - [`error`] -- [`FsError`] and [`ConfigError`]

pub mod config;
pub mod creator;
pub mod error;
pub mod filesystem;

pub use config::{
    BackendConfig, ClientConfig, Credentials, CredentialsConfig, CredentialsSource,
    FileSystemConfig,
};
pub use creator::{ClientSettings, FileSystemCreator};
pub use error::{ConfigError, ConfigResult, FsError, FsResult};
pub use filesystem::{BlobFileSystem, Entry};
