//! Error types for path operations.

use thiserror::Error;

/// Errors that can occur while building or validating a [`BlobPath`](crate::BlobPath).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The textual path had no container element.
    #[error("path must not be empty")]
    Empty,

    /// A path segment is not usable as a key component.
    #[error("invalid path segment {segment:?}: {reason}")]
    InvalidSegment { segment: String, reason: String },

    /// The container name violates the bucket naming rules.
    #[error("invalid bucket name {name:?}: {reason}")]
    InvalidBucketName { name: String, reason: String },

    /// The operation requires a path below the container root.
    #[error("path {0} names a container, not an entry inside it")]
    ContainerRoot(String),
}

/// Convenience type alias for path operations.
pub type PathResult<T> = std::result::Result<T, PathError>;
