/// Errors from object backend operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object does not exist.
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// A ranged read reaches past the end of the object.
    #[error("range {start}..{end} out of bounds for {key} ({size} bytes)")]
    InvalidRange {
        key: String,
        start: u64,
        end: u64,
        size: u64,
    },

    /// The bucket name cannot be mapped onto this backend.
    #[error("invalid bucket {0:?}")]
    InvalidBucket(String),

    /// The key cannot be stored by this backend.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// I/O error from the underlying storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A request to a remote object store failed.
    #[error("object store request failed: {0}")]
    ObjectStore(#[from] object_store::Error),

    /// The backend is unreachable or refused the request.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Result alias for backend operations.
pub type StoreResult<T> = Result<T, StoreError>;
