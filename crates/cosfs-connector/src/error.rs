use cosfs_path::PathError;
use cosfs_store::StoreError;

/// Errors from connector operations.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// The path was rejected before any backend call was made.
    #[error("validation failed: {0}")]
    Validation(#[from] PathError),

    /// The file has no blobs, or a blob vanished while being read.
    #[error("not found: {0}")]
    NotFound(String),

    /// A read reaches past the end of the file.
    #[error("range {offset}+{length} exceeds size {size} of {path}")]
    Range {
        path: String,
        offset: u64,
        length: u64,
        size: u64,
    },

    /// The backend deleted fewer blobs than requested.
    #[error("partial delete of {path}: {deleted} of {requested} blobs deleted")]
    PartialDelete {
        path: String,
        requested: usize,
        deleted: usize,
    },

    /// The file's highest blob number is `u64::MAX`; nothing can be appended.
    #[error("no blob number left after the last blob of {0}")]
    NumbersExhausted(String),

    /// The operation makes no sense for the given arguments.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Network, auth, quota or I/O failure in the backend.
    #[error("backend error: {0}")]
    Backend(StoreError),
}

impl From<StoreError> for ConnectorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { bucket, key } => Self::NotFound(format!("{bucket}/{key}")),
            other => Self::Backend(other),
        }
    }
}

/// Result alias for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;
