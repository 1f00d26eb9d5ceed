//! Blob-store connector for the cosfs file system.
//!
//! Object stores offer list/get/put/delete on immutable objects and nothing
//! else. This crate reconstructs file semantics on top of that by naming
//! conventions alone:
//!
//! - A file `bucket/dir/name` is the concatenation of the blobs
//!   `dir/name.0`, `dir/name.1`, ... in ascending numeric order.
//! - Appending writes one new blob with the next number; existing blobs are
//!   never modified.
//! - A directory `bucket/dir` is the key prefix `dir/`, optionally marked by a
//!   zero-byte object under exactly that key.
//!
//! # Modules
//!
//! - [`keys`] -- Key codec: paths to key prefixes, blob keys and matchers
//! - [`lister`] -- [`BlobLister`] trait and the uncached [`DirectLister`]
//! - [`cache`] -- [`CachingLister`], a memoizing decorator over any lister
//! - [`connector`] -- [`Connector`]: read, append, delete and directory engines
//! - [`error`] -- [`ConnectorError`]
//!
//! # Concurrency
//!
//! The connector takes no locks of its own. It is safe to use from many
//! threads for different files. Two concurrent appends to the *same* file can
//! both pick the same next blob number, and the later put silently replaces
//! the earlier one; callers must serialize mutations per path.

pub mod cache;
pub mod connector;
pub mod error;
pub mod keys;
pub mod lister;

pub use cache::CachingLister;
pub use connector::{BlobConnector, Connector, DirectoryListing};
pub use error::{ConnectorError, ConnectorResult};
pub use keys::BlobKeyPattern;
pub use lister::{BlobInfo, BlobLister, BlobListing, DirectLister};
