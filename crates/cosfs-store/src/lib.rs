//! Object-storage backends for cosfs.
//!
//! A backend is a flat key/value blob store addressed by bucket + key. It
//! offers no file, offset-write or rename primitives; everything file-like is
//! built on top of it by `cosfs-connector`.
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectBackend`] trait:
//!
//! - [`InMemoryBackend`] -- `BTreeMap`-based store for tests and embedding
//! - [`LocalDirBackend`] -- one directory per bucket on the local disk
//! - [`S3Backend`] -- S3-compatible service through `object_store`
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written; a put on an existing key replaces it whole.
//! 2. Listings are returned in ascending key order.
//! 3. Delete batches report the keys actually deleted, so callers can detect
//!    partial failure.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod local;
pub mod memory;
pub mod s3;
pub mod traits;
pub mod types;

pub use error::{StoreError, StoreResult};
pub use local::LocalDirBackend;
pub use memory::InMemoryBackend;
pub use s3::{S3Backend, S3Options};
pub use traits::ObjectBackend;
pub use types::{ListResult, ObjectSummary};
