//! Path model for the cosfs blob-store file system.
//!
//! A [`BlobPath`] names a file or directory as `container/segment/.../segment`.
//! The container maps 1:1 to a storage bucket, the remaining segments form the
//! logical path inside that bucket.
//!
//! # Modules
//!
//! - [`error`] -- Error types for path construction and validation
//! - [`path`] -- The immutable [`BlobPath`] value type
//! - [`validator`] -- The [`PathValidator`] trait and bucket-name rules

pub mod error;
pub mod path;
pub mod validator;

pub use error::{PathError, PathResult};
pub use path::BlobPath;
pub use validator::{validate_bucket_name, BucketNameValidator, PathValidator};
