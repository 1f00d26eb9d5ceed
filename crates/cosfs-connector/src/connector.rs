use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use cosfs_path::{BlobPath, BucketNameValidator, PathError, PathValidator};
use cosfs_store::ObjectBackend;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::CachingLister;
use crate::error::{ConnectorError, ConnectorResult};
use crate::keys;
use crate::lister::{BlobLister, BlobListing, DirectLister};

/// Immediate children of a directory.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DirectoryListing {
    pub directories: BTreeSet<String>,
    pub files: BTreeSet<String>,
}

impl DirectoryListing {
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty() && self.files.is_empty()
    }
}

/// File operations on top of a blob store.
///
/// This is the interface the file-system layer holds. Every method validates
/// its paths before touching the backend. Mutating methods invalidate cached
/// state for the paths they touch before returning, on every exit path.
pub trait BlobConnector: Send + Sync {
    /// Blobs of `file` in ascending blob-number order.
    fn blobs(&self, file: &BlobPath) -> ConnectorResult<Arc<BlobListing>>;

    /// Total size of `file`; `NotFound` if it has no blobs.
    fn file_size(&self, file: &BlobPath) -> ConnectorResult<u64>;

    /// `true` iff at least one blob of `file` exists.
    fn file_exists(&self, file: &BlobPath) -> ConnectorResult<bool>;

    /// `true` if the directory's marker exists or anything lives below it.
    fn directory_exists(&self, directory: &BlobPath) -> ConnectorResult<bool>;

    /// Sub-directories and files directly inside `directory`.
    fn list_children(&self, directory: &BlobPath) -> ConnectorResult<DirectoryListing>;

    /// `true` if nothing but (at most) the marker lives below `directory`.
    fn is_empty(&self, directory: &BlobPath) -> ConnectorResult<bool>;

    /// Put the zero-byte marker for `directory`. Idempotent.
    fn create_directory(&self, directory: &BlobPath) -> ConnectorResult<()>;

    /// Create `file` with an empty blob unless it already exists.
    ///
    /// Returns `true` if the file was created.
    fn create_file(&self, file: &BlobPath) -> ConnectorResult<bool>;

    /// Read `length` bytes starting at `offset`.
    fn read(&self, file: &BlobPath, offset: u64, length: u64) -> ConnectorResult<Bytes>;

    /// Read the whole file.
    fn read_all(&self, file: &BlobPath) -> ConnectorResult<Bytes>;

    /// Append `buffers` as one new blob and return the number of bytes written.
    fn append(&self, file: &BlobPath, buffers: &[Bytes]) -> ConnectorResult<u64>;

    /// Delete every blob of `file` in one batch and return how many were deleted.
    fn delete_file(&self, file: &BlobPath) -> ConnectorResult<usize>;

    /// Append the whole content of `source` to `target`.
    fn copy_file(&self, source: &BlobPath, target: &BlobPath) -> ConnectorResult<u64>;

    /// Copy `source` to `target`, then delete `source`.
    fn move_file(&self, source: &BlobPath, target: &BlobPath) -> ConnectorResult<u64>;
}

/// The blob connector.
///
/// Generic over the [`BlobLister`] that resolves blob sets, so the cached
/// and uncached variants share every engine below:
///
/// ```
/// use bytes::Bytes;
/// use cosfs_connector::{BlobConnector, Connector};
/// use cosfs_path::BlobPath;
/// use cosfs_store::InMemoryBackend;
///
/// let connector = Connector::caching(InMemoryBackend::new());
/// let file: BlobPath = "bucket/dir/file".parse().unwrap();
/// connector.append(&file, &[Bytes::from_static(b"hello ")]).unwrap();
/// connector.append(&file, &[Bytes::from_static(b"world")]).unwrap();
/// assert_eq!(&connector.read(&file, 3, 5).unwrap()[..], b"lo wo");
/// ```
pub struct Connector<L> {
    lister: L,
    validator: Box<dyn PathValidator>,
}

impl<B: ObjectBackend> Connector<DirectLister<B>> {
    /// Connector that lists the backend on every operation.
    pub fn new(backend: B) -> Self {
        Self::with_lister(DirectLister::new(backend))
    }
}

impl<B: ObjectBackend> Connector<CachingLister<DirectLister<B>>> {
    /// Connector that memoizes blob listings per file.
    pub fn caching(backend: B) -> Self {
        Self::with_lister(CachingLister::new(DirectLister::new(backend)))
    }
}

impl<L: BlobLister> Connector<L> {
    /// Connector over an arbitrary lister, validating bucket names.
    pub fn with_lister(lister: L) -> Self {
        Self {
            lister,
            validator: Box::new(BucketNameValidator),
        }
    }

    /// Replace the path validator.
    pub fn with_validator(mut self, validator: impl PathValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    pub fn lister(&self) -> &L {
        &self.lister
    }

    fn backend(&self) -> &dyn ObjectBackend {
        self.lister.backend()
    }

    fn validate_file(&self, file: &BlobPath) -> ConnectorResult<()> {
        if file.is_container() {
            return Err(PathError::ContainerRoot(file.to_string()).into());
        }
        self.validator.validate(file)?;
        Ok(())
    }

    fn validate_directory(&self, directory: &BlobPath) -> ConnectorResult<()> {
        self.validator.validate(directory)?;
        Ok(())
    }

    fn existing_blobs(&self, file: &BlobPath) -> ConnectorResult<Arc<BlobListing>> {
        let listing = self.lister.list_blobs(file)?;
        if listing.is_empty() {
            return Err(ConnectorError::NotFound(file.to_string()));
        }
        Ok(listing)
    }

    fn read_range(&self, file: &BlobPath, offset: u64, length: u64) -> ConnectorResult<Bytes> {
        let listing = self.existing_blobs(file)?;
        let size = listing.total_size();
        let end = offset
            .checked_add(length)
            .filter(|end| *end <= size)
            .ok_or_else(|| ConnectorError::Range {
                path: file.to_string(),
                offset,
                length,
                size,
            })?;
        if length == 0 {
            return Ok(Bytes::new());
        }

        let mut buffer = BytesMut::with_capacity(length as usize);
        let mut blob_start = 0u64;
        for blob in listing.blobs() {
            let blob_end = blob_start + blob.size;
            if blob.size == 0 || blob_end <= offset {
                blob_start = blob_end;
                continue;
            }
            if blob_start >= end {
                break;
            }

            let local_start = offset.saturating_sub(blob_start);
            let local_end = blob.size.min(end - blob_start);
            let chunk = match self.backend().get_object_range(
                file.container(),
                &blob.key,
                local_start..local_end,
            ) {
                Ok(chunk) => chunk,
                Err(e) => {
                    // The listing no longer matches the store.
                    self.lister.invalidate(file);
                    return Err(e.into());
                }
            };
            if chunk.len() as u64 != local_end - local_start {
                self.lister.invalidate(file);
                return Err(ConnectorError::NotFound(format!(
                    "{file}: blob {} returned {} of {} bytes",
                    blob.key,
                    chunk.len(),
                    local_end - local_start
                )));
            }
            buffer.extend_from_slice(&chunk);
            blob_start = blob_end;
        }

        debug!(file = %file, offset, length, "read");
        Ok(buffer.freeze())
    }

    fn put_blob(&self, file: &BlobPath, buffers: &[Bytes]) -> ConnectorResult<u64> {
        let listing = self.lister.list_blobs(file)?;
        let number = listing
            .next_number()
            .ok_or_else(|| ConnectorError::NumbersExhausted(file.to_string()))?;
        let data = concat(buffers);
        let written = data.len() as u64;
        let key = keys::blob_key(file, number);

        let result = self.backend().put_object(file.container(), &key, data);
        self.lister.invalidate(file);
        result?;

        debug!(file = %file, blob = number, bytes = written, "appended blob");
        Ok(written)
    }

    fn delete_blobs(&self, file: &BlobPath) -> ConnectorResult<usize> {
        let listing = match self.lister.list_blobs(file) {
            Ok(listing) => listing,
            Err(e) => {
                self.lister.invalidate(file);
                return Err(e);
            }
        };
        if listing.is_empty() {
            self.lister.invalidate(file);
            return Ok(0);
        }

        let requested = listing.keys();
        let result = self.backend().delete_objects(file.container(), &requested);
        self.lister.invalidate(file);
        let reported = result?;

        let wanted: HashSet<&str> = requested.iter().map(String::as_str).collect();
        let deleted = reported
            .iter()
            .map(String::as_str)
            .filter(|key| wanted.contains(key))
            .collect::<HashSet<_>>()
            .len();

        if deleted != requested.len() {
            warn!(
                file = %file,
                requested = requested.len(),
                deleted,
                "backend deleted only part of the blobs"
            );
            return Err(ConnectorError::PartialDelete {
                path: file.to_string(),
                requested: requested.len(),
                deleted,
            });
        }

        debug!(file = %file, blobs = deleted, "deleted file");
        Ok(deleted)
    }
}

impl<L: BlobLister> BlobConnector for Connector<L> {
    fn blobs(&self, file: &BlobPath) -> ConnectorResult<Arc<BlobListing>> {
        self.validate_file(file)?;
        self.lister.list_blobs(file)
    }

    fn file_size(&self, file: &BlobPath) -> ConnectorResult<u64> {
        self.validate_file(file)?;
        Ok(self.existing_blobs(file)?.total_size())
    }

    fn file_exists(&self, file: &BlobPath) -> ConnectorResult<bool> {
        self.validate_file(file)?;
        Ok(!self.lister.list_blobs(file)?.is_empty())
    }

    fn directory_exists(&self, directory: &BlobPath) -> ConnectorResult<bool> {
        self.validate_directory(directory)?;
        if directory.is_container() {
            return Ok(true);
        }
        let marker = keys::directory_key(directory);
        if self.backend().object_exists(directory.container(), &marker)? {
            return Ok(true);
        }
        Ok(!self.lister.list_child_keys(directory)?.is_empty())
    }

    fn list_children(&self, directory: &BlobPath) -> ConnectorResult<DirectoryListing> {
        self.validate_directory(directory)?;
        let prefix = keys::child_key_prefix(directory);
        let mut listing = DirectoryListing::default();

        for key in self.lister.list_child_keys(directory)? {
            let Some(name) = key.strip_prefix(prefix.as_str()) else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            if let Some(dir) = name.strip_suffix(BlobPath::SEPARATOR) {
                if !dir.contains(BlobPath::SEPARATOR) {
                    listing.directories.insert(dir.to_string());
                }
                continue;
            }
            match keys::split_blob_name(name) {
                Some((file, _)) if !file.contains(BlobPath::SEPARATOR) => {
                    listing.files.insert(file.to_string());
                }
                _ => debug!(key = %key, "ignoring foreign key"),
            }
        }
        Ok(listing)
    }

    fn is_empty(&self, directory: &BlobPath) -> ConnectorResult<bool> {
        self.validate_directory(directory)?;
        let marker = keys::directory_key(directory);
        Ok(self
            .lister
            .list_child_keys(directory)?
            .iter()
            .all(|key| *key == marker))
    }

    fn create_directory(&self, directory: &BlobPath) -> ConnectorResult<()> {
        self.validate_directory(directory)?;
        if directory.is_container() {
            return Ok(());
        }
        let marker = keys::directory_key(directory);
        self.backend()
            .put_object(directory.container(), &marker, Bytes::new())?;
        debug!(directory = %directory, "created directory marker");
        Ok(())
    }

    fn create_file(&self, file: &BlobPath) -> ConnectorResult<bool> {
        self.validate_file(file)?;
        if !self.lister.list_blobs(file)?.is_empty() {
            return Ok(false);
        }
        self.put_blob(file, &[])?;
        Ok(true)
    }

    fn read(&self, file: &BlobPath, offset: u64, length: u64) -> ConnectorResult<Bytes> {
        self.validate_file(file)?;
        self.read_range(file, offset, length)
    }

    fn read_all(&self, file: &BlobPath) -> ConnectorResult<Bytes> {
        self.validate_file(file)?;
        let size = self.existing_blobs(file)?.total_size();
        self.read_range(file, 0, size)
    }

    fn append(&self, file: &BlobPath, buffers: &[Bytes]) -> ConnectorResult<u64> {
        self.validate_file(file)?;
        self.put_blob(file, buffers)
    }

    fn delete_file(&self, file: &BlobPath) -> ConnectorResult<usize> {
        self.validate_file(file)?;
        self.delete_blobs(file)
    }

    fn copy_file(&self, source: &BlobPath, target: &BlobPath) -> ConnectorResult<u64> {
        self.validate_file(source)?;
        self.validate_file(target)?;
        if source == target {
            return Err(ConnectorError::InvalidOperation(format!(
                "cannot copy {source} onto itself"
            )));
        }
        let size = self.existing_blobs(source)?.total_size();
        let data = self.read_range(source, 0, size)?;
        self.put_blob(target, &[data])
    }

    fn move_file(&self, source: &BlobPath, target: &BlobPath) -> ConnectorResult<u64> {
        let copied = self.copy_file(source, target)?;
        self.delete_blobs(source)?;
        debug!(source = %source, target = %target, bytes = copied, "moved file");
        Ok(copied)
    }
}

impl<L: std::fmt::Debug> std::fmt::Debug for Connector<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("lister", &self.lister)
            .finish_non_exhaustive()
    }
}

fn concat(buffers: &[Bytes]) -> Bytes {
    match buffers {
        [] => Bytes::new(),
        [single] => single.clone(),
        many => {
            let total = many.iter().map(Bytes::len).sum();
            let mut joined = BytesMut::with_capacity(total);
            for buffer in many {
                joined.extend_from_slice(buffer);
            }
            joined.freeze()
        }
    }
}
