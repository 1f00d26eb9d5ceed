use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use bytes::Bytes;
use cosfs_connector::{BlobConnector, ConnectorError, DirectoryListing};
use cosfs_path::BlobPath;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::FsResult;

/// What lives at a path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Entry {
    File { size: u64, blobs: usize },
    Directory,
    Missing,
}

/// File-system facade over a [`BlobConnector`].
///
/// Reads go straight to the connector. Every mutation holds an exclusive lock
/// on the paths it changes, so two appends to one file through the same
/// `BlobFileSystem` can never race for a blob number. Processes that share a
/// store are not coordinated.
pub struct BlobFileSystem {
    connector: Arc<dyn BlobConnector>,
    locks: PathLocks,
}

impl BlobFileSystem {
    pub fn new(connector: Arc<dyn BlobConnector>) -> Self {
        Self {
            connector,
            locks: PathLocks::default(),
        }
    }

    pub fn connector(&self) -> &Arc<dyn BlobConnector> {
        &self.connector
    }

    // ---- Queries ----

    pub fn stat(&self, path: &BlobPath) -> FsResult<Entry> {
        if !path.is_container() {
            let blobs = self.connector.blobs(path)?;
            if !blobs.is_empty() {
                return Ok(Entry::File {
                    size: blobs.total_size(),
                    blobs: blobs.len(),
                });
            }
        }
        if self.connector.directory_exists(path)? {
            return Ok(Entry::Directory);
        }
        Ok(Entry::Missing)
    }

    pub fn file_exists(&self, file: &BlobPath) -> FsResult<bool> {
        Ok(self.connector.file_exists(file)?)
    }

    pub fn file_size(&self, file: &BlobPath) -> FsResult<u64> {
        Ok(self.connector.file_size(file)?)
    }

    pub fn directory_exists(&self, directory: &BlobPath) -> FsResult<bool> {
        Ok(self.connector.directory_exists(directory)?)
    }

    pub fn list(&self, directory: &BlobPath) -> FsResult<DirectoryListing> {
        Ok(self.connector.list_children(directory)?)
    }

    pub fn is_empty(&self, directory: &BlobPath) -> FsResult<bool> {
        Ok(self.connector.is_empty(directory)?)
    }

    pub fn read(&self, file: &BlobPath, offset: u64, length: u64) -> FsResult<Bytes> {
        Ok(self.connector.read(file, offset, length)?)
    }

    pub fn read_all(&self, file: &BlobPath) -> FsResult<Bytes> {
        Ok(self.connector.read_all(file)?)
    }

    // ---- Mutations ----

    pub fn create_directory(&self, directory: &BlobPath) -> FsResult<()> {
        Ok(self.connector.create_directory(directory)?)
    }

    /// Create `directory` and every missing ancestor marker.
    pub fn ensure_directory(&self, directory: &BlobPath) -> FsResult<()> {
        for dir in directory.ancestors().iter().chain(Some(directory)) {
            self.connector.create_directory(dir)?;
        }
        Ok(())
    }

    pub fn create_file(&self, file: &BlobPath) -> FsResult<bool> {
        let _guard = self.locks.lock(&[file]);
        Ok(self.connector.create_file(file)?)
    }

    pub fn append(&self, file: &BlobPath, buffers: &[Bytes]) -> FsResult<u64> {
        let _guard = self.locks.lock(&[file]);
        Ok(self.connector.append(file, buffers)?)
    }

    pub fn delete(&self, file: &BlobPath) -> FsResult<usize> {
        let _guard = self.locks.lock(&[file]);
        Ok(self.connector.delete_file(file)?)
    }

    /// Shorten `file` to `new_len` bytes.
    ///
    /// The file is rewritten as a single blob. Between the delete and the
    /// rewrite it is briefly absent to other readers. Truncating to zero
    /// leaves no file behind.
    ///
    /// If the backend deletes only some of the old blobs, the kept prefix is
    /// still appended as a new blob after the survivors, and the
    /// [`PartialDelete`](ConnectorError::PartialDelete) error is returned. The
    /// file then reads as the surviving blobs followed by the first `new_len`
    /// bytes.
    pub fn truncate(&self, file: &BlobPath, new_len: u64) -> FsResult<()> {
        let _guard = self.locks.lock(&[file]);
        let size = self.connector.file_size(file)?;
        if new_len > size {
            return Err(ConnectorError::Range {
                path: file.to_string(),
                offset: 0,
                length: new_len,
                size,
            }
            .into());
        }
        if new_len == size {
            return Ok(());
        }

        let kept = self.connector.read(file, 0, new_len)?;
        if let Err(err) = self.connector.delete_file(file) {
            if matches!(err, ConnectorError::PartialDelete { .. }) && new_len > 0 {
                self.connector.append(file, &[kept])?;
                warn!(
                    file = %file,
                    kept = new_len,
                    "truncate left old blobs ahead of the kept bytes"
                );
            }
            return Err(err.into());
        }
        if new_len > 0 {
            self.connector.append(file, &[kept])?;
        }
        debug!(file = %file, from = size, to = new_len, "truncated");
        Ok(())
    }

    pub fn copy(&self, source: &BlobPath, target: &BlobPath) -> FsResult<u64> {
        let _guard = self.locks.lock(&[target]);
        Ok(self.connector.copy_file(source, target)?)
    }

    pub fn rename(&self, source: &BlobPath, target: &BlobPath) -> FsResult<u64> {
        let _guard = self.locks.lock(&[source, target]);
        let moved = self.connector.move_file(source, target)?;
        info!(source = %source, target = %target, bytes = moved, "renamed file");
        Ok(moved)
    }
}

impl std::fmt::Debug for BlobFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobFileSystem").finish_non_exhaustive()
    }
}

/// Set of paths currently being mutated.
#[derive(Default)]
struct PathLocks {
    held: Mutex<HashSet<BlobPath>>,
    released: Condvar,
}

impl PathLocks {
    /// Block until every path in `paths` is free, then hold them all.
    fn lock(&self, paths: &[&BlobPath]) -> PathGuard<'_> {
        let mut wanted: Vec<BlobPath> = paths.iter().map(|p| (*p).clone()).collect();
        wanted.sort();
        wanted.dedup();

        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        while wanted.iter().any(|p| held.contains(p)) {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        held.extend(wanted.iter().cloned());
        PathGuard { locks: self, paths: wanted }
    }
}

struct PathGuard<'a> {
    locks: &'a PathLocks,
    paths: Vec<BlobPath>,
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        let mut held = self
            .locks
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for path in &self.paths {
            held.remove(path);
        }
        self.locks.released.notify_all();
    }
}
