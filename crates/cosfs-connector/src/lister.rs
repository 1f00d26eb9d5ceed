use std::sync::Arc;

use cosfs_path::BlobPath;
use cosfs_store::ObjectBackend;
use tracing::debug;

use crate::error::ConnectorResult;
use crate::keys::{self, BlobKeyPattern};

/// One blob of a file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobInfo {
    pub key: String,
    pub number: u64,
    pub size: u64,
}

/// The blobs of one file in ascending blob-number order, plus their total size.
///
/// An empty listing means the file does not exist.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlobListing {
    blobs: Vec<BlobInfo>,
    total_size: u64,
}

impl BlobListing {
    /// Build a listing from blobs in any order.
    pub fn new(mut blobs: Vec<BlobInfo>) -> Self {
        blobs.sort_by_key(|b| b.number);
        let total_size = blobs.iter().map(|b| b.size).sum();
        Self { blobs, total_size }
    }

    pub fn blobs(&self) -> &[BlobInfo] {
        &self.blobs
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Highest blob number in use.
    pub fn last_number(&self) -> Option<u64> {
        self.blobs.last().map(|b| b.number)
    }

    /// Number the next appended blob must get.
    ///
    /// `None` once the highest number in use is `u64::MAX`.
    pub fn next_number(&self) -> Option<u64> {
        match self.last_number() {
            Some(n) => n.checked_add(1),
            None => Some(0),
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.blobs.iter().map(|b| b.key.clone()).collect()
    }
}

/// Resolves blob sets and directory children against a backend.
///
/// The connector's engines only ever see blob sets through this trait, which
/// lets [`CachingLister`](crate::CachingLister) wrap any implementation.
pub trait BlobLister: Send + Sync {
    /// The backend this lister reads from.
    fn backend(&self) -> &dyn ObjectBackend;

    /// Blobs of `file`, sorted by blob number.
    fn list_blobs(&self, file: &BlobPath) -> ConnectorResult<Arc<BlobListing>>;

    /// Keys of the immediate children of `directory`: object keys and the
    /// delimiter-collapsed prefixes of deeper entries.
    fn list_child_keys(&self, directory: &BlobPath) -> ConnectorResult<Vec<String>>;

    /// Forget anything remembered about `file`.
    ///
    /// Called by every mutating operation before it returns.
    fn invalidate(&self, _file: &BlobPath) {}
}

/// Lister that asks the backend every time.
#[derive(Debug)]
pub struct DirectLister<B> {
    backend: B,
}

impl<B: ObjectBackend> DirectLister<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn inner(&self) -> &B {
        &self.backend
    }
}

impl<B: ObjectBackend> BlobLister for DirectLister<B> {
    fn backend(&self) -> &dyn ObjectBackend {
        &self.backend
    }

    fn list_blobs(&self, file: &BlobPath) -> ConnectorResult<Arc<BlobListing>> {
        let prefix = keys::blob_key_prefix(file);
        let pattern = BlobKeyPattern::new(&prefix);
        let listed = self.backend.list_objects(file.container(), &prefix, None)?;

        let blobs: Vec<BlobInfo> = listed
            .objects
            .into_iter()
            .filter_map(|obj| {
                pattern.blob_number(&obj.key).map(|number| BlobInfo {
                    number,
                    size: obj.size,
                    key: obj.key,
                })
            })
            .collect();

        let listing = BlobListing::new(blobs);
        debug!(
            file = %file,
            blobs = listing.len(),
            size = listing.total_size(),
            "listed blobs"
        );
        Ok(Arc::new(listing))
    }

    fn list_child_keys(&self, directory: &BlobPath) -> ConnectorResult<Vec<String>> {
        let prefix = keys::child_key_prefix(directory);
        let listed =
            self.backend
                .list_objects(directory.container(), &prefix, Some(BlobPath::SEPARATOR))?;
        Ok(listed.keys().map(str::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use cosfs_store::InMemoryBackend;

    fn lister_with(keys: &[(&str, usize)]) -> DirectLister<InMemoryBackend> {
        let backend = InMemoryBackend::new();
        for (key, size) in keys {
            backend
                .put_object("bucket", key, Bytes::from(vec![0u8; *size]))
                .unwrap();
        }
        DirectLister::new(backend)
    }

    fn path(s: &str) -> BlobPath {
        s.parse().unwrap()
    }

    #[test]
    fn listing_sorts_numerically() {
        let lister = lister_with(&[("f.10", 3), ("f.2", 1), ("f.9", 2)]);
        let listing = lister.list_blobs(&path("bucket/f")).unwrap();
        let keys: Vec<&str> = listing.blobs().iter().map(|b| b.key.as_str()).collect();
        assert_eq!(keys, ["f.2", "f.9", "f.10"]);
        assert_eq!(listing.total_size(), 6);
        assert_eq!(listing.last_number(), Some(10));
        assert_eq!(listing.next_number(), Some(11));
    }

    #[test]
    fn listing_ignores_other_files_sharing_the_prefix() {
        let lister =
            lister_with(&[("foo.0", 1), ("foo.1.0", 1), ("foo.bak", 1), ("foobar.0", 1)]);
        let listing = lister.list_blobs(&path("bucket/foo")).unwrap();
        assert_eq!(listing.keys(), ["foo.0"]);
    }

    #[test]
    fn absent_file_has_empty_listing() {
        let lister = lister_with(&[]);
        let listing = lister.list_blobs(&path("bucket/missing")).unwrap();
        assert!(listing.is_empty());
        assert_eq!(listing.next_number(), Some(0));
    }

    #[test]
    fn child_keys_stop_at_first_level() {
        let lister = lister_with(&[
            ("d/", 0),
            ("d/a.0", 1),
            ("d/sub/b.0", 1),
            ("d/sub/deep/c.0", 1),
            ("e.0", 1),
        ]);
        let children = lister.list_child_keys(&path("bucket/d")).unwrap();
        assert_eq!(children, ["d/", "d/a.0", "d/sub/"]);
    }

    #[test]
    fn highest_blob_number_has_no_successor() {
        let last = format!("f.{}", u64::MAX);
        let lister = lister_with(&[("f.0", 1), (last.as_str(), 1)]);
        let listing = lister.list_blobs(&path("bucket/f")).unwrap();
        assert_eq!(listing.last_number(), Some(u64::MAX));
        assert_eq!(listing.next_number(), None);
    }
}
