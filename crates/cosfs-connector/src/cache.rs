use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use cosfs_path::BlobPath;
use cosfs_store::ObjectBackend;
use tracing::trace;

use crate::error::ConnectorResult;
use crate::lister::{BlobLister, BlobListing};

/// Memoizing decorator over a [`BlobLister`].
///
/// The first `list_blobs` for a path goes to the inner lister; later calls
/// return the remembered listing until [`invalidate`](BlobLister::invalidate)
/// is called for that path. Child-key listings are never cached.
///
/// A listing fetched while an invalidation ran is returned to its caller but
/// not remembered, so a mutation that has returned is always followed by a
/// fresh backend query.
///
/// The cache only knows about mutations made through the connector that owns
/// it. Writes by other processes become visible after the next invalidation
/// or [`clear`](CachingLister::clear).
pub struct CachingLister<L> {
    inner: L,
    state: RwLock<CacheState>,
}

#[derive(Default)]
struct CacheState {
    listings: HashMap<BlobPath, Arc<BlobListing>>,
    /// Bumped by every invalidation.
    generation: u64,
}

impl<L: BlobLister> CachingLister<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            state: RwLock::new(CacheState::default()),
        }
    }

    /// The wrapped lister.
    pub fn inner(&self) -> &L {
        &self.inner
    }

    /// Number of cached listings.
    pub fn len(&self) -> usize {
        self.read_state().listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if a listing for `file` is cached.
    pub fn contains(&self, file: &BlobPath) -> bool {
        self.read_state().listings.contains_key(file)
    }

    /// Drop every cached listing.
    pub fn clear(&self) {
        let mut state = self.write_state();
        state.listings.clear();
        state.generation = state.generation.wrapping_add(1);
    }

    fn read_state(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<L: BlobLister> BlobLister for CachingLister<L> {
    fn backend(&self) -> &dyn ObjectBackend {
        self.inner.backend()
    }

    fn list_blobs(&self, file: &BlobPath) -> ConnectorResult<Arc<BlobListing>> {
        let seen = {
            let state = self.read_state();
            if let Some(hit) = state.listings.get(file) {
                trace!(file = %file, "blob listing cache hit");
                return Ok(Arc::clone(hit));
            }
            state.generation
        };

        let listing = self.inner.list_blobs(file)?;
        let mut state = self.write_state();
        if state.generation == seen {
            state.listings.insert(file.clone(), Arc::clone(&listing));
        } else {
            trace!(file = %file, "blob listing raced an invalidation, not cached");
        }
        Ok(listing)
    }

    fn list_child_keys(&self, directory: &BlobPath) -> ConnectorResult<Vec<String>> {
        self.inner.list_child_keys(directory)
    }

    fn invalidate(&self, file: &BlobPath) {
        {
            let mut state = self.write_state();
            state.listings.remove(file);
            state.generation = state.generation.wrapping_add(1);
        }
        self.inner.invalidate(file);
    }
}

impl<L> std::fmt::Debug for CachingLister<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cached = self
            .state
            .read()
            .map(|s| s.listings.len())
            .unwrap_or_default();
        f.debug_struct("CachingLister")
            .field("cached", &cached)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bytes::Bytes;
    use cosfs_store::InMemoryBackend;

    use crate::lister::DirectLister;

    /// Counts how often the wrapped lister is asked for blobs.
    struct CountingLister {
        inner: DirectLister<InMemoryBackend>,
        calls: AtomicUsize,
    }

    impl BlobLister for CountingLister {
        fn backend(&self) -> &dyn ObjectBackend {
            self.inner.backend()
        }

        fn list_blobs(&self, file: &BlobPath) -> ConnectorResult<Arc<BlobListing>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.list_blobs(file)
        }

        fn list_child_keys(&self, directory: &BlobPath) -> ConnectorResult<Vec<String>> {
            self.inner.list_child_keys(directory)
        }
    }

    fn setup() -> CachingLister<CountingLister> {
        let backend = InMemoryBackend::new();
        backend.put_object("bucket", "f.0", Bytes::from_static(b"abc")).unwrap();
        CachingLister::new(CountingLister {
            inner: DirectLister::new(backend),
            calls: AtomicUsize::new(0),
        })
    }

    fn file() -> BlobPath {
        "bucket/f".parse().unwrap()
    }

    #[test]
    fn second_listing_is_served_from_cache() {
        let cache = setup();
        let first = cache.list_blobs(&file()).unwrap();
        let second = cache.list_blobs(&file()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 1);
        assert!(cache.contains(&file()));
    }

    #[test]
    fn invalidate_forces_fresh_listing() {
        let cache = setup();
        cache.list_blobs(&file()).unwrap();

        cache
            .backend()
            .put_object("bucket", "f.1", Bytes::from_static(b"de"))
            .unwrap();
        // Stale until invalidated.
        assert_eq!(cache.list_blobs(&file()).unwrap().len(), 1);

        cache.invalidate(&file());
        assert!(!cache.contains(&file()));
        let fresh = cache.list_blobs(&file()).unwrap();
        assert_eq!(fresh.len(), 2);
        assert_eq!(fresh.total_size(), 5);
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn invalidate_only_touches_one_path() {
        let cache = setup();
        let other: BlobPath = "bucket/g".parse().unwrap();
        cache.list_blobs(&file()).unwrap();
        cache.list_blobs(&other).unwrap();
        assert_eq!(cache.len(), 2);

        cache.invalidate(&other);
        assert!(cache.contains(&file()));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
