use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;

use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectBackend;
use crate::types::ListResult;

type Buckets = HashMap<String, BTreeMap<String, Bytes>>;

/// In-memory, map-based object backend.
///
/// Intended for tests and embedding. Buckets spring into existence on first
/// put; listing an unknown bucket yields an empty result. Object payloads are
/// reference-counted [`Bytes`], so reads do not copy.
pub struct InMemoryBackend {
    buckets: RwLock<Buckets>,
}

impl InMemoryBackend {
    /// Create a new empty backend.
    pub fn new() -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
        }
    }

    /// Number of objects stored in `bucket`.
    pub fn object_count(&self, bucket: &str) -> usize {
        self.read_buckets()
            .map(|b| b.get(bucket).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    /// All keys in `bucket`, sorted.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.read_buckets()
            .map(|b| {
                b.get(bucket)
                    .map(|objects| objects.keys().cloned().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// Total bytes across all objects in all buckets.
    pub fn total_bytes(&self) -> u64 {
        self.read_buckets()
            .map(|b| {
                b.values()
                    .flat_map(BTreeMap::values)
                    .map(|data| data.len() as u64)
                    .sum()
            })
            .unwrap_or(0)
    }

    fn read_buckets(&self) -> StoreResult<RwLockReadGuard<'_, Buckets>> {
        self.buckets
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }

    fn write_buckets(&self) -> StoreResult<RwLockWriteGuard<'_, Buckets>> {
        self.buckets
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectBackend for InMemoryBackend {
    fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> StoreResult<ListResult> {
        let buckets = self.read_buckets()?;
        let Some(objects) = buckets.get(bucket) else {
            return Ok(ListResult::default());
        };
        let entries = objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, data)| (key.clone(), data.len() as u64));
        Ok(ListResult::collect(entries, prefix, delimiter))
    }

    fn get_object_range(&self, bucket: &str, key: &str, range: Range<u64>) -> StoreResult<Bytes> {
        let buckets = self.read_buckets()?;
        let data = buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .ok_or_else(|| StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;
        let size = data.len() as u64;
        if range.start > range.end || range.end > size {
            return Err(StoreError::InvalidRange {
                key: key.to_string(),
                start: range.start,
                end: range.end,
                size,
            });
        }
        Ok(data.slice(range.start as usize..range.end as usize))
    }

    fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> StoreResult<()> {
        let mut buckets = self.write_buckets()?;
        buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), data);
        Ok(())
    }

    fn delete_objects(&self, bucket: &str, keys: &[String]) -> StoreResult<Vec<String>> {
        let mut buckets = self.write_buckets()?;
        if let Some(objects) = buckets.get_mut(bucket) {
            for key in keys {
                objects.remove(key);
            }
        }
        Ok(keys.to_vec())
    }

    fn object_exists(&self, bucket: &str, key: &str) -> StoreResult<bool> {
        let buckets = self.read_buckets()?;
        Ok(buckets
            .get(bucket)
            .is_some_and(|objects| objects.contains_key(key)))
    }
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let buckets = self.read_buckets().map(|b| b.len()).unwrap_or(0);
        f.debug_struct("InMemoryBackend")
            .field("bucket_count", &buckets)
            .finish()
    }
}
