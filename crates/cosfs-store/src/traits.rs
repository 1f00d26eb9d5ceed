use std::ops::Range;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::StoreResult;
use crate::types::ListResult;

/// Flat bucket + key blob store.
///
/// All implementations must satisfy these invariants:
/// - Listings are in ascending key order.
/// - `get_object_range` never returns fewer bytes than requested; a range
///   past the end of the object is an error.
/// - `delete_objects` returns the keys it actually removed. Keys that were
///   already absent count as removed.
/// - Calls are blocking and may be issued concurrently from many threads.
pub trait ObjectBackend: Send + Sync {
    /// List objects whose key starts with `prefix`.
    ///
    /// With a `delimiter`, keys containing the delimiter after the prefix are
    /// collapsed into [`ListResult::common_prefixes`] so that only immediate
    /// children are returned.
    fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> StoreResult<ListResult>;

    /// Read the half-open byte range `range` of an object.
    fn get_object_range(&self, bucket: &str, key: &str, range: Range<u64>) -> StoreResult<Bytes>;

    /// Store `data` under `key`, replacing any previous object.
    fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> StoreResult<()>;

    /// Delete a batch of objects and return the keys that were deleted.
    fn delete_objects(&self, bucket: &str, keys: &[String]) -> StoreResult<Vec<String>>;

    /// Check whether an object exists.
    fn object_exists(&self, bucket: &str, key: &str) -> StoreResult<bool>;
}

impl<B: ObjectBackend + ?Sized> ObjectBackend for Arc<B> {
    fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> StoreResult<ListResult> {
        (**self).list_objects(bucket, prefix, delimiter)
    }

    fn get_object_range(&self, bucket: &str, key: &str, range: Range<u64>) -> StoreResult<Bytes> {
        (**self).get_object_range(bucket, key, range)
    }

    fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> StoreResult<()> {
        (**self).put_object(bucket, key, data)
    }

    fn delete_objects(&self, bucket: &str, keys: &[String]) -> StoreResult<Vec<String>> {
        (**self).delete_objects(bucket, keys)
    }

    fn object_exists(&self, bucket: &str, key: &str) -> StoreResult<bool> {
        (**self).object_exists(bucket, key)
    }
}
