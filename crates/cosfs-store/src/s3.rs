use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use futures::{stream, StreamExt, TryStreamExt};
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload, RetryConfig};
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectBackend;
use crate::types::{ListResult, ObjectSummary};

/// Object name standing in for a key that ends in `/`.
///
/// Object-store paths cannot end in a delimiter, so the directory marker
/// `a/b/` is stored as the object `a/b/.dir` and listed back as `a/b/`.
pub const DIRECTORY_MARKER: &str = ".dir";

/// Connection settings for an S3-compatible endpoint.
#[derive(Clone, Default)]
pub struct S3Options {
    /// Custom endpoint, for IBM COS, MinIO or localstack. Plain `http://`
    /// endpoints are allowed.
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Retries per request; `None` keeps the client default.
    pub max_retries: Option<usize>,
}

impl fmt::Debug for S3Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Options")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// Object backend over an S3-compatible service, driven through
/// [`object_store`].
///
/// The backend owns a small tokio runtime and blocks on it for every call, so
/// it must not be used from inside an async context. One client is built per
/// bucket on first use.
///
/// Without explicit credentials the client picks up the usual `AWS_*`
/// environment and instance metadata.
pub struct S3Backend {
    options: S3Options,
    runtime: Runtime,
    stores: Mutex<HashMap<String, Arc<AmazonS3>>>,
}

impl S3Backend {
    pub fn new(options: S3Options) -> StoreResult<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("cosfs-s3")
            .enable_all()
            .build()?;
        debug!(
            endpoint = options.endpoint.as_deref().unwrap_or("default"),
            region = options.region.as_deref().unwrap_or("default"),
            "opened s3 object backend"
        );
        Ok(Self {
            options,
            runtime,
            stores: Mutex::new(HashMap::new()),
        })
    }

    pub fn options(&self) -> &S3Options {
        &self.options
    }

    /// Client for `bucket`, built on first use.
    fn store(&self, bucket: &str) -> StoreResult<Arc<AmazonS3>> {
        if bucket.is_empty() || bucket.contains('/') {
            return Err(StoreError::InvalidBucket(bucket.to_string()));
        }
        let mut stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(store) = stores.get(bucket) {
            return Ok(Arc::clone(store));
        }

        let options = &self.options;
        let mut builder = if options.access_key_id.is_some() {
            AmazonS3Builder::new()
        } else {
            AmazonS3Builder::from_env()
        };
        builder = builder.with_bucket_name(bucket);
        if let Some(region) = &options.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &options.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }
        if let (Some(id), Some(secret)) = (&options.access_key_id, &options.secret_access_key) {
            builder = builder
                .with_access_key_id(id)
                .with_secret_access_key(secret);
        }
        if let Some(max_retries) = options.max_retries {
            builder = builder.with_retry(RetryConfig {
                max_retries,
                ..Default::default()
            });
        }

        let store = Arc::new(builder.build()?);
        stores.insert(bucket.to_string(), Arc::clone(&store));
        debug!(bucket, "built s3 client");
        Ok(store)
    }

    /// Number of buckets with a client built.
    pub fn client_count(&self) -> usize {
        self.stores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl ObjectBackend for S3Backend {
    fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> StoreResult<ListResult> {
        let store = self.store(bucket)?;
        // Object-store prefixes are whole path segments; list the enclosing
        // directory and filter on the raw prefix.
        let dir = match prefix.rfind('/') {
            Some(idx) => object_path(&prefix[..idx])?,
            None => ObjectPath::default(),
        };

        match delimiter {
            Some("/") => self.runtime.block_on(async {
                let listed = store.list_with_delimiter(Some(&dir)).await?;
                let objects = listed
                    .objects
                    .iter()
                    .map(|meta| (object_key(&meta.location), meta.size))
                    .filter(|(key, _)| key.starts_with(prefix))
                    .map(|(key, size)| ObjectSummary::new(key, size))
                    .collect();
                let common_prefixes = listed
                    .common_prefixes
                    .iter()
                    .map(|p| format!("{}/", p.as_ref()))
                    .filter(|p| p.starts_with(prefix))
                    .collect();
                let mut result = ListResult {
                    objects,
                    common_prefixes,
                };
                result.objects.sort_by(|a, b| a.key.cmp(&b.key));
                result.common_prefixes.sort();
                Ok::<_, StoreError>(result)
            }),
            None => self.runtime.block_on(async {
                let top = store.list_with_delimiter(Some(&dir)).await?;
                let mut entries: Vec<(String, u64)> = top
                    .objects
                    .iter()
                    .map(|meta| (object_key(&meta.location), meta.size))
                    .collect();
                // Only descend into sub-directories that can hold matching keys.
                for sub in &top.common_prefixes {
                    if !format!("{}/", sub.as_ref()).starts_with(prefix) {
                        continue;
                    }
                    let nested: Vec<_> = store.list(Some(sub)).try_collect().await?;
                    entries.extend(
                        nested
                            .iter()
                            .map(|meta| (object_key(&meta.location), meta.size)),
                    );
                }
                entries.sort();
                Ok::<_, StoreError>(ListResult::collect(entries, prefix, None))
            }),
            Some(other) => Err(StoreError::InvalidKey {
                key: prefix.to_string(),
                reason: format!("unsupported delimiter {other:?}"),
            }),
        }
    }

    fn get_object_range(&self, bucket: &str, key: &str, range: Range<u64>) -> StoreResult<Bytes> {
        let store = self.store(bucket)?;
        let path = object_path(key)?;
        if range.start >= range.end {
            if !self.object_exists(bucket, key)? {
                return Err(not_found(bucket, key));
            }
            return Ok(Bytes::new());
        }

        let data = self
            .runtime
            .block_on(store.get_range(&path, range.clone()))
            .map_err(|e| remote_error(bucket, key, e))?;
        let wanted = range.end - range.start;
        if data.len() as u64 != wanted {
            return Err(StoreError::InvalidRange {
                key: key.to_string(),
                start: range.start,
                end: range.end,
                size: range.start + data.len() as u64,
            });
        }
        Ok(data)
    }

    fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> StoreResult<()> {
        let store = self.store(bucket)?;
        let path = object_path(key)?;
        let size = data.len();
        self.runtime
            .block_on(store.put(&path, PutPayload::from(data)))
            .map_err(|e| remote_error(bucket, key, e))?;
        debug!(bucket, key, size, "put object");
        Ok(())
    }

    fn delete_objects(&self, bucket: &str, keys: &[String]) -> StoreResult<Vec<String>> {
        let store = self.store(bucket)?;
        let paths = keys
            .iter()
            .map(|key| object_path(key))
            .collect::<StoreResult<Vec<_>>>()?;
        if paths.is_empty() {
            return Ok(Vec::new());
        }

        self.runtime.block_on(async {
            let locations = stream::iter(paths.into_iter().map(Ok)).boxed();
            let mut results = store.delete_stream(locations);
            let mut deleted = Vec::new();
            let mut first_error = None;
            while let Some(result) = results.next().await {
                match result {
                    Ok(path) => deleted.push(object_key(&path)),
                    Err(object_store::Error::NotFound { path, .. }) => {
                        if let Ok(path) = ObjectPath::parse(&path) {
                            deleted.push(object_key(&path));
                        }
                    }
                    Err(e) => {
                        warn!(bucket, error = %e, "object delete failed");
                        first_error.get_or_insert(e);
                    }
                }
            }
            match first_error {
                Some(e) if deleted.is_empty() => Err(StoreError::from(e)),
                _ => Ok(deleted),
            }
        })
    }

    fn object_exists(&self, bucket: &str, key: &str) -> StoreResult<bool> {
        let store = self.store(bucket)?;
        let path = object_path(key)?;
        match self.runtime.block_on(store.head(&path)) {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

impl fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Backend")
            .field("options", &self.options)
            .field("clients", &self.client_count())
            .finish()
    }
}

/// Map a backend key onto an object-store path.
fn object_path(key: &str) -> StoreResult<ObjectPath> {
    let invalid = |reason: &str| StoreError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };
    if key.starts_with('/') {
        return Err(invalid("must not start with '/'"));
    }
    if key.rsplit('/').next() == Some(DIRECTORY_MARKER) {
        return Err(invalid("name is reserved for directory markers"));
    }
    let raw = match key.strip_suffix('/') {
        Some(dir) => format!("{dir}/{DIRECTORY_MARKER}"),
        None => key.to_string(),
    };
    ObjectPath::parse(raw).map_err(|e| invalid(&e.to_string()))
}

/// Inverse of [`object_path`].
fn object_key(path: &ObjectPath) -> String {
    let raw = path.as_ref();
    match raw.strip_suffix(DIRECTORY_MARKER) {
        Some(dir) if dir.ends_with('/') => dir.to_string(),
        _ => raw.to_string(),
    }
}

fn not_found(bucket: &str, key: &str) -> StoreError {
    StoreError::NotFound {
        bucket: bucket.to_string(),
        key: key.to_string(),
    }
}

fn remote_error(bucket: &str, key: &str, err: object_store::Error) -> StoreError {
    match err {
        object_store::Error::NotFound { .. } => not_found(bucket, key),
        other => other.into(),
    }
}
