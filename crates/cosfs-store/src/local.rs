use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectBackend;
use crate::types::ListResult;

/// Hex doubles the key length; most file systems cap names at 255 bytes.
const MAX_KEY_LEN: usize = 127;

/// Object backend that keeps each bucket as a directory on the local disk.
///
/// Layout:
/// ```text
/// {root}/
///   {bucket}/
///     {hex(key)}      one file per object, flat
/// ```
///
/// Keys are hex-encoded into file names so that `a/`, `a` and `a/b` never
/// collide on disk. Puts go through a temp file and a rename, so readers never
/// observe a half-written object.
#[derive(Debug, Clone)]
pub struct LocalDirBackend {
    root: PathBuf,
}

impl LocalDirBackend {
    /// Open a backend rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "opened local object backend");
        Ok(Self { root })
    }

    /// Root directory of the backend.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &str) -> StoreResult<PathBuf> {
        if bucket.is_empty()
            || bucket.starts_with('.')
            || bucket.contains(['/', '\\'])
        {
            return Err(StoreError::InvalidBucket(bucket.to_string()));
        }
        Ok(self.root.join(bucket))
    }

    fn object_path(&self, bucket: &str, key: &str) -> StoreResult<PathBuf> {
        Ok(self.bucket_dir(bucket)?.join(Self::file_name(key)?))
    }

    fn file_name(key: &str) -> StoreResult<String> {
        let reason = if key.is_empty() {
            "must not be empty"
        } else if key.len() > MAX_KEY_LEN {
            "too long for a local file name"
        } else {
            return Ok(hex::encode(key));
        };
        Err(StoreError::InvalidKey {
            key: key.to_string(),
            reason: reason.into(),
        })
    }

    fn not_found(bucket: &str, key: &str) -> StoreError {
        StoreError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }
}

impl ObjectBackend for LocalDirBackend {
    fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> StoreResult<ListResult> {
        let dir = self.bucket_dir(bucket)?;
        let read_dir = match fs::read_dir(&dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ListResult::default()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(key) = file_name
                .to_str()
                .and_then(|name| hex::decode(name).ok())
                .and_then(|raw| String::from_utf8(raw).ok())
            else {
                continue;
            };
            if !key.starts_with(prefix) {
                continue;
            }
            let metadata = match entry.metadata() {
                Ok(m) => m,
                // Deleted between read_dir and stat.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            if metadata.is_file() {
                entries.push((key, metadata.len()));
            }
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(ListResult::collect(entries, prefix, delimiter))
    }

    fn get_object_range(&self, bucket: &str, key: &str, range: Range<u64>) -> StoreResult<Bytes> {
        let path = self.object_path(bucket, key)?;
        let mut file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Self::not_found(bucket, key))
            }
            Err(e) => return Err(e.into()),
        };

        let size = file.metadata()?.len();
        if range.start > range.end || range.end > size {
            return Err(StoreError::InvalidRange {
                key: key.to_string(),
                start: range.start,
                end: range.end,
                size,
            });
        }

        let mut buf = vec![0u8; (range.end - range.start) as usize];
        file.seek(SeekFrom::Start(range.start))?;
        file.read_exact(&mut buf)?;
        Ok(Bytes::from(buf))
    }

    fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> StoreResult<()> {
        let dir = self.bucket_dir(bucket)?;
        let target = dir.join(Self::file_name(key)?);
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(target).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    fn delete_objects(&self, bucket: &str, keys: &[String]) -> StoreResult<Vec<String>> {
        let dir = self.bucket_dir(bucket)?;
        let mut deleted = Vec::with_capacity(keys.len());
        for key in keys {
            match fs::remove_file(dir.join(Self::file_name(key)?)) {
                Ok(()) => deleted.push(key.clone()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => deleted.push(key.clone()),
                Err(e) => warn!(bucket, key = %key, error = %e, "failed to delete object"),
            }
        }
        Ok(deleted)
    }

    fn object_exists(&self, bucket: &str, key: &str) -> StoreResult<bool> {
        Ok(self.object_path(bucket, key)?.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, LocalDirBackend) {
        let dir = TempDir::new().unwrap();
        let backend = LocalDirBackend::open(dir.path().join("objects")).unwrap();
        (dir, backend)
    }

    #[test]
    fn open_creates_root() {
        let (dir, backend) = setup();
        assert!(dir.path().join("objects").is_dir());
        assert_eq!(backend.root(), dir.path().join("objects"));
    }

    #[test]
    fn put_get_roundtrip_with_range() {
        let (_dir, backend) = setup();
        backend
            .put_object("bucket", "dir/file.0", Bytes::from_static(b"0123456789"))
            .unwrap();
        let bytes = backend.get_object_range("bucket", "dir/file.0", 2..5).unwrap();
        assert_eq!(&bytes[..], b"234");
    }

    #[test]
    fn range_past_end_is_rejected() {
        let (_dir, backend) = setup();
        backend.put_object("bucket", "k", Bytes::from_static(b"abc")).unwrap();
        let err = backend.get_object_range("bucket", "k", 0..10).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRange { .. }));
    }

    #[test]
    fn missing_object_is_not_found() {
        let (_dir, backend) = setup();
        let err = backend.get_object_range("bucket", "k", 0..0).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn directory_marker_and_file_do_not_collide() {
        let (_dir, backend) = setup();
        backend.put_object("bucket", "a/", Bytes::new()).unwrap();
        backend.put_object("bucket", "a.0", Bytes::from_static(b"x")).unwrap();
        backend.put_object("bucket", "a/b.0", Bytes::from_static(b"yy")).unwrap();

        let all = backend.list_objects("bucket", "", None).unwrap();
        let keys: Vec<&str> = all.keys().collect();
        assert_eq!(keys, ["a.0", "a/", "a/b.0"]);

        let children = backend.list_objects("bucket", "a/", Some("/")).unwrap();
        let keys: Vec<&str> = children.keys().collect();
        assert_eq!(keys, ["a/", "a/b.0"]);
    }

    #[test]
    fn list_missing_bucket_is_empty() {
        let (_dir, backend) = setup();
        assert!(backend.list_objects("bucket", "", None).unwrap().is_empty());
    }

    #[test]
    fn delete_and_exists() {
        let (_dir, backend) = setup();
        backend.put_object("bucket", "f.0", Bytes::from_static(b"1")).unwrap();
        assert!(backend.object_exists("bucket", "f.0").unwrap());

        let deleted = backend
            .delete_objects("bucket", &["f.0".to_string(), "f.1".to_string()])
            .unwrap();
        assert_eq!(deleted, ["f.0", "f.1"]);
        assert!(!backend.object_exists("bucket", "f.0").unwrap());
    }

    #[test]
    fn reject_path_like_buckets() {
        let (_dir, backend) = setup();
        assert!(matches!(
            backend.put_object("../escape", "k", Bytes::new()),
            Err(StoreError::InvalidBucket(_))
        ));
        assert!(backend.list_objects("", "", None).is_err());
    }

    #[test]
    fn reject_unstorable_keys() {
        let (_dir, backend) = setup();
        let long = "k".repeat(MAX_KEY_LEN + 1);
        assert!(matches!(
            backend.put_object("bucket", &long, Bytes::new()),
            Err(StoreError::InvalidKey { .. })
        ));
        assert!(backend.put_object("bucket", "", Bytes::new()).is_err());
    }

    #[test]
    fn objects_survive_reopen() {
        let (dir, backend) = setup();
        backend.put_object("bucket", "f.0", Bytes::from_static(b"persist")).unwrap();
        drop(backend);

        let reopened = LocalDirBackend::open(dir.path().join("objects")).unwrap();
        let bytes = reopened.get_object_range("bucket", "f.0", 0..7).unwrap();
        assert_eq!(&bytes[..], b"persist");
    }
}
