//! Key codec.
//!
//! Maps a [`BlobPath`] onto storage keys inside its container:
//!
//! ```text
//! bucket/dir/sub          directory key   "dir/sub/"
//! bucket/dir/file         blob prefix     "dir/file."
//!                         blob n          "dir/file.<n>"   (plain decimal)
//! bucket                  directory key   ""
//! ```
//!
//! Blob numbers are not zero-padded, so key order is not blob order. Every
//! consumer sorts by the parsed number instead.
//!
//! The functions here are pure and total. A blob key ends in `.<digits>` and
//! path segments cannot contain `/`, so two distinct files never share a key
//! and a file key never looks like a directory key.

use regex::Regex;

use cosfs_path::BlobPath;

/// Separator between a file's key and its blob number.
pub const BLOB_NUMBER_SEPARATOR: char = '.';

/// Segments below the container joined with `/`, without a trailing separator.
pub fn container_key(path: &BlobPath) -> String {
    path.segments().join(BlobPath::SEPARATOR)
}

/// Key of a directory: its container key plus a trailing `/`.
///
/// This is both the key of the directory's marker object and the prefix of
/// every key below it. The container root maps to the empty string.
pub fn directory_key(directory: &BlobPath) -> String {
    if directory.is_container() {
        return String::new();
    }
    let mut key = container_key(directory);
    key.push_str(BlobPath::SEPARATOR);
    key
}

/// Prefix used with the `/` delimiter to list the immediate children of a directory.
pub fn child_key_prefix(directory: &BlobPath) -> String {
    directory_key(directory)
}

/// Prefix shared by all blob keys of `file`.
pub fn blob_key_prefix(file: &BlobPath) -> String {
    let mut prefix = container_key(file);
    prefix.push(BLOB_NUMBER_SEPARATOR);
    prefix
}

/// Key of blob number `number` of `file`.
pub fn blob_key(file: &BlobPath, number: u64) -> String {
    format!("{}{number}", blob_key_prefix(file))
}

/// Parse the blob number from the suffix of a blob key.
///
/// Returns `None` unless the key ends in `.<digits>` with a non-empty stem.
pub fn parse_blob_number(key: &str) -> Option<u64> {
    split_blob_name(key).map(|(_, number)| number)
}

/// Split `name.<digits>` into the file name and the blob number.
pub fn split_blob_name(name: &str) -> Option<(&str, u64)> {
    let (stem, digits) = name.rsplit_once(BLOB_NUMBER_SEPARATOR)?;
    if stem.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(|n| (stem, n))
}

/// Matcher for the blob keys of exactly one file.
///
/// Accepts `prefix + <digits>` and nothing else, so listing `foo.` does not
/// pick up `foo.1.0` (blob 0 of file `foo.1`), and a plain prefix listing of
/// `foo` is never confused with `foobar`.
#[derive(Clone, Debug)]
pub struct BlobKeyPattern {
    regex: Regex,
}

impl BlobKeyPattern {
    /// Build the matcher for keys starting with `prefix`.
    pub fn new(prefix: &str) -> Self {
        let pattern = format!("^{}([0-9]+)$", regex::escape(prefix));
        Self {
            regex: Regex::new(&pattern).expect("escaped prefix is always a valid pattern"),
        }
    }

    /// Matcher for the blobs of `file`.
    pub fn for_file(file: &BlobPath) -> Self {
        Self::new(&blob_key_prefix(file))
    }

    /// Returns `true` if `key` is a blob key of this file.
    pub fn matches(&self, key: &str) -> bool {
        self.blob_number(key).is_some()
    }

    /// The blob number encoded in `key`, if `key` belongs to this file.
    pub fn blob_number(&self, key: &str) -> Option<u64> {
        self.regex
            .captures(key)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn path(s: &str) -> BlobPath {
        s.parse().unwrap()
    }

    #[test]
    fn blob_keys_for_nested_file() {
        let file = path("bucket/data/channel_0/file.dat");
        assert_eq!(blob_key_prefix(&file), "data/channel_0/file.dat.");
        assert_eq!(blob_key(&file, 0), "data/channel_0/file.dat.0");
        assert_eq!(blob_key(&file, 12), "data/channel_0/file.dat.12");
    }

    #[test]
    fn directory_keys() {
        assert_eq!(directory_key(&path("bucket/a/b")), "a/b/");
        assert_eq!(child_key_prefix(&path("bucket/a")), "a/");
        assert_eq!(directory_key(&path("bucket")), "");
    }

    #[test]
    fn parse_blob_numbers() {
        assert_eq!(parse_blob_number("dir/file.7"), Some(7));
        assert_eq!(parse_blob_number("dir/file.dat.10"), Some(10));
        assert_eq!(parse_blob_number("dir/file"), None);
        assert_eq!(parse_blob_number("dir/file."), None);
        assert_eq!(parse_blob_number(".5"), None);
        assert_eq!(parse_blob_number("file.-1"), None);
        assert_eq!(parse_blob_number("file.99999999999999999999999"), None);
    }

    #[test]
    fn pattern_rejects_lookalike_files() {
        let pattern = BlobKeyPattern::for_file(&path("bucket/foo"));
        assert!(pattern.matches("foo.0"));
        assert!(pattern.matches("foo.123"));
        assert!(!pattern.matches("foobar.0"));
        assert!(!pattern.matches("foo.1.0"));
        assert!(!pattern.matches("foo."));
        assert!(!pattern.matches("foo/"));
        assert!(!pattern.matches("xfoo.0"));
    }

    #[test]
    fn pattern_escapes_regex_metacharacters() {
        let pattern = BlobKeyPattern::for_file(&path("bucket/a+b(c)"));
        assert!(pattern.matches("a+b(c).4"));
        assert!(!pattern.matches("aab(c).4"));
        assert_eq!(pattern.blob_number("a+b(c).4"), Some(4));
    }

    #[test]
    fn split_blob_name_returns_stem() {
        assert_eq!(split_blob_name("file.dat.3"), Some(("file.dat", 3)));
        assert_eq!(split_blob_name("sub/"), None);
    }

    fn segment() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9_.-]{1,12}".prop_filter("relative reference", |s| s != "." && s != "..")
    }

    fn file_path() -> impl Strategy<Value = BlobPath> {
        prop::collection::vec(segment(), 1..4)
            .prop_map(|segments| BlobPath::new("bucket", segments).unwrap())
    }

    proptest! {
        #[test]
        fn blob_number_survives_encoding(file in file_path(), n in any::<u64>()) {
            let key = blob_key(&file, n);
            prop_assert_eq!(parse_blob_number(&key), Some(n));
            prop_assert_eq!(BlobKeyPattern::for_file(&file).blob_number(&key), Some(n));
        }

        #[test]
        fn distinct_files_never_share_keys(
            a in file_path(),
            b in file_path(),
            n in 0u64..1000,
            m in 0u64..1000,
        ) {
            prop_assume!(a != b);
            prop_assert_ne!(blob_key(&a, n), blob_key(&b, m));
            prop_assert!(!BlobKeyPattern::for_file(&a).matches(&blob_key(&b, m)));
        }

        #[test]
        fn blob_keys_never_look_like_directories(file in file_path(), n in any::<u64>()) {
            let key = blob_key(&file, n);
            prop_assert!(!key.ends_with(BlobPath::SEPARATOR));
        }
    }
}
