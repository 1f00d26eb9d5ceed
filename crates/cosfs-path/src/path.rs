use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PathError, PathResult};

/// Hierarchical identifier of a file or directory in a blob store.
///
/// The first element is the container (bucket); every following element is a
/// segment of the logical path inside it. Paths are immutable values and
/// compare segment-wise, case-sensitively.
///
/// ```
/// use cosfs_path::BlobPath;
///
/// let path: BlobPath = "bucket/data/channel_0.dat".parse().unwrap();
/// assert_eq!(path.container(), "bucket");
/// assert_eq!(path.segments(), ["data", "channel_0.dat"]);
/// assert_eq!(path.name(), "channel_0.dat");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlobPath {
    elements: Vec<String>,
}

impl BlobPath {
    /// Separator between path elements, both in textual paths and in storage keys.
    pub const SEPARATOR: &'static str = "/";

    /// Path of a container root.
    pub fn container_root(container: impl Into<String>) -> PathResult<Self> {
        Self::new(container, Vec::<String>::new())
    }

    /// Build a path from a container and the segments below it.
    pub fn new<I, S>(container: impl Into<String>, segments: I) -> PathResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut elements = vec![container.into()];
        elements.extend(segments.into_iter().map(Into::into));
        for element in &elements {
            check_segment(element)?;
        }
        Ok(Self { elements })
    }

    /// The container (bucket) this path lives in.
    pub fn container(&self) -> &str {
        &self.elements[0]
    }

    /// Segments below the container, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.elements[1..]
    }

    /// Returns `true` if this path is the root of its container.
    pub fn is_container(&self) -> bool {
        self.elements.len() == 1
    }

    /// The last element of the path (the container name for a container root).
    pub fn name(&self) -> &str {
        self.elements
            .last()
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// The enclosing directory, or `None` for a container root.
    pub fn parent(&self) -> Option<BlobPath> {
        if self.is_container() {
            return None;
        }
        Some(Self {
            elements: self.elements[..self.elements.len() - 1].to_vec(),
        })
    }

    /// A direct child of this path.
    pub fn child(&self, name: impl Into<String>) -> PathResult<BlobPath> {
        let name = name.into();
        check_segment(&name)?;
        let mut elements = self.elements.clone();
        elements.push(name);
        Ok(Self { elements })
    }

    /// Every ancestor from the container root down to (excluding) this path.
    pub fn ancestors(&self) -> Vec<BlobPath> {
        (1..self.elements.len())
            .map(|len| Self {
                elements: self.elements[..len].to_vec(),
            })
            .collect()
    }

    /// Returns `true` if `self` is `other` or lies below it.
    pub fn starts_with(&self, other: &BlobPath) -> bool {
        self.elements.starts_with(&other.elements)
    }
}

fn check_segment(segment: &str) -> PathResult<()> {
    let reason = if segment.is_empty() {
        "must not be empty"
    } else if segment.contains(BlobPath::SEPARATOR) {
        "must not contain '/'"
    } else if segment == "." || segment == ".." {
        "must not be a relative reference"
    } else if segment.chars().any(char::is_control) {
        "must not contain control characters"
    } else {
        return Ok(());
    };
    Err(PathError::InvalidSegment {
        segment: segment.to_string(),
        reason: reason.into(),
    })
}

impl FromStr for BlobPath {
    type Err = PathError;

    fn from_str(s: &str) -> PathResult<Self> {
        let trimmed = s.trim_matches('/');
        if trimmed.is_empty() {
            return Err(PathError::Empty);
        }
        let mut parts = trimmed.split(Self::SEPARATOR);
        let container = parts.next().unwrap_or_default();
        Self::new(container, parts)
    }
}

impl TryFrom<String> for BlobPath {
    type Error = PathError;

    fn try_from(value: String) -> PathResult<Self> {
        value.parse()
    }
}

impl From<BlobPath> for String {
    fn from(path: BlobPath) -> Self {
        path.to_string()
    }
}

impl fmt::Display for BlobPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.elements.join(Self::SEPARATOR))
    }
}

impl fmt::Debug for BlobPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobPath({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_container_and_segments() {
        let path: BlobPath = "bucket/a/b/file".parse().unwrap();
        assert_eq!(path.container(), "bucket");
        assert_eq!(path.segments(), ["a", "b", "file"]);
        assert_eq!(path.name(), "file");
        assert!(!path.is_container());
    }

    #[test]
    fn parse_tolerates_outer_slashes() {
        let path: BlobPath = "/bucket/dir/".parse().unwrap();
        assert_eq!(path.to_string(), "bucket/dir");
    }

    #[test]
    fn parse_rejects_empty() {
        assert_eq!("".parse::<BlobPath>(), Err(PathError::Empty));
        assert_eq!("///".parse::<BlobPath>(), Err(PathError::Empty));
    }

    #[test]
    fn parse_rejects_empty_inner_segment() {
        assert!(matches!(
            "bucket/a//b".parse::<BlobPath>(),
            Err(PathError::InvalidSegment { .. })
        ));
    }

    #[test]
    fn reject_relative_segments() {
        assert!(BlobPath::new("bucket", ["..", "x"]).is_err());
        assert!(BlobPath::new("bucket", ["."]).is_err());
    }

    #[test]
    fn child_rejects_separator() {
        let root = BlobPath::container_root("bucket").unwrap();
        assert!(root.child("a/b").is_err());
        assert_eq!(root.child("a").unwrap().to_string(), "bucket/a");
    }

    #[test]
    fn parent_and_ancestors() {
        let path: BlobPath = "bucket/a/b/c".parse().unwrap();
        assert_eq!(path.parent().unwrap().to_string(), "bucket/a/b");
        let ancestors: Vec<String> = path.ancestors().iter().map(|p| p.to_string()).collect();
        assert_eq!(ancestors, ["bucket", "bucket/a", "bucket/a/b"]);

        let root = BlobPath::container_root("bucket").unwrap();
        assert!(root.parent().is_none());
        assert!(root.ancestors().is_empty());
        assert!(root.is_container());
    }

    #[test]
    fn case_sensitive_comparison() {
        let lower: BlobPath = "bucket/file".parse().unwrap();
        let upper: BlobPath = "bucket/File".parse().unwrap();
        assert_ne!(lower, upper);
    }

    #[test]
    fn starts_with_is_segment_wise() {
        let dir: BlobPath = "bucket/foo".parse().unwrap();
        let inside: BlobPath = "bucket/foo/x".parse().unwrap();
        let sibling: BlobPath = "bucket/foobar/x".parse().unwrap();
        assert!(inside.starts_with(&dir));
        assert!(!sibling.starts_with(&dir));
    }

    #[test]
    fn serde_as_string() {
        let path: BlobPath = "bucket/a/b".parse().unwrap();
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"bucket/a/b\"");
        let back: BlobPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
        assert!(serde_json::from_str::<BlobPath>("\"bucket//x\"").is_err());
    }
}
