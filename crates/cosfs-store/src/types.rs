use std::collections::BTreeSet;

use serde::Serialize;

/// Key and size of one stored object, as reported by a listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
}

impl ObjectSummary {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
        }
    }
}

/// Result of a (possibly delimited) listing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ListResult {
    /// Objects directly matching the query, in key order.
    pub objects: Vec<ObjectSummary>,
    /// Key prefixes collapsed at the delimiter, each ending with it.
    pub common_prefixes: Vec<String>,
}

impl ListResult {
    /// Build a listing from `(key, size)` pairs in ascending key order.
    ///
    /// Shared by the built-in backends so they agree on delimiter semantics.
    pub fn collect<I>(entries: I, prefix: &str, delimiter: Option<&str>) -> Self
    where
        I: IntoIterator<Item = (String, u64)>,
    {
        let mut objects = Vec::new();
        let mut common_prefixes = BTreeSet::new();

        for (key, size) in entries {
            let Some(rest) = key.strip_prefix(prefix) else {
                continue;
            };
            let collapsed = delimiter
                .filter(|d| !d.is_empty())
                .and_then(|d| rest.find(d).map(|idx| idx + d.len()));
            match collapsed {
                Some(end) => {
                    common_prefixes.insert(format!("{prefix}{}", &rest[..end]));
                }
                None => objects.push(ObjectSummary { key, size }),
            }
        }

        Self {
            objects,
            common_prefixes: common_prefixes.into_iter().collect(),
        }
    }

    /// Object keys followed by common prefixes.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.objects
            .iter()
            .map(|o| o.key.as_str())
            .chain(self.common_prefixes.iter().map(String::as_str))
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.common_prefixes.is_empty()
    }
}
