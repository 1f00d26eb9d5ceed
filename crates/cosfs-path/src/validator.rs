//! Bucket name validation.
//!
//! Valid bucket names:
//! - Must be between 3 and 63 characters long
//! - May contain only lowercase letters, digits, `.` and `-`
//! - Must start with a lowercase letter or a digit
//! - Must not end with `-`
//! - Must not contain `..`, `.-` or `-.`
//! - Must not look like an IPv4 address
//! - Must not start with `xn--`

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{PathError, PathResult};
use crate::path::BlobPath;

const MIN_LEN: usize = 3;
const MAX_LEN: usize = 63;
const RESERVED_PREFIX: &str = "xn--";

static IPV4_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    let octet = r"(0|1\d?\d?|2[0-4]?\d?|25[0-5]?|[3-9]\d?)";
    Regex::new(&format!(r"^({octet}\.){{3}}{octet}$")).expect("static pattern")
});

/// Checks a path before any backend call touches its container.
pub trait PathValidator: Send + Sync {
    fn validate(&self, path: &BlobPath) -> PathResult<()>;
}

/// [`PathValidator`] enforcing the bucket naming rules on the container.
#[derive(Clone, Copy, Debug, Default)]
pub struct BucketNameValidator;

impl PathValidator for BucketNameValidator {
    fn validate(&self, path: &BlobPath) -> PathResult<()> {
        validate_bucket_name(path.container())
    }
}

/// Validate a bucket name, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use cosfs_path::validate_bucket_name;
///
/// assert!(validate_bucket_name("foo-bar.baz").is_ok());
/// assert!(validate_bucket_name("ab").is_err());
/// assert!(validate_bucket_name("192.168.0.1").is_err());
/// ```
pub fn validate_bucket_name(name: &str) -> PathResult<()> {
    let reject = |reason: &str| {
        Err(PathError::InvalidBucketName {
            name: name.to_string(),
            reason: reason.into(),
        })
    };

    let len = name.len();
    if !(MIN_LEN..=MAX_LEN).contains(&len) {
        return reject("must be between 3 and 63 characters long");
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
    {
        return reject("may contain only lowercase letters, numbers, periods (.) and dashes (-)");
    }

    if !name.starts_with(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit()) {
        return reject("must begin with a lowercase letter or a number");
    }

    if name.ends_with('-') {
        return reject("must not end with a dash (-)");
    }

    if name.contains("..") {
        return reject("must not contain consecutive periods (..)");
    }

    if name.contains(".-") || name.contains("-.") {
        return reject("must not have dashes adjacent to periods (.- or -.)");
    }

    if IPV4_SHAPE.is_match(name) {
        return reject("must not be formatted as an IP address");
    }

    if name.starts_with(RESERVED_PREFIX) {
        return reject("must not start with 'xn--'");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_simple_names() {
        assert!(validate_bucket_name("abc").is_ok());
        assert!(validate_bucket_name("foo-bar.baz").is_ok());
        assert!(validate_bucket_name("1bucket").is_ok());
        assert!(validate_bucket_name("my.bucket.name").is_ok());
    }

    #[test]
    fn reject_length_bounds() {
        assert!(validate_bucket_name("ab").is_err());
        assert!(validate_bucket_name(&"a".repeat(63)).is_ok());
        assert!(validate_bucket_name(&"a".repeat(64)).is_err());
    }

    #[test]
    fn reject_uppercase_and_symbols() {
        assert!(validate_bucket_name("Abc").is_err());
        assert!(validate_bucket_name("ab_c").is_err());
        assert!(validate_bucket_name("ab c").is_err());
    }

    #[test]
    fn reject_bad_first_character() {
        assert!(validate_bucket_name(".abc").is_err());
        assert!(validate_bucket_name("-abc").is_err());
    }

    #[test]
    fn reject_trailing_dash() {
        assert!(validate_bucket_name("abc-").is_err());
    }

    #[test]
    fn reject_period_rules() {
        assert!(validate_bucket_name("foo..bar").is_err());
        assert!(validate_bucket_name("foo-.bar").is_err());
        assert!(validate_bucket_name("foo.-bar").is_err());
    }

    #[test]
    fn reject_ip_shape() {
        assert!(validate_bucket_name("192.168.0.1").is_err());
        assert!(validate_bucket_name("10.0.0.255").is_err());
        assert!(validate_bucket_name("192.168.0.1.example").is_ok());
    }

    #[test]
    fn reject_reserved_prefix() {
        assert!(validate_bucket_name("xn--foo").is_err());
        assert!(validate_bucket_name("xnfoo").is_ok());
    }

    #[test]
    fn error_carries_reason() {
        let err = validate_bucket_name("ab").unwrap_err();
        assert!(err.to_string().contains("between 3 and 63"));
    }

    #[test]
    fn validator_checks_container_only() {
        let ok: BlobPath = "bucket/Upper_Case-Segment".parse().unwrap();
        assert!(BucketNameValidator.validate(&ok).is_ok());
        let bad: BlobPath = "Bucket/file".parse().unwrap();
        assert!(BucketNameValidator.validate(&bad).is_err());
    }
}
