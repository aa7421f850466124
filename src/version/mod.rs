//! Version ordering and "latest" selection for registry components.
//!
//! Registry versions are strings. Most are semantic versions (optionally `v`-prefixed),
//! but nothing stops a registry from publishing `nightly` or `2024-01-snapshot`, so every
//! operation here has a total, deterministic order over arbitrary strings:
//!
//! - non-semver strings sort lexicographically, before every semver version
//! - semver versions sort by precedence; equal precedence falls back to the raw string
//!
//! "Latest" is the greatest stable semver version. Pre-releases are only chosen when no
//! stable version exists, and non-semver strings only when nothing parses.
//!
//! Third-party package ranges live in [`range`].

pub mod range;

pub use range::PackageRange;

use semver::Version;
use std::cmp::Ordering;

/// Parse a version string, tolerating a leading `v` or `V`.
#[must_use]
pub fn parse_version(version: &str) -> Option<Version> {
    let trimmed = version.trim();
    let stripped = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);
    Version::parse(stripped).ok()
}

/// Total order over version strings.
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (parse_version(a), parse_version(b)) {
        (Some(va), Some(vb)) => va.cmp(&vb).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

/// Sort versions ascending and drop duplicates.
pub fn sort_versions(versions: &mut Vec<String>) {
    versions.sort_by(|a, b| compare_versions(a, b));
    versions.dedup();
}

/// Pick the version "latest" refers to.
///
/// # Examples
///
/// ```
/// use compkit_cli::version::latest_version;
///
/// let versions = vec!["1.0.0".to_string(), "1.10.0".to_string(), "2.0.0-rc.1".to_string()];
/// assert_eq!(latest_version(&versions), Some("1.10.0"));
/// ```
#[must_use]
pub fn latest_version(versions: &[String]) -> Option<&str> {
    let greatest = |filter: &dyn Fn(&Version) -> bool| {
        versions
            .iter()
            .filter_map(|raw| parse_version(raw).filter(|v| filter(v)).map(|_| raw.as_str()))
            .max_by(|a, b| compare_versions(a, b))
    };

    greatest(&|v| v.pre.is_empty())
        .or_else(|| greatest(&|_| true))
        .or_else(|| versions.iter().map(String::as_str).max())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_parse_version_accepts_prefix() {
        assert_eq!(parse_version("v1.2.3"), Some(Version::new(1, 2, 3)));
        assert_eq!(parse_version("1.2.3"), Some(Version::new(1, 2, 3)));
        assert_eq!(parse_version("nightly"), None);
    }

    #[test]
    fn test_sort_versions_is_semver_aware() {
        let mut versions = strings(&["1.10.0", "1.2.0", "nightly", "1.2.0", "0.9.0", "alpha"]);
        sort_versions(&mut versions);
        assert_eq!(versions, strings(&["alpha", "nightly", "0.9.0", "1.2.0", "1.10.0"]));
    }

    #[test]
    fn test_latest_prefers_stable() {
        assert_eq!(latest_version(&strings(&["1.0.0", "2.0.0-beta.1"])), Some("1.0.0"));
        assert_eq!(latest_version(&strings(&["2.0.0-beta.1", "2.0.0-beta.2"])), Some("2.0.0-beta.2"));
        assert_eq!(latest_version(&strings(&["snapshot-a", "snapshot-b"])), Some("snapshot-b"));
        assert_eq!(latest_version(&[]), None);
    }
}
