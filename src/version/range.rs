//! Third-party package range algebra.
//!
//! Components declare npm-style version ranges for the packages they need. When several
//! components ask for the same package, their ranges are merged by intersecting the sets
//! of versions they allow:
//!
//! - `^1.2.0` + `^1.3.0` → `^1.3.0` (the intersection *is* the second range, so its text is kept)
//! - `^1.2.0` + `<1.5.0` → `>=1.2.0, <1.5.0` (a new range, rendered from the intersection)
//! - `^1.0.0` + `^2.0.0` → no version satisfies both: the merge fails
//!
//! Every range is modelled as one interval over semver versions. Forms that cannot be
//! expressed that way (`||` unions, git URLs, dist-tags, `workspace:` protocols) are kept as
//! opaque text and only merge with an identical spec or a wildcard.
//!
//! Pre-release precedence is not modelled: `<2.0.0` is treated as excluding every `2.0.0-*`.

use semver::{Prerelease, Version};
use std::cmp::Ordering;
use std::fmt;

/// A lower or upper interval bound.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Bound {
    version: Version,
    inclusive: bool,
}

impl Bound {
    fn inclusive(version: Version) -> Self {
        Self {
            version,
            inclusive: true,
        }
    }

    fn exclusive(version: Version) -> Self {
        Self {
            version,
            inclusive: false,
        }
    }
}

/// Half-open (or closed) interval of versions. `None` bounds are unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct Interval {
    lower: Option<Bound>,
    upper: Option<Bound>,
}

impl Interval {
    fn intersect(&self, other: &Self) -> Self {
        let lower = match (&self.lower, &other.lower) {
            (None, b) | (b, None) => b.clone(),
            (Some(a), Some(b)) => Some(match a.version.cmp(&b.version) {
                Ordering::Greater => a.clone(),
                Ordering::Less => b.clone(),
                Ordering::Equal => Bound {
                    version: a.version.clone(),
                    inclusive: a.inclusive && b.inclusive,
                },
            }),
        };
        let upper = match (&self.upper, &other.upper) {
            (None, b) | (b, None) => b.clone(),
            (Some(a), Some(b)) => Some(match a.version.cmp(&b.version) {
                Ordering::Less => a.clone(),
                Ordering::Greater => b.clone(),
                Ordering::Equal => Bound {
                    version: a.version.clone(),
                    inclusive: a.inclusive && b.inclusive,
                },
            }),
        };
        Self {
            lower,
            upper,
        }
    }

    fn is_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Some(lo), Some(hi)) => match lo.version.cmp(&hi.version) {
                Ordering::Greater => true,
                Ordering::Equal => !(lo.inclusive && hi.inclusive),
                Ordering::Less => false,
            },
            _ => false,
        }
    }

    fn is_unbounded(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }

    fn contains(&self, version: &Version) -> bool {
        let above = self.lower.as_ref().is_none_or(|lo| {
            if lo.inclusive { version >= &lo.version } else { version > &lo.version }
        });
        let below = self.upper.as_ref().is_none_or(|hi| {
            if hi.inclusive { version <= &hi.version } else { version < &hi.version }
        });
        above && below
    }

    fn render(&self) -> String {
        match (&self.lower, &self.upper) {
            (None, None) => "*".to_string(),
            (Some(lo), Some(hi)) if lo.version == hi.version && lo.inclusive && hi.inclusive => {
                lo.version.to_string()
            }
            (lower, upper) => {
                let mut parts = Vec::new();
                if let Some(lo) = lower {
                    parts.push(format!("{}{}", if lo.inclusive { ">=" } else { ">" }, lo.version));
                }
                if let Some(hi) = upper {
                    parts.push(format!("{}{}", if hi.inclusive { "<=" } else { "<" }, hi.version));
                }
                parts.join(", ")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum RangeKind {
    Interval(Interval),
    Opaque,
}

/// A package version range as declared by a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRange {
    raw: String,
    kind: RangeKind,
}

impl PackageRange {
    /// Parse a range. Never fails: anything that is not an interval becomes opaque.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim().to_string();
        let kind = parse_interval(&raw).map_or(RangeKind::Opaque, RangeKind::Interval);
        Self {
            raw,
            kind,
        }
    }

    /// The range as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the range accepts any version (`*`, `latest`, empty).
    #[must_use]
    pub fn is_any(&self) -> bool {
        matches!(&self.kind, RangeKind::Interval(i) if i.is_unbounded())
    }

    /// Whether `version` satisfies the range. Opaque ranges satisfy nothing.
    #[must_use]
    pub fn allows(&self, version: &Version) -> bool {
        match &self.kind {
            RangeKind::Interval(interval) => interval.contains(version),
            RangeKind::Opaque => false,
        }
    }

    /// Combine two ranges into one that allows exactly the versions both allow.
    ///
    /// Returns `None` when the ranges are provably disjoint. When the intersection is one
    /// of the inputs, that input's text is kept, preferring `self` on ties, so merging is
    /// deterministic for a given order of inputs.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Option<Self> {
        match (&self.kind, &other.kind) {
            (RangeKind::Interval(a), RangeKind::Interval(b)) => {
                let intersection = a.intersect(b);
                if intersection.is_empty() {
                    None
                } else if &intersection == a {
                    Some(self.clone())
                } else if &intersection == b {
                    Some(other.clone())
                } else {
                    Some(Self {
                        raw: intersection.render(),
                        kind: RangeKind::Interval(intersection),
                    })
                }
            }
            (RangeKind::Opaque, RangeKind::Opaque) => (self.raw == other.raw).then(|| self.clone()),
            (RangeKind::Opaque, _) if other.is_any() => Some(self.clone()),
            (_, RangeKind::Opaque) if self.is_any() => Some(other.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for PackageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A possibly partial version: `1`, `1.2`, `1.2.3`, `1.x`, `1.2.*`.
struct Partial {
    major: u64,
    minor: Option<u64>,
    patch: Option<u64>,
    pre: Prerelease,
}

impl Partial {
    fn floor(&self) -> Version {
        let mut v = Version::new(self.major, self.minor.unwrap_or(0), self.patch.unwrap_or(0));
        v.pre = self.pre.clone();
        v
    }

    fn is_full(&self) -> bool {
        self.patch.is_some()
    }

    /// First version above everything the partial names: `1.2` → `1.3.0`, `1` → `2.0.0`.
    ///
    /// `None` when that version is not representable (a component at `u64::MAX`).
    fn next_after(&self) -> Option<Version> {
        Some(match (self.minor, self.patch) {
            (None, _) => Version::new(self.major.checked_add(1)?, 0, 0),
            (Some(minor), None) => Version::new(self.major, minor.checked_add(1)?, 0),
            (Some(minor), Some(patch)) => Version::new(self.major, minor, patch.checked_add(1)?),
        })
    }
}

/// Exclusive upper bound at `version`, or no bound at all when the version overflowed.
fn below(version: Option<Version>) -> Option<Bound> {
    version.map(Bound::exclusive)
}

fn parse_partial(text: &str) -> Option<Partial> {
    let text = text.trim();
    let text = text.strip_prefix(['v', 'V']).unwrap_or(text);
    let (core, pre) = match text.split_once('-') {
        Some((core, pre)) => (core, Prerelease::new(pre).ok()?),
        None => (text, Prerelease::EMPTY),
    };
    let core = core.split('+').next().unwrap_or(core);

    let mut numbers = Vec::new();
    for part in core.split('.') {
        if matches!(part, "x" | "X" | "*") {
            break;
        }
        numbers.push(part.parse::<u64>().ok()?);
    }
    let partial = Partial {
        major: *numbers.first()?,
        minor: numbers.get(1).copied(),
        patch: numbers.get(2).copied(),
        pre,
    };
    if numbers.len() > 3 || (!partial.pre.is_empty() && !partial.is_full()) {
        return None;
    }
    Some(partial)
}

fn comparator_interval(op: &str, partial: &Partial) -> Option<Interval> {
    let floor = partial.floor();
    let interval = match op {
        "" | "=" => {
            if partial.is_full() {
                Interval {
                    lower: Some(Bound::inclusive(floor.clone())),
                    upper: Some(Bound::inclusive(floor)),
                }
            } else {
                Interval {
                    lower: Some(Bound::inclusive(floor)),
                    upper: below(partial.next_after()),
                }
            }
        }
        "^" => {
            let upper = match (partial.major, partial.minor, partial.patch) {
                (0, Some(0), Some(patch)) => patch.checked_add(1).map(|p| Version::new(0, 0, p)),
                (0, Some(minor), _) if minor > 0 || partial.patch.is_none() => {
                    minor.checked_add(1).map(|m| Version::new(0, m, 0))
                }
                (0, None, _) => Some(Version::new(1, 0, 0)),
                (major, _, _) => major.checked_add(1).map(|m| Version::new(m, 0, 0)),
            };
            Interval {
                lower: Some(Bound::inclusive(floor)),
                upper: below(upper),
            }
        }
        "~" => {
            let upper = match partial.minor {
                Some(minor) => minor.checked_add(1).map(|m| Version::new(partial.major, m, 0)),
                None => partial.major.checked_add(1).map(|m| Version::new(m, 0, 0)),
            };
            Interval {
                lower: Some(Bound::inclusive(floor)),
                upper: below(upper),
            }
        }
        ">" => Interval {
            lower: Some(if partial.is_full() {
                Bound::exclusive(floor)
            } else {
                // nothing sorts above `u64::MAX.x`, so keep the interval empty
                partial.next_after().map_or_else(
                    || Bound::exclusive(Version::new(u64::MAX, u64::MAX, u64::MAX)),
                    Bound::inclusive,
                )
            }),
            upper: None,
        },
        ">=" => Interval {
            lower: Some(Bound::inclusive(floor)),
            upper: None,
        },
        "<" => Interval {
            lower: None,
            upper: Some(Bound::exclusive(floor)),
        },
        "<=" => Interval {
            lower: None,
            upper: if partial.is_full() {
                Some(Bound::inclusive(floor))
            } else {
                below(partial.next_after())
            },
        },
        _ => return None,
    };
    Some(interval)
}

fn split_operator(token: &str) -> (&str, &str) {
    for op in [">=", "<=", ">", "<", "=", "^", "~"] {
        if let Some(rest) = token.strip_prefix(op) {
            // `~>` is a common alias for `~`
            return (op, rest.strip_prefix('>').filter(|_| op == "~").unwrap_or(rest));
        }
    }
    ("", token)
}

fn parse_interval(raw: &str) -> Option<Interval> {
    if raw.is_empty() || matches!(raw, "*" | "x" | "X" | "latest") {
        return Some(Interval::default());
    }
    if raw.contains("||") || raw.contains(':') || raw.contains('/') {
        return None;
    }

    if let Some((from, to)) = raw.split_once(" - ") {
        let lower = comparator_interval(">=", &parse_partial(from)?)?;
        let upper = comparator_interval("<=", &parse_partial(to)?)?;
        return Some(lower.intersect(&upper));
    }

    // Tokenize on commas and whitespace, re-attaching operators written apart from
    // their version (`>= 1.2.0`).
    let mut comparators = Vec::new();
    let mut pending_op: Option<&str> = None;
    for token in raw.split([',', ' ', '\t']).filter(|t| !t.is_empty()) {
        let (op, version) = split_operator(token);
        if version.is_empty() {
            if pending_op.is_some() {
                return None;
            }
            pending_op = Some(op);
            continue;
        }
        let op = match pending_op.take() {
            Some(pending) if op.is_empty() => pending,
            Some(_) => return None,
            None => op,
        };
        comparators.push((op, version));
    }
    if pending_op.is_some() || comparators.is_empty() {
        return None;
    }

    let mut interval = Interval::default();
    for (op, version) in comparators {
        let partial = if matches!(version, "*" | "x" | "X") {
            // `>=*` and friends accept anything
            continue;
        } else {
            parse_partial(version)?
        };
        interval = interval.intersect(&comparator_interval(op, &partial)?);
    }
    Some(interval)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merge(a: &str, b: &str) -> Option<String> {
        PackageRange::parse(a).merge(&PackageRange::parse(b)).map(|r| r.as_str().to_string())
    }

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_caret_ranges_merge_to_tighter_input() {
        assert_eq!(merge("^1.2.0", "^1.3.0").as_deref(), Some("^1.3.0"));
        assert_eq!(merge("^1.3.0", "^1.2.0").as_deref(), Some("^1.3.0"));
    }

    #[test]
    fn test_disjoint_ranges_do_not_merge() {
        assert_eq!(merge("^1.0.0", "^2.0.0"), None);
        assert_eq!(merge("~1.2.0", "1.3.0"), None);
        assert_eq!(merge("<1.0.0", ">=1.0.0"), None);
        assert_eq!(merge("0.2.3", "0.2.4"), None);
    }

    #[test]
    fn test_partial_overlap_renders_intersection() {
        assert_eq!(merge("^1.2.0", "<1.5.0").as_deref(), Some(">=1.2.0, <1.5.0"));
        assert_eq!(merge(">= 1.0.0", "<=1.4.2").as_deref(), Some(">=1.0.0, <=1.4.2"));
    }

    #[test]
    fn test_wildcards_merge_with_anything() {
        assert_eq!(merge("*", "^3.1.0").as_deref(), Some("^3.1.0"));
        assert_eq!(merge("latest", "github:acme/lib").as_deref(), Some("github:acme/lib"));
        assert_eq!(merge("1.x", "^1.4.0").as_deref(), Some("^1.4.0"));
    }

    #[test]
    fn test_identical_ranges_keep_first_text() {
        assert_eq!(merge("^1.2.0", ">=1.2.0 <2.0.0").as_deref(), Some("^1.2.0"));
        assert_eq!(merge("next", "next").as_deref(), Some("next"));
        assert_eq!(merge("next", "beta"), None);
        assert_eq!(merge("next", "^1.0.0"), None);
    }

    #[test]
    fn test_caret_zero_major_semantics() {
        let range = PackageRange::parse("^0.2.3");
        assert!(range.allows(&v("0.2.9")));
        assert!(!range.allows(&v("0.3.0")));

        let range = PackageRange::parse("^0.0.3");
        assert!(range.allows(&v("0.0.3")));
        assert!(!range.allows(&v("0.0.4")));
    }

    #[test]
    fn test_tilde_and_partial_forms() {
        let range = PackageRange::parse("~1.2");
        assert!(range.allows(&v("1.2.7")));
        assert!(!range.allows(&v("1.3.0")));

        let range = PackageRange::parse("1.2.x");
        assert!(range.allows(&v("1.2.0")));
        assert!(!range.allows(&v("1.3.0")));

        let range = PackageRange::parse("1.0.0 - 2.0.0");
        assert!(range.allows(&v("2.0.0")));
        assert!(!range.allows(&v("2.0.1")));
    }

    #[test]
    fn test_bounds_at_u64_max_do_not_overflow() {
        let max = u64::MAX;
        let range = PackageRange::parse(&format!("^{max}.0.0"));
        assert!(range.allows(&Version::new(max, 3, 0)));
        assert!(!range.allows(&v("1.0.0")));

        let range = PackageRange::parse(&format!("~1.{max}"));
        assert!(range.allows(&Version::new(1, max, 7)));

        let range = PackageRange::parse(&format!("<={max}"));
        assert!(range.allows(&Version::new(max, max, max)));

        let range = PackageRange::parse(&format!("^0.0.{max}"));
        assert!(range.allows(&Version::new(0, 0, max)));

        assert_eq!(merge(&format!("^{max}.0.0"), "^1.0.0"), None);
    }

    #[test]
    fn test_unions_are_opaque() {
        let range = PackageRange::parse("^1.0.0 || ^2.0.0");
        assert!(!range.is_any());
        assert!(!range.allows(&v("1.0.0")));
    }
}
