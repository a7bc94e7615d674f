//! Opaque, externally-ordered version values.
//!
//! Versions are plain strings as far as this crate is concerned — the
//! only thing it asks of them is a [`VersionOrd`] able to compare two of
//! them. This mirrors the `ComposerVersion` split the teacher used
//! internally (parse once, cache, compare via a packed integer) but
//! drops everything Composer-specific: stability suffixes, branch
//! aliases, build metadata. Those belong to a front end, not the solver
//! core.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// An opaque version string.
///
/// `Version` never compares itself — two `Version`s are only ever
/// ordered through a [`VersionOrd`] passed in by the caller. Equality and
/// hashing *do* use the underlying string, since the encoder needs a
/// `Version` to behave as a plain, string-identity-keyed value even
/// before any ordering scheme is consulted.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct Version(Arc<str>);

/// `Arc<str>` has no blanket `serde` impl, so `Version` is (de)serialized
/// as a plain string by hand rather than via `#[derive]`.
#[cfg(feature = "serde")]
impl serde::Serialize for Version {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Version {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Version::new)
    }
}

impl Version {
    pub fn new(raw: impl Into<Arc<str>>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({:?})", self.0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Version {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Version {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

/// Supplies total order over [`Version`] values.
///
/// Implementations are not required to be consistent with `Ord` on the
/// underlying string — `1.2` and `1.2.0` may compare equal under a
/// dotted-numeric scheme despite differing as strings. `PackageName` and
/// `Version` equality (used for hashing in the universe's maps) is always
/// the plain string identity; `VersionOrd` is only consulted for
/// ordering and constraint satisfaction.
pub trait VersionOrd: Send + Sync {
    /// Compares two versions. Implementations should treat malformed
    /// input permissively — fall back to lexicographic comparison rather
    /// than panicking, since a universe may legitimately mix version
    /// schemes (e.g. a `dev-master`-style branch alias next to dotted
    /// releases).
    fn compare(&self, a: &Version, b: &Version) -> Ordering;

    fn equal(&self, a: &Version, b: &Version) -> bool {
        self.compare(a, b) == Ordering::Equal
    }
}

/// Dotted-numeric-then-lexicographic version ordering.
///
/// Splits on `.` and `-`; a segment that parses as `u64` is compared
/// numerically, otherwise as a string, and a numeric segment always
/// sorts above a non-numeric one at the same position (so `1.0` >
/// `1.0-beta`). This is the scheme the bundled test suite and examples
/// use; it is a generalization of the teacher's `PreReleaseId` ordering
/// (`Numeric` before `String`) stripped of Composer stability tiers.
#[derive(Debug, Default, Clone, Copy)]
pub struct DottedVersionOrd;

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Num(u64),
    Text(&'a str),
}

fn segments(raw: &str) -> Vec<Segment<'_>> {
    raw.split(['.', '-', '+'])
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<u64>() {
            Ok(n) => Segment::Num(n),
            Err(_) => Segment::Text(s),
        })
        .collect()
}

fn cmp_segment(a: &Segment<'_>, b: &Segment<'_>) -> Ordering {
    match (a, b) {
        (Segment::Num(x), Segment::Num(y)) => x.cmp(y),
        (Segment::Text(x), Segment::Text(y)) => x.cmp(y),
        // A numeric segment outranks a text segment at the same position,
        // so release versions sort above pre-release-looking suffixes.
        (Segment::Num(_), Segment::Text(_)) => Ordering::Greater,
        (Segment::Text(_), Segment::Num(_)) => Ordering::Less,
    }
}

impl VersionOrd for DottedVersionOrd {
    fn compare(&self, a: &Version, b: &Version) -> Ordering {
        if a.as_str() == b.as_str() {
            return Ordering::Equal;
        }
        let sa = segments(a.as_str());
        let sb = segments(b.as_str());
        for (x, y) in sa.iter().zip(sb.iter()) {
            match cmp_segment(x, y) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        // Fewer segments means either a shorter release (e.g. "1.2" vs
        // "1.2.3") which should sort lower, unless the extra segments
        // are trailing zeros.
        sa.len().cmp(&sb.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::new(s)
    }

    #[test]
    fn numeric_dotted_order() {
        let ord = DottedVersionOrd;
        assert_eq!(ord.compare(&v("1.2.3"), &v("1.2.4")), Ordering::Less);
        assert_eq!(ord.compare(&v("2.0.0"), &v("1.9.9")), Ordering::Greater);
        assert!(ord.equal(&v("1.0"), &v("1.0")));
    }

    #[test]
    fn release_outranks_prerelease_suffix() {
        let ord = DottedVersionOrd;
        assert_eq!(ord.compare(&v("1.0.0"), &v("1.0.0-beta")), Ordering::Greater);
    }

    #[test]
    fn shorter_is_lower_without_trailing_equal_segments() {
        let ord = DottedVersionOrd;
        assert_eq!(ord.compare(&v("1.2"), &v("1.2.1")), Ordering::Less);
    }
}
