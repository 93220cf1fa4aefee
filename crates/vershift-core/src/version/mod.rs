//! Version comparison and change classification.
//!
//! Both functions accept arbitrary strings. When both sides are valid
//! semantic versions (an optional leading `v` is tolerated) semver rules
//! apply; otherwise they fall back to plain string ordering and a
//! dot-separated numeric comparison.

use std::cmp::Ordering;
use std::fmt;

use semver::Version;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// The kind of change between two versions.
///
/// The `Pre*` variants only come out of the semver path, when the newer
/// version carries a prerelease tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Major component changed (X.y.z).
    Major,
    /// Major changed and the newer version is a prerelease.
    Premajor,
    /// Minor component changed (x.Y.z).
    Minor,
    /// Minor changed and the newer version is a prerelease.
    Preminor,
    /// Patch component changed (x.y.Z).
    Patch,
    /// Patch changed and the newer version is a prerelease.
    Prepatch,
    /// Only the prerelease part changed, or nothing numeric increased.
    Prerelease,
    /// No kind could be determined.
    Unknown,
}

impl ChangeKind {
    /// Lowercase label, as emitted in the `type` output.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Premajor => "premajor",
            Self::Minor => "minor",
            Self::Preminor => "preminor",
            Self::Patch => "patch",
            Self::Prepatch => "prepatch",
            Self::Prerelease => "prerelease",
            Self::Unknown => "unknown",
        }
    }

    const fn with_pre(self, pre: bool) -> Self {
        match (self, pre) {
            (Self::Major, true) => Self::Premajor,
            (Self::Minor, true) => Self::Preminor,
            (Self::Patch, true) => Self::Prepatch,
            (kind, _) => kind,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a version string as semver, stripping an optional `v` prefix.
///
/// Returns `None` for anything that is not a full `major.minor.patch`
/// version.
pub fn parse_semver(s: &str) -> Option<Version> {
    let s = s.trim();
    let s = s.strip_prefix('v').unwrap_or(s);
    Version::parse(s).ok()
}

/// Order two version strings.
///
/// Semver precedence when both parse (build metadata is ignored), plain
/// string ordering otherwise.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (parse_semver(a), parse_semver(b)) {
        (Some(a), Some(b)) => a.cmp_precedence(&b),
        _ => a.cmp(b),
    }
}

/// Classify the change from `previous` to `current`.
///
/// Identical strings classify as [`ChangeKind::Unknown`]. Direction is not
/// considered: a downgrade is labelled by the component that differs, so
/// check [`compare_versions`] first when direction matters.
#[instrument]
pub fn classify_change(previous: &str, current: &str) -> ChangeKind {
    if previous == current {
        return ChangeKind::Unknown;
    }

    let kind = match (parse_semver(previous), parse_semver(current)) {
        (Some(prev), Some(curr)) => semver_diff(&prev, &curr).unwrap_or(ChangeKind::Unknown),
        _ => numeric_diff(previous, current),
    };
    debug!(%kind, "classified version change");
    kind
}

/// Which component differs between two semver versions.
///
/// Returns `None` when they have equal precedence.
pub fn semver_diff(a: &Version, b: &Version) -> Option<ChangeKind> {
    let (high, low) = match a.cmp_precedence(b) {
        Ordering::Equal => return None,
        Ordering::Greater => (a, b),
        Ordering::Less => (b, a),
    };
    let high_has_pre = !high.pre.is_empty();
    let low_has_pre = !low.pre.is_empty();

    // Leaving a prerelease for its release counts as the bump that
    // prerelease was heading towards.
    if low_has_pre && !high_has_pre {
        if low.patch == 0 && low.minor == 0 {
            return Some(ChangeKind::Major);
        }
        if (low.major, low.minor, low.patch) == (high.major, high.minor, high.patch) {
            if low.minor != 0 && low.patch == 0 {
                return Some(ChangeKind::Minor);
            }
            return Some(ChangeKind::Patch);
        }
    }

    let kind = if a.major != b.major {
        ChangeKind::Major
    } else if a.minor != b.minor {
        ChangeKind::Minor
    } else if a.patch != b.patch {
        ChangeKind::Patch
    } else {
        return Some(ChangeKind::Prerelease);
    };
    Some(kind.with_pre(high_has_pre))
}

/// Compare dot-separated numeric versions such as `1.2` or `2024.10`.
///
/// The first of the leading three segments where `current` is greater
/// decides the kind. Anything else is [`ChangeKind::Prerelease`].
fn numeric_diff(previous: &str, current: &str) -> ChangeKind {
    let prev: Vec<&str> = previous.split('.').collect();
    let curr: Vec<&str> = current.split('.').collect();

    for idx in 0..prev.len().max(curr.len()).min(3) {
        let p = segment_value(prev.get(idx).copied());
        let c = segment_value(curr.get(idx).copied());
        if let (Some(p), Some(c)) = (p, c)
            && c > p
        {
            return match idx {
                0 => ChangeKind::Major,
                1 => ChangeKind::Minor,
                _ => ChangeKind::Patch,
            };
        }
    }

    ChangeKind::Prerelease
}

/// Leading integer of a segment. Missing or empty segments count as zero;
/// a segment without leading digits has no value.
fn segment_value(segment: Option<&str>) -> Option<i128> {
    let segment = match segment {
        None | Some("") => return Some(0),
        Some(s) => s.trim_start(),
    };
    let (negative, digits) = match segment.as_bytes().first() {
        Some(b'-') => (true, &segment[1..]),
        Some(b'+') => (false, &segment[1..]),
        _ => (false, segment),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let value: i128 = digits[..end].parse().ok()?;
    Some(if negative { -value } else { value })
}
