//! Firmware version parsing and comparison.
//!
//! Versions come from `git describe` and have one of two shapes:
//!   - Release (tagged exactly): `v1.2.56`
//!   - Dev build: `v1.2.56-12-abcd563` (tag-distance-hash)
//!
//! This is deliberately not a general semver parser. The grammar is the
//! one the release pipeline produces and nothing more.

use crate::error::{CompareError, ParseError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric fields longer than this are rejected as garbage.
const MAX_NUMERIC_SEGMENT: usize = 16;

/// A successfully parsed firmware version.
///
/// Immutable once produced; only [`parse`] creates one. `distance` and
/// `hash` are present together (dev build) or absent together (release).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub distance: Option<u32>,
    pub hash: Option<String>,
}

impl ParsedVersion {
    /// True for a `tag-distance-hash` build, false for a tagged release.
    pub fn is_dev_build(&self) -> bool {
        self.distance.is_some()
    }

    /// Ordering key. `None` sorts below `Some(_)`, so a release orders
    /// before any dev build on the same tag.
    fn key(&self) -> (u32, u32, u32, Option<u32>) {
        (self.major, self.minor, self.patch, self.distance)
    }
}

impl fmt::Display for ParsedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)?;
        if let (Some(distance), Some(hash)) = (self.distance, self.hash.as_deref()) {
            write!(f, "-{}-{}", distance, hash)?;
        }
        Ok(())
    }
}

/// Outcome of comparing a target version against the running one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonResult {
    /// Target is a later version than current: update.
    Newer,
    /// Target is an earlier version than current.
    Older,
    /// Same version, same build.
    EqualIdentical,
    /// Same major.minor.patch(.distance) but a different commit hash.
    /// A different build that is not ordered relative to ours; not an
    /// upgrade, but observably distinct from true equality.
    EqualDivergentHash,
}

impl ComparisonResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonResult::Newer => "newer",
            ComparisonResult::Older => "older",
            ComparisonResult::EqualIdentical => "identical",
            ComparisonResult::EqualDivergentHash => "divergent build",
        }
    }
}

/// Parse one numeric field. Rejects empty, over-long and non-digit
/// segments; values that overflow u32 are rejected the same way.
fn numeric_segment(s: &str) -> Option<u32> {
    if s.is_empty() || s.len() > MAX_NUMERIC_SEGMENT {
        return None;
    }
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Parse a version string against the strict grammar
/// `v<major>.<minor>.<patch>[-<distance>-<hash>]`.
///
/// `v0.0.0` is rejected even though each field parses: a descriptor
/// that decomposes to all zeroes is garbage input in this scheme.
pub fn parse(text: &str) -> Result<ParsedVersion, ParseError> {
    let rest = text.strip_prefix('v').ok_or(ParseError::MissingPrefix)?;

    let (major_s, rest) = rest.split_once('.').ok_or(ParseError::MalformedMajor)?;
    let major = numeric_segment(major_s).ok_or(ParseError::MalformedMajor)?;

    let (minor_s, rest) = rest.split_once('.').ok_or(ParseError::MalformedMinor)?;
    let minor = numeric_segment(minor_s).ok_or(ParseError::MalformedMinor)?;

    let (patch, distance, hash) = match rest.split_once('-') {
        // No hyphen: the whole remainder is the patch of a release build.
        None => {
            let patch = numeric_segment(rest).ok_or(ParseError::MalformedPatch)?;
            (patch, None, None)
        }
        // Hyphen: dev build, `<patch>-<distance>-<hash>`.
        Some((patch_s, dev_rest)) => {
            let patch = numeric_segment(patch_s).ok_or(ParseError::MalformedPatch)?;
            let (distance_s, hash_s) = dev_rest
                .split_once('-')
                .ok_or(ParseError::MalformedDistance)?;
            let distance =
                numeric_segment(distance_s).ok_or(ParseError::MalformedDistance)?;
            // Hash is taken verbatim: no delimiter, no length cap.
            (patch, Some(distance), Some(hash_s.to_string()))
        }
    };

    if major == 0 && minor == 0 && patch == 0 {
        return Err(ParseError::DegenerateZeroVersion);
    }

    Ok(ParsedVersion {
        major,
        minor,
        patch,
        distance,
        hash,
    })
}

/// Compare two version strings, target against current.
///
/// Ordering is lexicographic over `(major, minor, patch, distance)`,
/// most-significant field first. When all four are equal the commit
/// hash decides identical vs divergent. Either side failing to parse
/// surfaces as a [`CompareError`]; invalid versions are never ordered.
pub fn compare(current: &str, target: &str) -> Result<ComparisonResult, CompareError> {
    let current = parse(current).map_err(CompareError::InvalidCurrent)?;
    let target = parse(target).map_err(CompareError::InvalidTarget)?;
    Ok(compare_parsed(&current, &target))
}

/// Compare two already-parsed versions, target against current.
pub fn compare_parsed(current: &ParsedVersion, target: &ParsedVersion) -> ComparisonResult {
    use std::cmp::Ordering;

    match target.key().cmp(&current.key()) {
        Ordering::Greater => ComparisonResult::Newer,
        Ordering::Less => ComparisonResult::Older,
        Ordering::Equal => {
            if target.hash == current.hash {
                ComparisonResult::EqualIdentical
            } else {
                ComparisonResult::EqualDivergentHash
            }
        }
    }
}
