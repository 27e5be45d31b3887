//! Release-title parsing: checksum extraction and quality filtering.
//!
//! Episode identity on the source site is a CRC32 checksum embedded in the
//! release title or filename as a bracketed 8-hex-digit token. These helpers
//! are pure and carry no I/O.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

/// Bracketed 8-hex-digit checksum token, e.g. `[1A2B3C4D]`.
static CHECKSUM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([0-9A-Fa-f]{8})\]").expect("checksum regex"));

/// Bracketed quality tier token, e.g. `[1080p]` or `[720P]`.
static QUALITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(\d+)[pP]\]").expect("quality regex"));

/// Extract every bracketed checksum token from `text`, in appearance order,
/// normalized to uppercase.
pub fn extract_checksums(text: &str) -> Vec<String> {
    CHECKSUM_RE
        .captures_iter(text)
        .map(|c| c[1].to_uppercase())
        .collect()
}

/// The authoritative checksum of a title: the last bracketed token.
///
/// Titles sometimes carry an unrelated hex-looking tag earlier in the string
/// (release-group tags), so the trailing one wins.
pub fn authoritative_checksum(text: &str) -> Option<String> {
    extract_checksums(text).pop()
}

/// Quality acceptance rule over bracketed `<digits>p` tokens.
///
/// A title is accepted when at least one of its quality tokens parses to an
/// accepted tier. Titles without any quality token are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityFilter {
    /// Accepted vertical resolutions, e.g. `[1080, 720]`.
    pub accepted_tiers: Vec<u32>,
}

impl Default for QualityFilter {
    fn default() -> Self {
        Self {
            accepted_tiers: vec![1080, 720],
        }
    }
}

impl QualityFilter {
    pub fn new(accepted_tiers: Vec<u32>) -> Self {
        Self { accepted_tiers }
    }

    /// Whether `title` carries an accepted quality tier.
    pub fn accepts(&self, title: &str) -> bool {
        QUALITY_RE
            .captures_iter(title)
            .filter_map(|c| c[1].parse::<u32>().ok())
            .any(|tier| self.accepted_tiers.contains(&tier))
    }
}

/// Whether a title belongs to the catalog at all (carries the project tag).
pub fn in_scope(title: &str, marker: &str) -> bool {
    title.contains(marker)
}
