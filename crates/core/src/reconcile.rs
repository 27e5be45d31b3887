//! Reconciliation between the remote catalog and the local library, and the
//! rename plan derived from index titles.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex_lite::Regex;

use crate::index::EpisodeRecord;
use crate::library::LibraryEntry;

/// Characters that cannot appear in a filename on common filesystems.
static FORBIDDEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\/*?:"<>|]"#).expect("filename regex"));

/// Canonical checksum spelling used for comparisons.
pub fn normalize_checksum(crc32: &str) -> String {
    crc32.trim().to_uppercase()
}

/// Episodes present remotely but absent locally, in remote catalog order.
pub fn compute_missing(
    remote: &[EpisodeRecord],
    local: &HashSet<String>,
) -> Vec<EpisodeRecord> {
    let local: HashSet<String> = local.iter().map(|c| normalize_checksum(c)).collect();
    remote
        .iter()
        .filter(|ep| !local.contains(&normalize_checksum(&ep.crc32)))
        .cloned()
        .collect()
}

/// Strip characters a filename cannot carry.
pub fn sanitize_title(title: &str) -> String {
    FORBIDDEN_RE.replace_all(title, "").trim().to_string()
}

/// One planned rename. Nothing is touched on disk until the plan is executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameAction {
    pub from: PathBuf,
    pub to: PathBuf,
    pub crc32: String,
}

/// Build the rename plan for catalogued files whose checksum resolves to an
/// indexed title. Files already carrying the canonical name are left out.
pub fn build_rename_plan(
    entries: &[LibraryEntry],
    titles: &HashMap<String, String>,
) -> Vec<RenameAction> {
    let mut plan = Vec::new();
    for entry in entries {
        let crc32 = normalize_checksum(&entry.crc32);
        let Some(title) = titles.get(&crc32) else {
            continue;
        };
        let name = sanitize_title(title);
        if name.is_empty() {
            continue;
        }
        let to = match entry.path.parent() {
            Some(dir) => dir.join(&name),
            None => PathBuf::from(&name),
        };
        if to != entry.path {
            plan.push(RenameAction {
                from: entry.path.clone(),
                to,
                crc32,
            });
        }
    }
    plan
}
