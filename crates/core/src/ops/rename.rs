//! Rename catalogued files to their canonical index titles.
//!
//! Split into a planning step and an execution step so the caller can show
//! the plan and ask for confirmation in between.

use std::collections::HashMap;
use std::fs;

use tracing::{info, warn};

use crate::index::EpisodeIndex;
use crate::library::LibraryStore;
use crate::reconcile::{self, RenameAction};

use super::OpError;

#[derive(Debug, Default)]
pub struct RenameOutcome {
    pub renamed: usize,
    /// Renames refused because the target already exists.
    pub skipped_existing: usize,
    pub failed: usize,
}

/// Build the rename plan from the library entries and the index titles.
pub fn plan_rename(
    library: &dyn LibraryStore,
    index: &dyn EpisodeIndex,
) -> Result<Vec<RenameAction>, OpError> {
    let entries = library.entries()?;
    let titles: HashMap<String, String> = index
        .load_all(None)?
        .into_iter()
        .map(|r| (reconcile::normalize_checksum(&r.crc32), r.title))
        .collect();
    Ok(reconcile::build_rename_plan(&entries, &titles))
}

/// Execute a confirmed plan. Existing targets are never overwritten, and
/// the cache path key is updated right after each successful rename.
pub fn execute_rename_plan(
    library: &dyn LibraryStore,
    plan: &[RenameAction],
) -> Result<RenameOutcome, OpError> {
    let mut outcome = RenameOutcome::default();

    for action in plan {
        if action.to.exists() {
            warn!(
                from = %action.from.display(),
                to = %action.to.display(),
                "Target already exists, not renaming"
            );
            outcome.skipped_existing += 1;
            continue;
        }
        match fs::rename(&action.from, &action.to) {
            Ok(()) => {
                library.update_path(&action.from, &action.to)?;
                info!(from = %action.from.display(), to = %action.to.display(), "Renamed");
                outcome.renamed += 1;
            }
            Err(e) => {
                warn!(from = %action.from.display(), error = %e, "Rename failed");
                outcome.failed += 1;
            }
        }
    }

    Ok(outcome)
}
