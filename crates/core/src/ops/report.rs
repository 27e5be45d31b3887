//! The main operation: find episodes published remotely that the local
//! library does not hold, and write the missing-episode report.

use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;
use crate::fetcher::{ListingFetcher, PageFetcher};
use crate::index::EpisodeRecord;
use crate::library::{self, LibraryStore};
use crate::reconcile;
use crate::report;

use super::{meta, now_rfc3339, OpError};

#[derive(Debug, Default)]
pub struct ReportOutcome {
    /// Episodes discovered remotely.
    pub remote_total: usize,
    /// Distinct checksums present locally.
    pub local_total: usize,
    /// Rows in the written report.
    pub missing: usize,
    /// Missing episodes not present in the previous report.
    pub new_since_last_export: usize,
    /// Missing episodes written with a placeholder title.
    pub integrity_errors: u64,
    /// Whether any phase stopped early on cancellation.
    pub interrupted: bool,
}

/// Turn a missing episode into a report row, substituting a placeholder
/// title when the mapping back to a title was lost. Losing the mapping is a
/// bug or data corruption, so it is loud.
fn report_row(ep: &EpisodeRecord, integrity_errors: &mut u64) -> EpisodeRecord {
    if !ep.title.trim().is_empty() {
        return ep.clone();
    }
    error!(crc32 = %ep.crc32, "Missing episode has no title mapping");
    *integrity_errors += 1;
    EpisodeRecord {
        title: format!("(Unknown Title) [{}]", ep.crc32),
        ..ep.clone()
    }
}

pub async fn run_report(
    library: &dyn LibraryStore,
    fetcher: &dyn PageFetcher,
    config: &Config,
    folder: &Path,
    cancel: &CancellationToken,
) -> Result<ReportOutcome, OpError> {
    if let Some(last_run) = library.metadata_get(meta::LAST_RUN)? {
        info!(last_run = %last_run, "Previous run");
    }
    if let Some(last_export) = library.metadata_get(meta::LAST_MISSING_EXPORT)? {
        info!(last_export = %last_export, "Previous missing report");
    }

    let (total_files, recorded) =
        library::count_video_files(library, folder, &config.library.extensions)?;
    info!(total_files, recorded, folder = %folder.display(), "Local video files");

    library.metadata_set(meta::LAST_RUN, &now_rfc3339())?;
    library.metadata_set(meta::LAST_FOLDER, &folder.to_string_lossy())?;

    let listing = ListingFetcher::new(fetcher, &config.listing);
    let catalog = listing.fetch_catalog(cancel).await?;
    let scan = library::scan_folder(library, folder, &config.library.extensions, cancel)?;

    let mut outcome = ReportOutcome {
        remote_total: catalog.episodes.len(),
        local_total: scan.checksums.len(),
        interrupted: catalog.interrupted || scan.interrupted,
        ..Default::default()
    };

    let mut missing = reconcile::compute_missing(&catalog.episodes, &scan.checksums);
    if config.report.require_magnet {
        let before = missing.len();
        missing.retain(|ep| ep.magnet_link.is_some());
        let dropped = before - missing.len();
        if dropped > 0 {
            info!(dropped, "Skipping missing entries without a magnet link");
        }
    }

    let rows: Vec<EpisodeRecord> = missing
        .iter()
        .map(|ep| report_row(ep, &mut outcome.integrity_errors))
        .collect();

    // Surface what changed since the previous report before overwriting it.
    let previous = report::read_missing_checksums(&config.report.missing_csv)?;
    for row in rows.iter().filter(|r| !previous.contains(&r.crc32)) {
        info!(title = %row.title, "Newly missing episode");
        outcome.new_since_last_export += 1;
    }

    outcome.missing = report::write_missing_report(&config.report.missing_csv, &rows)?;
    if !rows.is_empty() && outcome.missing == 0 {
        error!("Missing episodes found but none written to the report");
    }

    library.metadata_set(meta::LAST_CHECKED_PAGE, &catalog.pages_fetched.to_string())?;
    library.metadata_set(meta::LAST_MISSING_EXPORT, &now_rfc3339())?;

    info!(
        missing = outcome.missing,
        remote = outcome.remote_total,
        local = outcome.local_total,
        integrity_errors = outcome.integrity_errors,
        "Missing report written"
    );
    Ok(outcome)
}
