//! Episode index refresh with a cooldown gate.

use chrono::{DateTime, Duration, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::fetcher::{ListingFetcher, PageFetcher};
use crate::index::EpisodeIndex;

use super::{meta, now_rfc3339, OpError};

#[derive(Debug, Clone, Default)]
pub struct RefreshOptions {
    /// Refresh even inside the cooldown window.
    pub force: bool,
    /// Resolve magnet links for indexed episodes that lack one.
    pub backfill_magnets: bool,
}

#[derive(Debug, Default)]
pub struct RefreshOutcome {
    /// The cooldown window suppressed the refresh.
    pub skipped_cooldown: bool,
    /// Rows upserted into the index.
    pub indexed: usize,
    /// Magnet links resolved through search.
    pub magnets_backfilled: usize,
    /// Whether the traversal stopped early on cancellation.
    pub interrupted: bool,
}

/// Whether the stored refresh timestamp is recent enough to skip a refresh.
fn within_cooldown(last_update: &str, cooldown_secs: u64) -> bool {
    DateTime::parse_from_rfc3339(last_update)
        .map(|t| Utc::now() - t.with_timezone(&Utc) < Duration::seconds(cooldown_secs as i64))
        .unwrap_or(false)
}

pub async fn run_refresh(
    index: &dyn EpisodeIndex,
    fetcher: &dyn PageFetcher,
    config: &Config,
    options: &RefreshOptions,
    cancel: &CancellationToken,
) -> Result<RefreshOutcome, OpError> {
    let mut outcome = RefreshOutcome::default();

    if !options.force {
        if let Some(last_update) = index.metadata_get(meta::INDEX_LAST_UPDATE)? {
            if within_cooldown(&last_update, config.index.refresh_cooldown_secs) {
                info!(last_update = %last_update, "Index refreshed recently, skipping");
                outcome.skipped_cooldown = true;
                return Ok(outcome);
            }
        }
    }

    let listing = ListingFetcher::new(fetcher, &config.listing);
    let catalog = listing.fetch_catalog(cancel).await?;
    outcome.interrupted = catalog.interrupted;

    outcome.indexed = index.upsert(&catalog.episodes)?;
    info!(indexed = outcome.indexed, "Episode index updated");

    if options.backfill_magnets {
        for record in index.load_all(None)? {
            if cancel.is_cancelled() {
                outcome.interrupted = true;
                break;
            }
            if record.magnet_link.is_some() {
                continue;
            }
            match listing.search_magnet(&record.crc32).await {
                Ok(Some(magnet)) => {
                    index.set_magnet(&record.crc32, &magnet)?;
                    outcome.magnets_backfilled += 1;
                }
                Ok(None) => debug!(crc32 = %record.crc32, "No magnet found"),
                Err(e) => warn!(crc32 = %record.crc32, error = %e, "Magnet search failed"),
            }
        }
    }

    // A partial traversal must not suppress the next refresh.
    if !outcome.interrupted {
        index.metadata_set(meta::INDEX_LAST_UPDATE, &now_rfc3339())?;
    }
    Ok(outcome)
}
