//! Hand the missing report's magnet links to a torrent client.

use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::report;
use crate::torrent_client::{AddSummary, AddTorrentOptions, TorrentClient};

use super::OpError;

#[derive(Debug, Default)]
pub struct DownloadOutcome {
    /// Magnet links read from the report.
    pub magnets: usize,
    pub summary: AddSummary,
}

pub async fn run_download(
    client: &dyn TorrentClient,
    missing_csv: &Path,
    options: &AddTorrentOptions,
    cancel: &CancellationToken,
) -> Result<DownloadOutcome, OpError> {
    let magnets = report::read_missing_magnets(missing_csv)?;
    if magnets.is_empty() {
        warn!(path = %missing_csv.display(), "No magnet links in missing report");
        return Ok(DownloadOutcome::default());
    }
    info!(magnets = magnets.len(), client = client.name(), "Adding torrents");

    client.connect().await?;
    let summary = client.add_torrents(&magnets, options, cancel).await?;

    Ok(DownloadOutcome {
        magnets: magnets.len(),
        summary,
    })
}
