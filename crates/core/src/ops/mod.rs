//! High-level operations. Each one composes the stores, the fetcher, and
//! optionally a torrent client, and reports what it did in an outcome
//! struct.

mod download;
mod export;
mod refresh;
mod rename;
mod report;

pub use download::{run_download, DownloadOutcome};
pub use export::{run_export, ExportOutcome};
pub use refresh::{run_refresh, RefreshOptions, RefreshOutcome};
pub use rename::{execute_rename_plan, plan_rename, RenameOutcome};
pub use report::{run_report, ReportOutcome};

use thiserror::Error;

use crate::fetcher::FetchError;
use crate::index::IndexError;
use crate::library::LibraryError;
use crate::report::ReportError;
use crate::torrent_client::TorrentClientError;

/// Run metadata keys shared across operations.
pub mod meta {
    pub const LAST_RUN: &str = "last_run";
    pub const LAST_MISSING_EXPORT: &str = "last_missing_export";
    pub const LAST_DB_EXPORT: &str = "last_db_export";
    pub const LAST_FOLDER: &str = "last_folder";
    pub const LAST_CHECKED_PAGE: &str = "last_checked_page";
    pub const INDEX_LAST_UPDATE: &str = "episodes_db_last_update";
}

#[derive(Debug, Error)]
pub enum OpError {
    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Client(#[from] TorrentClientError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
