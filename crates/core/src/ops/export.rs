//! Library export.

use std::path::Path;

use tracing::info;

use crate::library::LibraryStore;
use crate::report;

use super::{meta, now_rfc3339, OpError};

#[derive(Debug, Default)]
pub struct ExportOutcome {
    pub rows: usize,
}

pub fn run_export(library: &dyn LibraryStore, path: &Path) -> Result<ExportOutcome, OpError> {
    let entries = library.entries()?;
    report::write_library_export(path, &entries)?;
    library.metadata_set(meta::LAST_DB_EXPORT, &now_rfc3339())?;

    info!(rows = entries.len(), path = %path.display(), "Library exported");
    Ok(ExportOutcome {
        rows: entries.len(),
    })
}
