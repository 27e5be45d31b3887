//! CSV outputs: the missing-episode report and the library export, plus the
//! readers that feed the download step.

use std::collections::HashSet;
use std::path::Path;

use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};
use thiserror::Error;

use crate::index::EpisodeRecord;
use crate::library::LibraryEntry;
use crate::release;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Write the missing-episode report, fully replacing any previous file.
/// Returns the number of rows written.
///
/// Every field is quoted so titles with commas survive spreadsheet round
/// trips.
pub fn write_missing_report(path: &Path, episodes: &[EpisodeRecord]) -> Result<usize, ReportError> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_path(path)?;

    writer.write_record(["Title", "Page Link", "Magnet Link"])?;
    for ep in episodes {
        writer.write_record([
            ep.title.as_str(),
            ep.page_link.as_str(),
            ep.magnet_link.as_deref().unwrap_or(""),
        ])?;
    }
    writer.flush()?;
    Ok(episodes.len())
}

/// Export the full library cache.
pub fn write_library_export(path: &Path, entries: &[LibraryEntry]) -> Result<(), ReportError> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_path(path)?;

    writer.write_record(["File Path", "CRC32"])?;
    for entry in entries {
        writer.write_record([entry.path.to_string_lossy().as_ref(), entry.crc32.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}

/// Checksums listed in a previous missing report, recovered from the titles.
///
/// A report that does not exist yet reads as empty.
pub fn read_missing_checksums(path: &Path) -> Result<HashSet<String>, ReportError> {
    if !path.exists() {
        return Ok(HashSet::new());
    }

    let mut reader = ReaderBuilder::new().from_path(path)?;
    let mut checksums = HashSet::new();
    for record in reader.records() {
        let record = record?;
        if let Some(title) = record.get(0) {
            if let Some(crc32) = release::authoritative_checksum(title) {
                checksums.insert(crc32);
            }
        }
    }
    Ok(checksums)
}

/// Magnet links listed in a missing report. Rows without a usable magnet are
/// skipped.
pub fn read_missing_magnets(path: &Path) -> Result<Vec<String>, ReportError> {
    let mut reader = ReaderBuilder::new().from_path(path)?;
    let headers = reader.headers()?.clone();
    let magnet_column = headers.iter().position(|h| h == "Magnet Link");

    let mut magnets = Vec::new();
    for record in reader.records() {
        let record = record?;
        let magnet = magnet_column
            .and_then(|i| record.get(i))
            .unwrap_or("")
            .trim();
        if magnet.starts_with("magnet:") {
            magnets.push(magnet.to_string());
        }
    }
    Ok(magnets)
}
