//! Torrent client abstraction.
//!
//! This module provides a `TorrentClient` trait for handing magnet links to
//! a download backend (qBittorrent or Transmission).

mod qbittorrent;
mod transmission;

pub use qbittorrent::QBittorrentClient;
pub use transmission::TransmissionClient;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::{ClientBackend, ClientConfig};

/// Errors that can occur during torrent client operations.
#[derive(Debug, Error)]
pub enum TorrentClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,
}

/// Options applied to every torrent in an add batch.
#[derive(Debug, Clone, Default)]
pub struct AddTorrentOptions {
    /// Download folder override.
    pub download_folder: Option<String>,
    /// Tags to attach (qBittorrent only).
    pub tags: Vec<String>,
    /// Category to attach (qBittorrent only).
    pub category: Option<String>,
    /// Tally what would happen without touching the client.
    pub dry_run: bool,
}

/// Tally of one add batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AddSummary {
    /// Torrents newly handed to the client.
    pub added: usize,
    /// Torrents the client already knew about.
    pub already_present: usize,
    /// Magnet links that could not be parsed.
    pub invalid: usize,
    /// Torrents the client rejected.
    pub failed: usize,
    /// Whether the batch stopped early on cancellation.
    pub interrupted: bool,
}

/// BitTorrent v1 info hash as it appears in a magnet link.
static INFO_HASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"xt=urn:btih:([a-fA-F0-9]{40})").expect("info hash regex"));

/// Info hash embedded in a magnet link, lowercased.
pub fn magnet_info_hash(magnet: &str) -> Option<String> {
    INFO_HASH_RE
        .captures(magnet)
        .map(|c| c[1].to_lowercase())
}

/// Magnet prefix for log lines. Display names carry multi-byte characters,
/// so the cut must land on a char boundary.
pub(crate) fn truncate_magnet(magnet: &str) -> &str {
    let mut end = magnet.len().min(50);
    while !magnet.is_char_boundary(end) {
        end -= 1;
    }
    &magnet[..end]
}

/// Trait for torrent download backends.
#[async_trait]
pub trait TorrentClient: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Verify connectivity and credentials.
    async fn connect(&self) -> Result<(), TorrentClientError>;

    /// Hand a batch of magnet links to the client.
    ///
    /// Adding is idempotent per torrent: magnets the client already holds
    /// are counted as present, not re-added. Per-torrent failures are
    /// tallied rather than aborting the batch.
    async fn add_torrents(
        &self,
        magnets: &[String],
        options: &AddTorrentOptions,
        cancel: &CancellationToken,
    ) -> Result<AddSummary, TorrentClientError>;
}

/// Build the configured backend.
pub fn build_client(config: &ClientConfig) -> Box<dyn TorrentClient> {
    match config.backend {
        ClientBackend::QBittorrent => Box::new(QBittorrentClient::new(config.clone())),
        ClientBackend::Transmission => Box::new(TransmissionClient::new(config.clone())),
    }
}
