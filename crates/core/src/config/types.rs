use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub listing: ListingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub client: Option<ClientConfig>,
}

/// Local video library configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibraryConfig {
    /// Folder containing the local video files. May be omitted and supplied
    /// per invocation instead.
    #[serde(default)]
    pub folder: Option<PathBuf>,
    /// Checksum cache database path.
    #[serde(default = "default_library_db")]
    pub database: PathBuf,
    /// Video file extensions considered part of the library (no dot,
    /// compared case-insensitively).
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            folder: None,
            database: default_library_db(),
            extensions: default_extensions(),
        }
    }
}

fn default_library_db() -> PathBuf {
    PathBuf::from("crc32_files.db")
}

fn default_extensions() -> Vec<String> {
    vec!["mkv".to_string(), "mp4".to_string(), "avi".to_string()]
}

/// Remote listing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListingConfig {
    /// Search-results base URL without the page parameter; `&p=N` is
    /// appended per page.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Site root, prepended to relative detail-page links.
    #[serde(default = "default_site_root")]
    pub site_root: String,
    /// Catalog marker a title must contain to be in scope.
    #[serde(default = "default_marker")]
    pub marker: String,
    /// Accepted quality tiers (vertical resolution).
    #[serde(default = "default_tiers")]
    pub accepted_tiers: Vec<u32>,
    /// Politeness delay between page fetches, in milliseconds.
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            site_root: default_site_root(),
            marker: default_marker(),
            accepted_tiers: default_tiers(),
            page_delay_ms: default_page_delay_ms(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_site_root() -> String {
    "https://nyaa.si".to_string()
}

fn default_base_url() -> String {
    "https://nyaa.si/?f=0&c=0_0&q=one+pace+1080p&o=asc".to_string()
}

fn default_marker() -> String {
    "[One Pace]".to_string()
}

fn default_tiers() -> Vec<u32> {
    vec![1080, 720]
}

fn default_page_delay_ms() -> u64 {
    200
}

fn default_timeout() -> u32 {
    30
}

/// Episode index configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    /// Episode index database path.
    #[serde(default = "default_index_db")]
    pub database: PathBuf,
    /// Skip a refresh when the index was updated more recently than this.
    #[serde(default = "default_cooldown")]
    pub refresh_cooldown_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            database: default_index_db(),
            refresh_cooldown_secs: default_cooldown(),
        }
    }
}

fn default_index_db() -> PathBuf {
    PathBuf::from("episodes_index.db")
}

fn default_cooldown() -> u64 {
    600
}

/// Report/export output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportConfig {
    /// Missing-episode report path, fully overwritten per run.
    #[serde(default = "default_missing_csv")]
    pub missing_csv: PathBuf,
    /// Library export path.
    #[serde(default = "default_library_csv")]
    pub library_csv: PathBuf,
    /// When true, only missing episodes with a resolvable magnet link are
    /// reported. Off by default so real gaps are never hidden.
    #[serde(default)]
    pub require_magnet: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            missing_csv: default_missing_csv(),
            library_csv: default_library_csv(),
            require_magnet: false,
        }
    }
}

fn default_missing_csv() -> PathBuf {
    PathBuf::from("Ace-Pace_Missing.csv")
}

fn default_library_csv() -> PathBuf {
    PathBuf::from("Ace-Pace_DB.csv")
}

/// Torrent client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Which client backend to drive.
    pub backend: ClientBackend,
    #[serde(default = "default_client_host")]
    pub host: String,
    /// Defaults to the backend's conventional port when absent.
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Folder the client downloads into.
    #[serde(default)]
    pub download_folder: Option<String>,
    /// Tags attached to added torrents (qBittorrent only).
    #[serde(default)]
    pub tags: Vec<String>,
    /// Category attached to added torrents (qBittorrent only).
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_client_host() -> String {
    "localhost".to_string()
}

/// Available torrent client backends
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClientBackend {
    QBittorrent,
    Transmission,
}

impl ClientBackend {
    /// The backend's conventional WebUI/RPC port.
    pub fn default_port(&self) -> u16 {
        match self {
            ClientBackend::QBittorrent => 8080,
            ClientBackend::Transmission => 9091,
        }
    }
}

impl ClientConfig {
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.backend.default_port())
    }
}
