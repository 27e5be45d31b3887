pub mod config;
pub mod fetcher;
pub mod index;
pub mod library;
pub mod ops;
pub mod reconcile;
pub mod release;
pub mod report;
pub mod torrent_client;

pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, ClientBackend,
    Config, ConfigError,
};
pub use fetcher::{HttpFetcher, ListingFetcher, PageFetcher};
pub use index::{EpisodeIndex, EpisodeRecord, SqliteIndex};
pub use library::{LibraryStore, SqliteLibrary};
pub use release::QualityFilter;
pub use torrent_client::{build_client, AddTorrentOptions, TorrentClient};
