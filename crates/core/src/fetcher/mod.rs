//! Remote listing access: HTTP page fetching, HTML extraction, and the
//! paginated catalog traversal.

pub mod markup;

mod http;
mod listing;

pub use http::HttpFetcher;
pub use listing::{ListingFetcher, ListingOutcome};

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while talking to the listing site.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Request timeout")]
    Timeout,
}

/// Trait for fetching pages as text.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url` and return the response body.
    async fn get(&self, url: &str) -> Result<String, FetchError>;
}
