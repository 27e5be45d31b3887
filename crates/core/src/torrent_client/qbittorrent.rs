//! qBittorrent torrent client implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;

use super::{
    magnet_info_hash, truncate_magnet, AddSummary, AddTorrentOptions, TorrentClient,
    TorrentClientError,
};

/// Pause between adds so the WebUI is not hammered.
const ADD_DELAY: Duration = Duration::from_millis(100);

/// qBittorrent WebUI client.
pub struct QBittorrentClient {
    client: Client,
    config: ClientConfig,
    /// Set after a successful login (the cookie jar holds the actual SID).
    authenticated: RwLock<bool>,
}

#[derive(Debug, Deserialize)]
struct TorrentEntry {
    #[allow(dead_code)]
    hash: String,
}

/// WebUI base URL. A bare host gets the http scheme prepended.
fn web_url(host: &str, port: u16) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{}:{}", host.trim_end_matches('/'), port)
    } else {
        format!("http://{host}:{port}")
    }
}

impl QBittorrentClient {
    pub fn new(config: ClientConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .cookie_store(true)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            config,
            authenticated: RwLock::new(false),
        }
    }

    fn base_url(&self) -> String {
        web_url(&self.config.host, self.config.effective_port())
    }

    fn map_err(e: reqwest::Error) -> TorrentClientError {
        if e.is_timeout() {
            TorrentClientError::Timeout
        } else if e.is_connect() {
            TorrentClientError::ConnectionFailed(e.to_string())
        } else {
            TorrentClientError::ApiError(e.to_string())
        }
    }

    /// Login and store the session cookie.
    async fn login(&self) -> Result<(), TorrentClientError> {
        let url = format!("{}/api/v2/auth/login", self.base_url());
        let params = [
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(Self::map_err)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if body.contains("Ok.") {
            debug!("qBittorrent login successful");
            *self.authenticated.write().await = true;
            Ok(())
        } else if body.contains("Fails.") || status.as_u16() == 403 {
            Err(TorrentClientError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            ))
        } else {
            Err(TorrentClientError::AuthenticationFailed(format!(
                "Unexpected response: {}",
                body.chars().take(100).collect::<String>()
            )))
        }
    }

    async fn ensure_authenticated(&self) -> Result<(), TorrentClientError> {
        if *self.authenticated.read().await {
            return Ok(());
        }
        self.login().await
    }

    /// Authenticated form POST with one re-login retry on session expiry.
    async fn post_form(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<String, TorrentClientError> {
        self.ensure_authenticated().await?;

        let url = format!("{}{}", self.base_url(), endpoint);
        let response = self
            .client
            .post(&url)
            .form(params)
            .send()
            .await
            .map_err(Self::map_err)?;

        let response = if response.status().as_u16() == 403 {
            warn!("qBittorrent session expired, re-authenticating");
            *self.authenticated.write().await = false;
            self.login().await?;
            self.client
                .post(&url)
                .form(params)
                .send()
                .await
                .map_err(Self::map_err)?
        } else {
            response
        };

        let status = response.status();
        if !status.is_success() {
            return Err(TorrentClientError::ApiError(format!(
                "{} returned {}",
                endpoint, status
            )));
        }
        response
            .text()
            .await
            .map_err(|e| TorrentClientError::ApiError(e.to_string()))
    }

    /// Whether the client already holds a torrent with this info hash.
    async fn torrent_exists(&self, info_hash: &str) -> Result<bool, TorrentClientError> {
        let body = self
            .post_form("/api/v2/torrents/info", &[("hashes", info_hash)])
            .await?;
        let entries: Vec<TorrentEntry> = serde_json::from_str(&body)
            .map_err(|e| TorrentClientError::ApiError(e.to_string()))?;
        Ok(!entries.is_empty())
    }

    async fn add_tags(&self, info_hash: &str, tags: &str) -> Result<(), TorrentClientError> {
        self.post_form(
            "/api/v2/torrents/addTags",
            &[("hashes", info_hash), ("tags", tags)],
        )
        .await?;
        Ok(())
    }

    async fn add_magnet(
        &self,
        magnet: &str,
        options: &AddTorrentOptions,
        tags: &str,
    ) -> Result<(), TorrentClientError> {
        let mut params = vec![("urls", magnet)];
        if let Some(folder) = options.download_folder.as_deref() {
            params.push(("savepath", folder));
        }
        if !tags.is_empty() {
            params.push(("tags", tags));
        }
        if let Some(category) = options.category.as_deref() {
            params.push(("category", category));
        }
        self.post_form("/api/v2/torrents/add", &params).await?;
        Ok(())
    }
}

#[async_trait]
impl TorrentClient for QBittorrentClient {
    fn name(&self) -> &str {
        "qbittorrent"
    }

    async fn connect(&self) -> Result<(), TorrentClientError> {
        self.login().await?;
        info!(url = %self.base_url(), "Connected to qBittorrent");
        Ok(())
    }

    async fn add_torrents(
        &self,
        magnets: &[String],
        options: &AddTorrentOptions,
        cancel: &CancellationToken,
    ) -> Result<AddSummary, TorrentClientError> {
        let mut summary = AddSummary::default();
        let tags = options.tags.join(",");

        if !tags.is_empty() && !options.dry_run {
            self.post_form("/api/v2/torrents/createTags", &[("tags", tags.as_str())])
                .await?;
        }

        for (idx, magnet) in magnets.iter().enumerate() {
            if cancel.is_cancelled() {
                summary.interrupted = true;
                break;
            }
            debug!(n = idx + 1, total = magnets.len(), "Processing magnet");

            let Some(info_hash) = magnet_info_hash(magnet) else {
                warn!(magnet = %truncate_magnet(magnet), "No info hash in magnet link");
                summary.invalid += 1;
                continue;
            };

            if options.dry_run {
                info!(info_hash = %info_hash, "Dry run, would add torrent");
                summary.added += 1;
                continue;
            }

            if self.torrent_exists(&info_hash).await? {
                debug!(info_hash = %info_hash, "Torrent already present");
                if !tags.is_empty() {
                    self.add_tags(&info_hash, &tags).await?;
                }
                summary.already_present += 1;
            } else {
                match self.add_magnet(magnet, options, &tags).await {
                    Ok(()) => summary.added += 1,
                    Err(e) => {
                        warn!(magnet = %truncate_magnet(magnet), error = %e, "Failed to add torrent");
                        summary.failed += 1;
                    }
                }
            }
            tokio::time::sleep(ADD_DELAY).await;
        }

        info!(
            added = summary.added,
            already_present = summary.already_present,
            "qBittorrent batch finished"
        );
        Ok(summary)
    }
}
