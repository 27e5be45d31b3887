//! Transmission RPC client implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;

use super::{
    truncate_magnet, AddSummary, AddTorrentOptions, TorrentClient, TorrentClientError,
};

/// Pause between adds so the daemon is not hammered.
const ADD_DELAY: Duration = Duration::from_millis(100);

/// Transmission RPC client.
pub struct TransmissionClient {
    client: Client,
    config: ClientConfig,
    /// CSRF session id, learned through the 409 handshake.
    session_id: RwLock<Option<String>>,
}

fn rpc_url(host: &str, port: u16) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{}:{}/transmission/rpc", host.trim_end_matches('/'), port)
    } else {
        format!("http://{host}:{port}/transmission/rpc")
    }
}

/// Build the torrent-add request body.
fn add_payload(magnet: &str, download_folder: Option<&str>) -> Value {
    let mut arguments = json!({ "filename": magnet });
    if let Some(folder) = download_folder {
        arguments["download-dir"] = json!(folder);
    }
    json!({ "method": "torrent-add", "arguments": arguments })
}

impl TransmissionClient {
    pub fn new(config: ClientConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            config,
            session_id: RwLock::new(None),
        }
    }

    fn url(&self) -> String {
        rpc_url(&self.config.host, self.config.effective_port())
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

    async fn post(&self, payload: &Value) -> Result<reqwest::Response, TorrentClientError> {
        let mut request = self.client.post(self.url()).json(payload);
        if !self.config.username.is_empty() {
            request = request.basic_auth(&self.config.username, Some(&self.config.password));
        }
        if let Some(session_id) = self.session_id.read().await.as_deref() {
            request = request.header("X-Transmission-Session-Id", session_id);
        }
        request.send().await.map_err(Self::map_err)
    }

    /// Execute an RPC call, handling the CSRF handshake: a 409 carries the
    /// session id to repeat the request with.
    async fn rpc(&self, payload: &Value) -> Result<Value, TorrentClientError> {
        let mut response = self.post(payload).await?;

        if response.status() == StatusCode::CONFLICT {
            let session_id = response
                .headers()
                .get("X-Transmission-Session-Id")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .ok_or_else(|| {
                    TorrentClientError::ApiError(
                        "409 response without a session id".to_string(),
                    )
                })?;
            debug!("Transmission session id refreshed");
            *self.session_id.write().await = Some(session_id);
            response = self.post(payload).await?;
        }

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(TorrentClientError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(TorrentClientError::ApiError(format!(
                "RPC returned {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| TorrentClientError::ApiError(e.to_string()))
    }
}

#[async_trait]
impl TorrentClient for TransmissionClient {
    fn name(&self) -> &str {
        "transmission"
    }

    async fn connect(&self) -> Result<(), TorrentClientError> {
        self.rpc(&json!({ "method": "session-get" })).await?;
        info!(url = %self.url(), "Connected to Transmission");
        Ok(())
    }

    async fn add_torrents(
        &self,
        magnets: &[String],
        options: &AddTorrentOptions,
        cancel: &CancellationToken,
    ) -> Result<AddSummary, TorrentClientError> {
        if !options.tags.is_empty() || options.category.is_some() {
            warn!("Transmission does not support tags or categories, ignoring");
        }

        let mut summary = AddSummary::default();
        for (idx, magnet) in magnets.iter().enumerate() {
            if cancel.is_cancelled() {
                summary.interrupted = true;
                break;
            }
            debug!(n = idx + 1, total = magnets.len(), "Adding magnet");

            if options.dry_run {
                info!(magnet = %truncate_magnet(magnet), "Dry run, would add torrent");
                summary.added += 1;
                continue;
            }

            let payload = add_payload(magnet, options.download_folder.as_deref());
            let body = self.rpc(&payload).await?;

            let result = body.get("result").and_then(Value::as_str).unwrap_or("");
            if result == "success" {
                let duplicate = body
                    .get("arguments")
                    .map(|a| a.get("torrent-duplicate").is_some())
                    .unwrap_or(false);
                if duplicate {
                    summary.already_present += 1;
                } else {
                    summary.added += 1;
                }
            } else {
                warn!(result = %result, "Transmission rejected torrent");
                summary.failed += 1;
            }
            tokio::time::sleep(ADD_DELAY).await;
        }

        info!(
            added = summary.added,
            already_present = summary.already_present,
            "Transmission batch finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_url_plain_host() {
        assert_eq!(
            rpc_url("localhost", 9091),
            "http://localhost:9091/transmission/rpc"
        );
    }

    #[test]
    fn test_rpc_url_keeps_scheme() {
        assert_eq!(
            rpc_url("https://nas.example", 443),
            "https://nas.example:443/transmission/rpc"
        );
    }

    #[test]
    fn test_add_payload_with_folder() {
        let payload = add_payload("magnet:?xt=urn:btih:aaaa", Some("/media"));
        assert_eq!(payload["method"], "torrent-add");
        assert_eq!(payload["arguments"]["filename"], "magnet:?xt=urn:btih:aaaa");
        assert_eq!(payload["arguments"]["download-dir"], "/media");
    }

    #[test]
    fn test_add_payload_without_folder() {
        let payload = add_payload("magnet:?xt=urn:btih:aaaa", None);
        assert!(payload["arguments"].get("download-dir").is_none());
    }

    #[tokio::test]
    async fn test_dry_run_handles_multibyte_display_name() {
        use crate::config::{ClientBackend, ClientConfig};

        let client = TransmissionClient::new(ClientConfig {
            backend: ClientBackend::Transmission,
            host: "localhost".to_string(),
            port: None,
            username: String::new(),
            password: String::new(),
            download_folder: None,
            tags: vec![],
            category: None,
            timeout_secs: 1,
        });

        let magnet = format!(
            "magnet:?xt=urn:btih:{}&dn={}",
            "a".repeat(40),
            "ワンピース".repeat(10)
        );
        let options = AddTorrentOptions {
            dry_run: true,
            ..AddTorrentOptions::default()
        };
        let summary = client
            .add_torrents(&[magnet], &options, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.added, 1);
    }
}
