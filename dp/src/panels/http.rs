//! HTTP-backed panel

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

use crate::polling::{PollCallback, poll_fn};

/// A panel as configured in the `panels` list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelConfig {
    /// Registration id; unique per dashboard
    pub id: String,

    /// Endpoint fetched on every round
    pub url: String,

    /// Per-request timeout in milliseconds
    #[serde(rename = "timeout-ms", default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    5_000
}

impl PanelConfig {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            timeout_ms: default_timeout_ms(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Errors from a single panel fetch
#[derive(Debug, Error)]
pub enum PanelError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Endpoint returned HTTP {status}")]
    Status { status: u16 },
}

/// What a panel currently shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelStatus {
    /// No fetch has settled yet
    Pending,
    Ready {
        status: u16,
        bytes: usize,
        fetched_at: DateTime<Utc>,
    },
    Failed {
        error: String,
        failed_at: DateTime<Utc>,
    },
}

impl PanelStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, PanelStatus::Ready { .. })
    }
}

/// A panel that fetches one URL per round and keeps its own status
///
/// Errors are recorded in the panel's status before being handed back to
/// the coordinator, which only logs them.
#[derive(Debug, Clone)]
pub struct HttpPanel {
    config: PanelConfig,
    client: reqwest::Client,
    status: Arc<watch::Sender<PanelStatus>>,
}

impl HttpPanel {
    pub fn new(config: PanelConfig, client: reqwest::Client) -> Self {
        debug!(id = %config.id, url = %config.url, "HttpPanel::new: called");
        let (status, _) = watch::channel(PanelStatus::Pending);
        Self {
            config,
            client,
            status: Arc::new(status),
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    pub fn status(&self) -> PanelStatus {
        self.status.borrow().clone()
    }

    /// Receiver that wakes whenever the panel's status changes
    pub fn watch_status(&self) -> watch::Receiver<PanelStatus> {
        self.status.subscribe()
    }

    /// Fetch the endpoint once and record the outcome
    pub async fn fetch(&self) -> Result<(), PanelError> {
        debug!(id = %self.config.id, "HttpPanel::fetch: called");
        match self.request().await {
            Ok((status, bytes)) => {
                self.status.send_replace(PanelStatus::Ready {
                    status,
                    bytes,
                    fetched_at: Utc::now(),
                });
                Ok(())
            }
            Err(e) => {
                self.status.send_replace(PanelStatus::Failed {
                    error: e.to_string(),
                    failed_at: Utc::now(),
                });
                Err(e)
            }
        }
    }

    async fn request(&self) -> Result<(u16, usize), PanelError> {
        let response = self
            .client
            .get(&self.config.url)
            .timeout(self.config.timeout())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PanelError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        Ok((status.as_u16(), body.len()))
    }

    /// Refresh callback to register with the coordinator
    pub fn callback(&self) -> PollCallback {
        let panel = self.clone();
        poll_fn(move || {
            let panel = panel.clone();
            async move {
                panel.fetch().await?;
                Ok(())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    /// Serve `response` verbatim to every connection
    async fn serve(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        format!("http://{addr}/data")
    }

    #[test]
    fn test_panel_config_defaults() {
        let config: PanelConfig = serde_yaml::from_str("id: cpu\nurl: http://localhost/cpu").unwrap();
        assert_eq!(config, PanelConfig::new("cpu", "http://localhost/cpu"));
        assert_eq!(config.timeout(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_fetch_records_ready() {
        let url = serve("HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello").await;
        let panel = HttpPanel::new(PanelConfig::new("cpu", url), client());
        assert_eq!(panel.status(), PanelStatus::Pending);

        panel.fetch().await.unwrap();

        match panel.status() {
            PanelStatus::Ready { status, bytes, .. } => {
                assert_eq!(status, 200);
                assert_eq!(bytes, 5);
            }
            other => panic!("Expected Ready, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_records_http_error() {
        let url = serve("HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n").await;
        let panel = HttpPanel::new(PanelConfig::new("jobs", url), client());

        let err = panel.fetch().await.unwrap_err();
        assert!(matches!(err, PanelError::Status { status: 503 }));

        match panel.status() {
            PanelStatus::Failed { error, .. } => assert!(error.contains("503")),
            other => panic!("Expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_callback_surfaces_error_and_keeps_status() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let panel = HttpPanel::new(PanelConfig::new("down", format!("http://{addr}/")), client());
        let callback = panel.callback();

        assert!(callback().await.is_err());
        assert!(matches!(panel.status(), PanelStatus::Failed { .. }));
        assert!(!panel.status().is_ready());
    }
}
