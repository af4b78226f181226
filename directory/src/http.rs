use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::DirectoryError;
use crate::source::DirectorySource;

/// Roster endpoint path on the directory service.
pub const DEFAULT_ROSTER_PATH: &str = "/api/v1/employees/registered-faces";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Builder-style configuration for [`HttpDirectory`].
#[derive(Debug, Clone)]
pub struct HttpDirectoryConfig {
    pub base_url: String,
    pub path: String,
    pub request_timeout: Duration,
}

impl HttpDirectoryConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            path: DEFAULT_ROSTER_PATH.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = if self.path.is_empty() {
            DEFAULT_ROSTER_PATH
        } else {
            self.path.as_str()
        };
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }
}

/// Roster response envelope: `{"data": [...]}`. Entries stay undecoded.
#[derive(Deserialize)]
struct RosterResponse {
    #[serde(default)]
    data: Vec<Value>,
}

/// Fetches the roster from the directory service over HTTP.
pub struct HttpDirectory {
    client: Client,
    url: String,
    request_timeout: Duration,
}

impl HttpDirectory {
    pub fn new(base_url: impl Into<String>) -> Result<Self, DirectoryError> {
        Self::with_config(HttpDirectoryConfig::new(base_url))
    }

    pub fn with_config(cfg: HttpDirectoryConfig) -> Result<Self, DirectoryError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));

        let client = Client::builder()
            .timeout(cfg.request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| DirectoryError::Request(e.to_string()))?;

        Ok(Self {
            client,
            url: cfg.url(),
            request_timeout: cfg.request_timeout,
        })
    }

    /// Full roster URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn map_send_error(&self, e: reqwest::Error) -> DirectoryError {
        if e.is_timeout() {
            DirectoryError::Timeout(self.request_timeout)
        } else {
            DirectoryError::Request(e.to_string())
        }
    }
}

#[async_trait::async_trait]
impl DirectorySource for HttpDirectory {
    async fn fetch_roster(&self) -> Result<Vec<Value>, DirectoryError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let body: String = resp.text().await.unwrap_or_default().chars().take(200).collect();
            return Err(DirectoryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await.map_err(|e| self.map_send_error(e))?;
        let parsed: RosterResponse =
            serde_json::from_slice(&bytes).map_err(|e| DirectoryError::Decode(e.to_string()))?;

        debug!(url = %self.url, records = parsed.data.len(), "fetched roster");
        Ok(parsed.data)
    }
}
