//! HTTP fetch of the availability listing page.

use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

/// The municipal page listing free kindergarten spots.
pub const DEFAULT_PAGE_URL: &str = "https://www.oslo.kommune.no/barnehage/ledige-barnehageplasser/";

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Connection problems, timeouts and 5xx responses are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(err) => err.is_connect() || err.is_timeout() || err.is_request(),
            Self::Server { status, .. } => *status >= 500,
            Self::Json(_) => false,
        }
    }
}

/// GET `url` and return the body, mapping non-2xx to [`SyncError::Server`].
pub(crate) async fn get_text(client: &reqwest::Client, url: &str) -> Result<String, SyncError> {
    let resp = client.get(url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(SyncError::Server {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp.text().await?)
}

/// Fetches the listing page, retrying transient failures.
pub struct PageClient {
    client: reqwest::Client,
    url: String,
    retries: u32,
    backoff: Duration,
}

impl PageClient {
    /// Create a client for the listing page at `url`.
    ///
    /// Defaults to 3 retries with a 2 s linear backoff.
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            retries: 3,
            backoff: Duration::from_secs(2),
        }
    }

    pub fn with_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.retries = retries;
        self.backoff = backoff;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The page HTML. Attempt `n` (from 1) waits `n * backoff` before retrying.
    pub async fn fetch(&self) -> Result<String, SyncError> {
        let mut attempt = 0;
        loop {
            info!(url = %self.url, attempt, "fetching availability page");
            match get_text(&self.client, &self.url).await {
                Ok(body) => {
                    info!(bytes = body.len(), "fetched availability page");
                    return Ok(body);
                }
                Err(err) if err.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    let wait = self.backoff * attempt;
                    warn!(error = %err, attempt, wait_ms = wait.as_millis() as u64, "page fetch failed, retrying");
                    tokio::time::sleep(wait).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
