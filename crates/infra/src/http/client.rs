//! Artifact transport
//!
//! One verb matters to the agent: PUT an artifact body at a presigned job
//! URL. Server errors and connection failures are retried with exponential
//! backoff; any other status is handed back to the caller.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use tidewater_domain::{AgentError, Result};
use tracing::debug;

use crate::errors::InfraError;

const USER_AGENT: &str = concat!("tidewater-agent/", env!("CARGO_PKG_VERSION"));
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_BACKOFF_SHIFT: u32 = 6;

/// Upload client bound to one device's api key.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    max_attempts: u32,
    base_backoff: Duration,
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// PUT `body` as an octet stream and return the final status.
    ///
    /// # Errors
    /// `Upload` when every attempt failed to reach the server.
    pub async fn put_artifact(&self, url: &str, body: Vec<u8>) -> Result<StatusCode> {
        let mut attempt = 1;
        loop {
            let sent = self
                .client
                .put(url)
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(body.clone())
                .send()
                .await;
            let retry = attempt < self.max_attempts;

            match sent {
                Ok(response) if response.status().is_server_error() && retry => {
                    debug!(attempt, %url, status = %response.status(), "upload.attempt.rejected");
                }
                Ok(response) => {
                    debug!(attempt, %url, status = %response.status(), "upload.attempt.completed");
                    return Ok(response.status());
                }
                Err(err) if retry && (err.is_connect() || err.is_timeout()) => {
                    debug!(attempt, %url, error = %err, "upload.attempt.failed");
                }
                Err(err) => return Err(AgentError::from(InfraError::from(err))),
            }

            tokio::time::sleep(self.backoff(attempt)).await;
            attempt += 1;
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
        self.base_backoff.saturating_mul(1 << shift)
    }
}

/// Builder for [`HttpClient`].
pub struct HttpClientBuilder {
    max_attempts: u32,
    base_backoff: Duration,
    headers: HeaderMap,
    direct: bool,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
            headers: HeaderMap::new(),
            direct: false,
        }
    }
}

impl HttpClientBuilder {
    /// Total attempts per artifact, first try included.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    /// Authenticate uploads as an enrolled device.
    pub fn api_key(mut self, api_key: &str) -> Result<Self> {
        let mut value = HeaderValue::from_str(api_key)
            .map_err(|_| AgentError::Config("api key is not a valid header value".into()))?;
        value.set_sensitive(true);
        self.headers.insert("x-api-key", value);
        Ok(self)
    }

    /// Ignore proxy settings from the environment.
    pub fn direct(mut self) -> Self {
        self.direct = true;
        self
    }

    pub fn build(self) -> Result<HttpClient> {
        let mut builder = reqwest::Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .user_agent(USER_AGENT)
            .default_headers(self.headers);
        if self.direct {
            builder = builder.no_proxy();
        }
        let client = builder.build().map_err(|err| AgentError::from(InfraError::from(err)))?;
        Ok(HttpClient { client, max_attempts: self.max_attempts, base_backoff: self.base_backoff })
    }
}
