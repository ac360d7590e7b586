//! Shared HTTP transport for the LRS services
//!
//! One `reqwest::Client` with an explicit timeout. Each form POST gets at
//! most one retry, and only for transient failures.

use crate::error::TransportError;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retry once on connect errors, timeouts and 5xx responses
    pub retry_transient: bool,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        if self.retry_transient {
            2
        } else {
            1
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { retry_transient: true, backoff: Duration::from_millis(500) }
    }
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpTransport {
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TransportError::Client)?;
        Ok(Self { client, retry })
    }

    /// POST a form-encoded body and return the response text
    pub async fn post_form<T: Serialize + ?Sized>(
        &self,
        url: &str,
        form: &T,
    ) -> Result<String, TransportError> {
        let max_attempts = self.retry.max_attempts();
        let mut attempt = 1;

        loop {
            match self.send_once(url, form).await {
                Ok(body) => {
                    debug!(url = %url, attempt = %attempt, bytes = %body.len(), "http_post_ok");
                    return Ok(body);
                }
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    warn!(
                        url = %url,
                        attempt = %attempt,
                        backoff_ms = %self.retry.backoff.as_millis(),
                        error = %e,
                        "http_post_retrying"
                    );
                    if !self.retry.backoff.is_zero() {
                        tokio::time::sleep(self.retry.backoff).await;
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once<T: Serialize + ?Sized>(
        &self,
        url: &str,
        form: &T,
    ) -> Result<String, TransportError> {
        let response =
            self.client.post(url).form(form).send().await.map_err(TransportError::Request)?;

        let status = response.status();
        let body = response.text().await.map_err(TransportError::Body)?;

        if !status.is_success() {
            return Err(TransportError::Status { status: status.as_u16(), body });
        }
        Ok(body)
    }
}
