//! JSON-over-HTTP calls with retry and backoff, shared by the embedding
//! providers, the completion provider, and the Chroma store.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors and timeouts → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! When retries are exhausted the error is a
//! [`RagError::BackendUnavailable`], so callers and the HTTP layer can tell
//! an unreachable service apart from a bad request.

use anyhow::{bail, Result};
use reqwest::{Method, StatusCode};
use std::time::Duration;

use noterag_core::RagError;

/// Build a client with a per-request timeout.
pub fn client_with_timeout(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Delay before retry number `attempt` (1-based).
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt.saturating_sub(1)).min(5))
}

/// Whether a response status is worth retrying.
pub fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// One JSON request description, replayed on every attempt.
pub struct JsonRequest<'a> {
    pub method: Method,
    pub url: String,
    pub bearer: Option<&'a str>,
    pub body: Option<&'a serde_json::Value>,
    /// Service label used in error messages (e.g. `"OpenAI"`).
    pub service: &'a str,
}

impl<'a> JsonRequest<'a> {
    pub fn post(service: &'a str, url: impl Into<String>, body: &'a serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            bearer: None,
            body: Some(body),
            service,
        }
    }

    pub fn get(service: &'a str, url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            bearer: None,
            body: None,
            service,
        }
    }

    pub fn delete(service: &'a str, url: impl Into<String>) -> Self {
        Self {
            method: Method::DELETE,
            url: url.into(),
            bearer: None,
            body: None,
            service,
        }
    }

    pub fn bearer(mut self, token: &'a str) -> Self {
        self.bearer = Some(token);
        self
    }
}

/// Send `request`, retrying transient failures up to `max_retries` times,
/// and return the parsed JSON body of the first successful response. An
/// empty success body is returned as `null`.
pub async fn send_json(
    client: &reqwest::Client,
    request: &JsonRequest<'_>,
    max_retries: u32,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            tokio::time::sleep(backoff_delay(attempt)).await;
        }

        let mut builder = client.request(request.method.clone(), &request.url);
        if let Some(token) = request.bearer {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        if let Some(body) = request.body {
            builder = builder.json(body);
        }

        match builder.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let text = response.text().await?;
                    if text.trim().is_empty() {
                        return Ok(serde_json::Value::Null);
                    }
                    return Ok(serde_json::from_str(&text)?);
                }

                let body_text = response.text().await.unwrap_or_default();
                if is_retryable(status) {
                    tracing::debug!(service = request.service, %status, attempt, "retryable API error");
                    last_err = Some(format!(
                        "{} API error {}: {}",
                        request.service, status, body_text
                    ));
                    continue;
                }

                bail!("{} API error {}: {}", request.service, status, body_text);
            }
            Err(e) => {
                tracing::debug!(service = request.service, error = %e, attempt, "request failed");
                last_err = Some(format!(
                    "{} connection error ({}): {}",
                    request.service, request.url, e
                ));
                continue;
            }
        }
    }

    Err(RagError::unavailable(
        last_err.unwrap_or_else(|| format!("{} request failed after retries", request.service)),
    )
    .into())
}
