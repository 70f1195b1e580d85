//! Shared HTTP plumbing for the provider transports.
//!
//! Maps `reqwest` failures onto [`ProviderError`] and implements the
//! transports' native retry loop, which only runs when this layer is not
//! managing retries itself (see [`crate::retry::client_max_retries`]).

use std::future::Future;
use std::time::Duration;

use reqwest::header::HeaderMap;
use schema::{ProviderError, RetryPolicy, Retryable};
use serde_json::Value;
use tracing::debug;

/// Longest error body kept in [`ProviderError::Http`].
const MAX_ERROR_BODY_CHARS: usize = 2_000;

/// Native retries default to this delay, doubled per retry.
pub const DEFAULT_NATIVE_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Upper bound on any single native retry delay, server hints included.
pub const MAX_NATIVE_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Sends a request and decodes a JSON body, mapping every failure onto
/// [`ProviderError`].
pub(crate) async fn send_json(request: reqwest::RequestBuilder) -> Result<Value, ProviderError> {
    let response = request.send().await.map_err(transport_error)?;
    let status = response.status();
    if !status.is_success() {
        let retry_after = retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Http {
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            retry_after,
        });
    }
    response.json::<Value>().await.map_err(|e| {
        if e.is_timeout() {
            transport_error(e)
        } else {
            ProviderError::InvalidResponse {
                message: e.to_string(),
            }
        }
    })
}

/// Runs `send` up to `1 + max_retries` times, retrying transient failures.
pub(crate) async fn with_native_retries<F, Fut, T>(
    max_retries: u32,
    base_delay: Duration,
    mut send: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut retries = 0u32;
    loop {
        match send().await {
            Ok(value) => return Ok(value),
            Err(err) => match err.retry_policy() {
                RetryPolicy::Retryable { after } if retries < max_retries => {
                    let delay = native_delay(retries, base_delay, after);
                    debug!(retry = retries + 1, ?delay, error = %err, "Native client retry");
                    tokio::time::sleep(delay).await;
                    retries += 1;
                }
                _ => return Err(err),
            },
        }
    }
}

fn native_delay(retries: u32, base_delay: Duration, after: Option<Duration>) -> Duration {
    after
        .unwrap_or_else(|| base_delay.saturating_mul(1 << retries.min(16)))
        .min(MAX_NATIVE_RETRY_DELAY)
}

fn transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout {
            message: err.to_string(),
        }
    } else {
        ProviderError::Connection {
            message: err.to_string(),
        }
    }
}

/// Parses `retry-after-ms` or `retry-after` (in seconds).
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    if let Some(ms) = header("retry-after-ms").and_then(|v| v.trim().parse::<f64>().ok()) {
        return Duration::try_from_secs_f64(ms / 1000.0).ok();
    }
    header("retry-after")
        .and_then(|v| v.trim().parse::<f64>().ok())
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}
