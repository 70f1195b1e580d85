//! Per-provider retry policies.
//!
//! [`build_retry_decorator`] turns a provider slug and the current settings
//! into a [`RetryDecorator`]. Exactly one layer retries a given provider:
//!
//! - SDK retries enabled for the provider: the decorator is a passthrough and
//!   the transport keeps its native retry count.
//! - Otherwise: the decorator retries with bounded exponential back-off and
//!   [`client_max_retries`] forces the transport's native count to zero, so
//!   the two never compound.
//!
//! The decorator holds only immutable configuration; attempt counters live on
//! the stack of each call, so one decorator can serve concurrent calls.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use schema::{ProviderError, ProviderSlug, RetryPolicy, Retryable};
use settings::{RetrySettings, Settings};
use tokio::runtime::Runtime;
use tracing::{debug, warn};

/// Whether `provider`'s client keeps its own retries.
pub fn sdk_retries_for(provider: ProviderSlug, settings: &Settings) -> bool {
    settings.sdk_retries_for(provider)
}

/// Native retry count a transport for `provider` should be built with.
///
/// Returns `requested` when SDK retries are enabled for the provider and `0`
/// when this layer manages retries.
pub fn client_max_retries(provider: ProviderSlug, settings: &Settings, requested: u32) -> u32 {
    if sdk_retries_for(provider, settings) {
        requested
    } else {
        0
    }
}

/// Builds the retry decorator for `provider`.
pub fn build_retry_decorator(provider: ProviderSlug, settings: &Settings) -> RetryDecorator {
    let mode = if sdk_retries_for(provider, settings) {
        RetryMode::Passthrough
    } else {
        RetryMode::Managed(settings.retry.clone())
    };
    RetryDecorator {
        provider,
        mode,
        per_attempt_timeout: settings.per_attempt_timeout,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum RetryMode {
    Passthrough,
    Managed(RetrySettings),
}

/// Wraps calls to one provider with that provider's retry policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryDecorator {
    provider: ProviderSlug,
    mode: RetryMode,
    per_attempt_timeout: Option<Duration>,
}

impl RetryDecorator {
    /// Provider this decorator was built for.
    pub fn provider(&self) -> ProviderSlug {
        self.provider
    }

    /// Returns `true` if calls are invoked once and never retried here.
    pub fn is_passthrough(&self) -> bool {
        self.mode == RetryMode::Passthrough
    }

    /// Total attempts a call may make, including the first.
    pub fn max_attempts(&self) -> u32 {
        match &self.mode {
            RetryMode::Passthrough => 1,
            RetryMode::Managed(cfg) => cfg.max_attempts.max(1),
        }
    }

    /// Runs an async operation under this policy.
    ///
    /// In managed mode each attempt is bounded by the per-attempt timeout, if
    /// configured; an elapsed attempt fails with [`ProviderError::Timeout`] and
    /// is retried like any other transient error. The last error is returned
    /// unchanged.
    pub async fn call<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display + From<ProviderError>,
    {
        let mut attempt = 1u32;
        loop {
            let result = match (&self.mode, self.per_attempt_timeout) {
                (RetryMode::Managed(_), Some(limit)) => {
                    match tokio::time::timeout(limit, op()).await {
                        Ok(result) => result,
                        Err(_) => Err(E::from(ProviderError::Timeout {
                            message: format!("attempt exceeded {limit:?}"),
                        })),
                    }
                }
                _ => op().await,
            };
            match result {
                Ok(value) => return Ok(value),
                Err(err) => match self.delay_before_retry(attempt, &err) {
                    Some(delay) => {
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(err),
                },
            }
        }
    }

    /// Runs an async operation under this policy from synchronous code,
    /// driving it on `runtime`.
    ///
    /// Behaves exactly like [`RetryDecorator::call`], per-attempt timeout
    /// included. Must not be called from inside another tokio runtime.
    pub fn call_blocking<T, E, F, Fut>(&self, runtime: &Runtime, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display + From<ProviderError>,
    {
        runtime.block_on(self.call(op))
    }

    /// Back-off before attempt `attempt + 1`, ignoring any server hint.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let RetryMode::Managed(cfg) = &self.mode else {
            return Duration::ZERO;
        };
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = (cfg.initial_delay.as_secs_f64() * cfg.exp_base.powi(exponent))
            .min(cfg.max_delay.as_secs_f64());
        let secs = if cfg.jitter && secs > 0.0 {
            secs * rand::rng().random_range(0.9..=1.1)
        } else {
            secs
        };
        Duration::try_from_secs_f64(secs).unwrap_or(cfg.max_delay)
    }

    // `None` means surface the error now. Server hints are honoured as a
    // floor but never beyond the configured cap.
    fn delay_before_retry<E: Retryable + Display>(&self, attempt: u32, err: &E) -> Option<Duration> {
        let RetryMode::Managed(cfg) = &self.mode else {
            return None;
        };
        let RetryPolicy::Retryable { after } = err.retry_policy() else {
            debug!(provider = %self.provider, error = %err, "Non-retryable provider error");
            return None;
        };
        if attempt >= self.max_attempts() {
            warn!(provider = %self.provider, attempts = attempt, error = %err, "Retries exhausted");
            return None;
        }
        let backoff = self.backoff(attempt);
        let delay = after
            .map_or(backoff, |hint| hint.max(backoff))
            .min(cfg.max_delay);
        warn!(
            provider = %self.provider,
            attempt,
            max_attempts = self.max_attempts(),
            ?delay,
            error = %err,
            "Transient provider error; retrying"
        );
        Some(delay)
    }
}
