//! Opt-in interception of provider calls.
//!
//! Callers obtain the adapter with [`install`] and wrap a transport with
//! [`AnthropicAdapter::wrap`]. Every call through the returned client runs the
//! request extractor, the retry-decorated network call, and the response
//! extractor, then hands a [`CallRecord`] to the observer. The value returned
//! to the caller is the provider's raw response, unchanged.
//!
//! Nothing global is patched; unwrapped transports behave exactly as before.

use std::sync::{Arc, OnceLock};

use schema::{
    CallArguments, CallId, CallObserver, CallRecord, InputParameters, MessagesTransport,
    ProviderError, ProviderSlug, Timestamp,
};
use serde_json::Value;
use settings::Settings;
use tracing::{info_span, Instrument};

use crate::anthropic::{safe_extract_input_parameters, safe_extract_output_parameters};
use crate::errors::{AdapterUnavailable, ClientError};
use crate::retry::{build_retry_decorator, RetryDecorator};

static INSTALLED: OnceLock<Result<AnthropicAdapter, AdapterUnavailable>> = OnceLock::new();

/// Returns the process-wide Anthropic adapter.
///
/// Idempotent: the first call decides availability and later calls return
/// the same result. Without the `anthropic` feature the adapter is
/// unavailable and a warning with guidance is logged once.
pub fn install() -> Result<&'static AnthropicAdapter, AdapterUnavailable> {
    INSTALLED.get_or_init(probe).as_ref().map_err(Clone::clone)
}

#[cfg(feature = "anthropic")]
fn probe() -> Result<AnthropicAdapter, AdapterUnavailable> {
    tracing::debug!("Anthropic adapter installed");
    Ok(AnthropicAdapter { _private: () })
}

#[cfg(not(feature = "anthropic"))]
fn probe() -> Result<AnthropicAdapter, AdapterUnavailable> {
    let err = AdapterUnavailable {
        provider: ProviderSlug::Anthropic,
        guidance: "rebuild with the `anthropic` feature of the `llm` crate enabled".to_string(),
    };
    tracing::warn!(provider = %err.provider, guidance = %err.guidance, "Provider adapter unavailable");
    Err(err)
}

/// Handle proving the Anthropic adapter is available. Obtained from
/// [`install`].
#[derive(Debug)]
pub struct AnthropicAdapter {
    _private: (),
}

impl AnthropicAdapter {
    /// Wraps `transport` for use from async code.
    pub fn wrap<T: MessagesTransport>(
        &self,
        transport: T,
        settings: &Settings,
        observer: Arc<dyn CallObserver>,
    ) -> InstrumentedClient<T> {
        let retry = build_retry_decorator(transport.provider(), settings);
        InstrumentedClient {
            transport,
            retry,
            observer,
        }
    }

    /// Wraps `transport` for use from synchronous code.
    ///
    /// The returned client owns a current-thread runtime and must not be
    /// called from inside another tokio runtime.
    pub fn wrap_blocking<T: MessagesTransport>(
        &self,
        transport: T,
        settings: &Settings,
        observer: Arc<dyn CallObserver>,
    ) -> Result<BlockingInstrumentedClient<T>, ClientError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(BlockingInstrumentedClient {
            inner: self.wrap(transport, settings, observer),
            runtime,
        })
    }
}

/// A transport whose calls are extracted, retried, and observed.
pub struct InstrumentedClient<T> {
    transport: T,
    retry: RetryDecorator,
    observer: Arc<dyn CallObserver>,
}

impl<T: MessagesTransport> InstrumentedClient<T> {
    /// The wrapped transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Retry policy applied to each call.
    pub fn retry(&self) -> &RetryDecorator {
        &self.retry
    }

    /// Sends a Messages call. On exhausted retries the last provider error
    /// is returned as-is, after being recorded.
    pub async fn create_message(&self, arguments: &CallArguments) -> Result<Value, ProviderError> {
        let id = CallId::new_random();
        let provider = self.transport.provider();
        let span = info_span!("provider_call", call_id = %id, provider = %provider);

        async move {
            let started_at = Timestamp::now();
            let input = safe_extract_input_parameters(arguments);
            let result = self
                .retry
                .call(|| self.transport.create_message(arguments))
                .await;
            self.observer
                .on_call(&call_record(id, provider, started_at, input, &result));
            result
        }
        .instrument(span)
        .await
    }
}

/// Synchronous counterpart of [`InstrumentedClient`].
pub struct BlockingInstrumentedClient<T> {
    inner: InstrumentedClient<T>,
    runtime: tokio::runtime::Runtime,
}

impl<T: MessagesTransport> BlockingInstrumentedClient<T> {
    /// The wrapped transport.
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// Retry policy applied to each call.
    pub fn retry(&self) -> &RetryDecorator {
        &self.inner.retry
    }

    /// Sends a Messages call, blocking the current thread.
    pub fn create_message(&self, arguments: &CallArguments) -> Result<Value, ProviderError> {
        let id = CallId::new_random();
        let provider = self.inner.transport.provider();
        let span = info_span!("provider_call", call_id = %id, provider = %provider);
        let _entered = span.enter();

        let started_at = Timestamp::now();
        let input = safe_extract_input_parameters(arguments);
        let result = self
            .inner
            .retry
            .call_blocking(&self.runtime, || self.inner.transport.create_message(arguments));
        self.inner
            .observer
            .on_call(&call_record(id, provider, started_at, input, &result));
        result
    }
}

fn call_record(
    id: CallId,
    provider: ProviderSlug,
    started_at: Timestamp,
    input: InputParameters,
    result: &Result<Value, ProviderError>,
) -> CallRecord {
    let (output, error) = match result {
        Ok(response) => (Some(safe_extract_output_parameters(response, &input)), None),
        Err(err) => (None, Some(err.to_string())),
    };
    CallRecord {
        id,
        provider,
        started_at,
        finished_at: Timestamp::now(),
        input,
        output,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::RecordingObserver;
    use async_trait::async_trait;
    use schema::{TokenUsage, UNRESOLVED_MODEL};
    use serde_json::json;
    use settings::{RetrySettings, SdkRetryProviders};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct ScriptedTransport {
        replies: Mutex<VecDeque<Result<Value, ProviderError>>>,
        calls: AtomicU32,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<Result<Value, ProviderError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MessagesTransport for ScriptedTransport {
        fn provider(&self) -> ProviderSlug {
            ProviderSlug::Anthropic
        }

        async fn create_message(&self, _arguments: &CallArguments) -> Result<Value, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ProviderError::Cancelled))
        }
    }

    struct SlowTransport {
        calls: AtomicU32,
    }

    #[async_trait]
    impl MessagesTransport for SlowTransport {
        fn provider(&self) -> ProviderSlug {
            ProviderSlug::Anthropic
        }

        async fn create_message(&self, _arguments: &CallArguments) -> Result<Value, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(tool_response())
        }
    }

    fn fast_settings(max_attempts: u32) -> Settings {
        let mut settings = Settings::default();
        settings.retry = RetrySettings {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
            ..RetrySettings::default()
        };
        settings
    }

    fn arguments() -> CallArguments {
        let Value::Object(map) = json!({
            "model": "claude-haiku-4-5",
            "max_tokens": 64,
            "tools": [{"name": "search", "description": "web search", "input_schema": {}}],
            "messages": [{"role": "user", "content": "find rust"}]
        }) else {
            unreachable!()
        };
        map
    }

    fn tool_response() -> Value {
        json!({
            "type": "message",
            "role": "assistant",
            "content": [{"type": "tool_use", "id": "t1", "name": "search", "input": {"q": "rust"}}],
            "usage": {"input_tokens": 20, "output_tokens": 7}
        })
    }

    #[test]
    fn install_is_idempotent() {
        let first = install();
        let second = install();
        match (first, second) {
            (Ok(a), Ok(b)) => assert!(std::ptr::eq(a, b)),
            (Err(a), Err(b)) => assert_eq!(a, b),
            _ => panic!("install changed its answer"),
        }
    }

    #[cfg(not(feature = "anthropic"))]
    #[test]
    fn install_without_feature_explains_how_to_enable() {
        let err = install().unwrap_err();
        assert_eq!(err.provider, ProviderSlug::Anthropic);
        assert!(err.guidance.contains("anthropic"));
    }

    #[tokio::test]
    async fn successful_call_is_recorded_and_returned_unchanged() {
        let observer = Arc::new(RecordingObserver::new());
        let transport = ScriptedTransport::new(vec![Ok(tool_response())]);
        let client = AnthropicAdapter { _private: () }.wrap(
            transport,
            &fast_settings(3),
            observer.clone(),
        );

        let response = client.create_message(&arguments()).await.unwrap();
        assert_eq!(response, tool_response());

        let records = observer.take();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert!(record.succeeded());
        assert_eq!(record.input.model(), Some("claude-haiku-4-5"));
        assert_eq!(record.input.input(), "find rust");
        let output = record.output.as_ref().unwrap();
        assert_eq!(output.usage, Some(TokenUsage::new(20, 7)));
        let calls = output.tools_called.as_ref().unwrap();
        assert_eq!(calls[0].description.as_deref(), Some("web search"));
    }

    #[tokio::test]
    async fn transient_failures_are_retried_by_this_layer() {
        let observer = Arc::new(RecordingObserver::new());
        let transport = ScriptedTransport::new(vec![
            Err(ProviderError::Timeout { message: "slow".into() }),
            Ok(tool_response()),
        ]);
        let client = AnthropicAdapter { _private: () }.wrap(
            transport,
            &fast_settings(3),
            observer.clone(),
        );

        assert!(client.create_message(&arguments()).await.is_ok());
        assert_eq!(client.transport().calls(), 2);
        assert_eq!(observer.len(), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_the_provider_error() {
        let observer = Arc::new(RecordingObserver::new());
        let transport = ScriptedTransport::new(vec![]);
        let client = AnthropicAdapter { _private: () }.wrap(
            transport,
            &fast_settings(2),
            observer.clone(),
        );

        let err = client.create_message(&arguments()).await.unwrap_err();
        assert_eq!(err, ProviderError::Cancelled);
        assert_eq!(client.transport().calls(), 2);

        let record = observer.take().remove(0);
        assert!(!record.succeeded());
        assert!(record.output.is_none());
        assert_eq!(record.error, Some(ProviderError::Cancelled.to_string()));
    }

    #[tokio::test]
    async fn sdk_retries_make_the_wrapper_a_passthrough() {
        let mut settings = fast_settings(5);
        settings.sdk_retry_providers = SdkRetryProviders::All;
        let transport = ScriptedTransport::new(vec![]);
        let client = AnthropicAdapter { _private: () }.wrap(
            transport,
            &settings,
            Arc::new(RecordingObserver::new()),
        );

        assert!(client.create_message(&arguments()).await.is_err());
        assert_eq!(client.transport().calls(), 1);
    }

    #[tokio::test]
    async fn malformed_shapes_degrade_without_failing_the_call() {
        let observer = Arc::new(RecordingObserver::new());
        let odd = json!({"completion": "legacy shape"});
        let transport = ScriptedTransport::new(vec![Ok(odd.clone())]);
        let client = AnthropicAdapter { _private: () }.wrap(
            transport,
            &fast_settings(1),
            observer.clone(),
        );

        let Value::Object(legacy) = json!({"prompt": "hi", "messages": "oops"}) else {
            unreachable!()
        };
        assert_eq!(client.create_message(&legacy).await.unwrap(), odd);

        let record = observer.take().remove(0);
        assert_eq!(record.input.model(), Some(UNRESOLVED_MODEL));
        assert_eq!(record.output, Some(Default::default()));
    }

    #[test]
    fn blocking_client_matches_async_behaviour() {
        let observer = Arc::new(RecordingObserver::new());
        let transport = ScriptedTransport::new(vec![
            Err(ProviderError::Connection { message: "reset".into() }),
            Ok(tool_response()),
        ]);
        let client = AnthropicAdapter { _private: () }
            .wrap_blocking(transport, &fast_settings(3), observer.clone())
            .unwrap();

        assert_eq!(client.create_message(&arguments()).unwrap(), tool_response());
        assert_eq!(client.transport().calls(), 2);
        assert!(observer.take()[0].succeeded());
    }

    #[test]
    fn blocking_client_times_out_slow_attempts() {
        let observer = Arc::new(RecordingObserver::new());
        let mut settings = fast_settings(2);
        settings.per_attempt_timeout = Some(Duration::from_millis(10));
        let client = AnthropicAdapter { _private: () }
            .wrap_blocking(
                SlowTransport {
                    calls: AtomicU32::new(0),
                },
                &settings,
                observer.clone(),
            )
            .unwrap();

        let err = client.create_message(&arguments()).unwrap_err();
        assert!(matches!(err, ProviderError::Timeout { .. }));
        assert_eq!(client.transport().calls.load(Ordering::SeqCst), 2);
        assert!(!observer.take()[0].succeeded());
    }
}
