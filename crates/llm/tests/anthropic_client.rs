//! End-to-end tests of the Anthropic transport and the instrumented client
//! against a local mock of the Messages endpoint.

#![cfg(feature = "anthropic")]

use std::sync::Arc;
use std::time::Duration;

use llm::{intercept, AnthropicClient, RecordingObserver};
use schema::{CallArguments, MessagesTransport, ProviderError, TokenUsage};
use serde_json::{json, Value};
use settings::{Environment, KeyStore, SettingKey, Settings, SettingsOptions, SettingsStore};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store(dir: &tempfile::TempDir, pairs: &[(&str, &str)]) -> SettingsStore {
    let env = Environment::from_pairs(pairs.iter().copied())
        .with("EVALKIT_RETRY_INITIAL_SECONDS", "0")
        .with("EVALKIT_RETRY_JITTER", "false");
    SettingsStore::load(SettingsOptions::isolated(env, KeyStore::in_dir(dir.path())))
        .expect("settings load")
}

fn arguments() -> CallArguments {
    let Value::Object(map) = json!({
        "model": "claude-sonnet-4-5",
        "max_tokens": 128,
        "tools": [{"name": "get_weather", "description": "Current weather", "input_schema": {"type": "object"}}],
        "messages": [{"role": "user", "content": "Weather in Oslo?"}]
    }) else {
        unreachable!()
    };
    map
}

fn tool_use_response() -> Value {
    json!({
        "id": "msg_01",
        "type": "message",
        "role": "assistant",
        "model": "claude-sonnet-4-5",
        "content": [
            {"type": "text", "text": "Checking."},
            {"type": "tool_use", "id": "toolu_01", "name": "get_weather", "input": {"city": "Oslo"}}
        ],
        "stop_reason": "tool_use",
        "usage": {"input_tokens": 31, "output_tokens": 12}
    })
}

fn client(server: &MockServer, settings: &Settings) -> AnthropicClient {
    AnthropicClient::builder()
        .base_url(server.uri())
        .retry_delay(Duration::ZERO)
        .build(settings)
        .expect("client builds")
}

#[tokio::test]
async fn sends_arguments_verbatim_with_auth_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "env-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({"model": "claude-sonnet-4-5", "max_tokens": 128})))
        .respond_with(ResponseTemplate::new(200).set_body_json(tool_use_response()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir, &[("ANTHROPIC_API_KEY", "env-key")]);
    let client = client(&server, &store.snapshot());

    let response = client.create_message(&arguments()).await.unwrap();
    assert_eq!(response, tool_use_response());
}

#[tokio::test]
async fn instrumented_client_records_extracted_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tool_use_response()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir, &[("ANTHROPIC_API_KEY", "k")]);
    let settings = store.snapshot();
    let observer = Arc::new(RecordingObserver::new());
    let instrumented = intercept::install()
        .unwrap()
        .wrap(client(&server, &settings), &settings, observer.clone());

    let response = instrumented.create_message(&arguments()).await.unwrap();
    assert_eq!(response, tool_use_response());

    let record = observer.take().remove(0);
    assert!(record.succeeded());
    assert_eq!(record.input.input(), "Weather in Oslo?");
    let output = record.output.unwrap();
    assert_eq!(output.usage, Some(TokenUsage::new(31, 12)));
    let tools = output.tools_called.unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "get_weather");
    assert_eq!(tools[0].input_parameters, json!({"city": "Oslo"}));
    assert_eq!(tools[0].description.as_deref(), Some("Current weather"));
}

#[tokio::test]
async fn managed_retries_replace_native_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tool_use_response()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = store(
        &dir,
        &[("ANTHROPIC_API_KEY", "k"), ("EVALKIT_RETRY_MAX_ATTEMPTS", "3")],
    );
    let settings = store.snapshot();
    let transport = client(&server, &settings);
    assert_eq!(transport.max_retries(), 0);

    let observer = Arc::new(RecordingObserver::new());
    let instrumented = intercept::install()
        .unwrap()
        .wrap(transport, &settings, observer.clone());

    assert!(instrumented.create_message(&arguments()).await.is_ok());
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
    assert_eq!(observer.len(), 1);
}

#[tokio::test]
async fn sdk_retries_leave_retrying_to_the_transport() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = store(
        &dir,
        &[("ANTHROPIC_API_KEY", "k"), ("EVALKIT_SDK_RETRY_PROVIDERS", "anthropic")],
    );
    let settings = store.snapshot();
    let transport = client(&server, &settings);
    assert_eq!(transport.max_retries(), 2);

    let instrumented = intercept::install().unwrap().wrap(
        transport,
        &settings,
        Arc::new(RecordingObserver::new()),
    );
    assert!(instrumented.retry().is_passthrough());

    let err = instrumented.create_message(&arguments()).await.unwrap_err();
    assert!(matches!(err, ProviderError::Http { status: 503, .. }));
    // one call from this layer, three attempts from the transport
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"type": "error", "error": {"type": "invalid_request_error"}})),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir, &[("ANTHROPIC_API_KEY", "k")]);
    let settings = store.snapshot();
    let observer = Arc::new(RecordingObserver::new());
    let instrumented = intercept::install()
        .unwrap()
        .wrap(client(&server, &settings), &settings, observer.clone());

    let err = instrumented.create_message(&arguments()).await.unwrap_err();
    match &err {
        ProviderError::Http { status, body, .. } => {
            assert_eq!(*status, 400);
            assert!(body.contains("invalid_request_error"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
    assert_eq!(observer.take()[0].error, Some(err.to_string()));
}

#[tokio::test]
async fn persisted_key_is_used_when_environment_is_silent() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir, &[]);
    store
        .edit(true, |s| {
            s.set_credential(SettingKey::AnthropicApiKey, Some("stored".into()));
            Ok::<_, settings::SettingsError>(())
        })
        .unwrap();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("x-api-key", "stored"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tool_use_response()))
        .expect(1)
        .mount(&server)
        .await;

    let fresh = store.reset(false).unwrap();
    let client = client(&server, &fresh);
    client.create_message(&arguments()).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn blocking_client_round_trips() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tool_use_response()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = store(&dir, &[("ANTHROPIC_API_KEY", "k")]);
    let settings = store.snapshot();
    let transport = client(&server, &settings);
    let observer = Arc::new(RecordingObserver::new());
    let recorded = observer.clone();

    // The blocking client owns a runtime, so it runs on a plain thread.
    let worker = std::thread::spawn(move || {
        let blocking = intercept::install()
            .unwrap()
            .wrap_blocking(transport, &settings, observer)
            .unwrap();
        blocking.create_message(&arguments())
    });
    let response = tokio::task::spawn_blocking(move || worker.join().unwrap())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(response, tool_use_response());
    assert_eq!(recorded.len(), 1);
}
