//! Azure OpenAI embedding model.
//!
//! Credentials resolve per field with the usual precedence: the value in
//! [`AzureEmbeddingConfig`], then the environment, then the key store.
//! Every request goes through the Azure retry decorator; the client's own
//! retry count is zero unless SDK retries are enabled for Azure.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use schema::{EmbeddingModel, ProviderError, ProviderSlug};
use serde::Deserialize;
use serde_json::{Map, Value};
use settings::{SettingKey, Settings};
use tracing::debug;

use crate::errors::ClientError;
use crate::http::{send_json, with_native_retries, DEFAULT_NATIVE_RETRY_DELAY};
use crate::retry::{build_retry_decorator, client_max_retries, RetryDecorator};

/// Native retries used when SDK retries are enabled for Azure.
pub const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Construction parameters. `None` fields fall back to settings.
#[derive(Debug, Clone, Default)]
pub struct AzureEmbeddingConfig {
    /// Overrides `AZURE_OPENAI_API_KEY`.
    pub api_key: Option<String>,
    /// Overrides `OPENAI_API_VERSION`.
    pub api_version: Option<String>,
    /// Overrides `AZURE_OPENAI_ENDPOINT`.
    pub endpoint: Option<String>,
    /// Overrides `AZURE_EMBEDDING_DEPLOYMENT_NAME`.
    pub deployment: Option<String>,
    /// Model name sent with each request; defaults to the deployment.
    pub model: Option<String>,
    /// Extra request body fields, e.g. `dimensions`.
    pub generation_kwargs: Map<String, Value>,
    /// Requested native retry count (see [`DEFAULT_MAX_RETRIES`]).
    pub max_retries: Option<u32>,
    /// Whole-request timeout for the HTTP client.
    pub timeout: Option<Duration>,
}

/// Embedding model backed by an Azure OpenAI deployment.
pub struct AzureEmbeddingModel {
    http: Client,
    api_key: String,
    url: String,
    model: String,
    generation_kwargs: Map<String, Value>,
    max_retries: u32,
    retry: RetryDecorator,
}

impl AzureEmbeddingModel {
    /// Resolves credentials and builds the model.
    ///
    /// Key, API version, endpoint and deployment are required, from `config`
    /// or from settings.
    pub fn new(config: AzureEmbeddingConfig, settings: &Settings) -> Result<Self, ClientError> {
        let require = |key, explicit: &Option<String>| {
            settings.require(ProviderSlug::Azure, key, explicit.as_deref())
        };
        let api_key = require(SettingKey::AzureOpenAiApiKey, &config.api_key)?;
        let api_version = require(SettingKey::OpenAiApiVersion, &config.api_version)?;
        let endpoint = require(SettingKey::AzureOpenAiEndpoint, &config.endpoint)?;
        let deployment = require(SettingKey::AzureEmbeddingDeploymentName, &config.deployment)?;

        let http = Client::builder()
            .timeout(config.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()?;
        Ok(Self {
            http,
            api_key,
            url: format!(
                "{}/openai/deployments/{deployment}/embeddings?api-version={api_version}",
                endpoint.trim_end_matches('/')
            ),
            model: config.model.unwrap_or_else(|| deployment.clone()),
            generation_kwargs: config.generation_kwargs,
            max_retries: client_max_retries(
                ProviderSlug::Azure,
                settings,
                config.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            ),
            retry: build_retry_decorator(ProviderSlug::Azure, settings),
        })
    }

    /// Native retry count in effect, after the retry-layer override.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Retry policy wrapped around each request.
    pub fn retry(&self) -> &RetryDecorator {
        &self.retry
    }

    /// Converts into a model usable from synchronous code.
    pub fn into_blocking(self) -> Result<BlockingAzureEmbeddingModel, ClientError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(BlockingAzureEmbeddingModel {
            inner: self,
            runtime,
        })
    }

    // One request with native retries only; the decorator wraps this.
    async fn request(&self, input: Value) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut body = self.generation_kwargs.clone();
        body.insert("input".to_string(), input);
        body.insert("model".to_string(), Value::String(self.model.clone()));

        let raw = with_native_retries(self.max_retries, DEFAULT_NATIVE_RETRY_DELAY, || {
            debug!(model = %self.model, "POST embeddings");
            send_json(
                self.http
                    .post(&self.url)
                    .header("api-key", &self.api_key)
                    .json(&body),
            )
        })
        .await?;
        parse_embeddings(raw)
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.request(Value::String(text.to_string()))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse {
                message: "embedding response contained no data".to_string(),
            })
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let input = Value::Array(texts.iter().cloned().map(Value::String).collect());
        self.request(input).await
    }
}

#[async_trait]
impl EmbeddingModel for AzureEmbeddingModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.retry.call(|| self.embed_one(text)).await
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        self.retry.call(|| self.embed_many(texts)).await
    }
}

/// [`AzureEmbeddingModel`] with a private runtime, for synchronous callers.
/// Must not be used from inside another tokio runtime.
pub struct BlockingAzureEmbeddingModel {
    inner: AzureEmbeddingModel,
    runtime: tokio::runtime::Runtime,
}

impl BlockingAzureEmbeddingModel {
    /// Model name sent with each request.
    pub fn model_name(&self) -> &str {
        &self.inner.model
    }

    /// Embeds one text, blocking the current thread.
    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.inner
            .retry
            .call_blocking(&self.runtime, || self.inner.embed_one(text))
    }

    /// Embeds several texts in one request, preserving order.
    pub fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        self.inner
            .retry
            .call_blocking(&self.runtime, || self.inner.embed_many(texts))
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

fn parse_embeddings(raw: Value) -> Result<Vec<Vec<f32>>, ProviderError> {
    let mut response: EmbeddingResponse =
        serde_json::from_value(raw).map_err(|e| ProviderError::InvalidResponse {
            message: format!("unexpected embedding response: {e}"),
        })?;
    response.data.sort_by_key(|item| item.index);
    Ok(response.data.into_iter().map(|item| item.embedding).collect())
}
