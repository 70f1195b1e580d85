//! HTTP transport for the Anthropic Messages endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use schema::{CallArguments, MessagesTransport, ProviderError, ProviderSlug};
use serde_json::Value;
use settings::{SettingKey, Settings};
use tracing::debug;

use crate::errors::ClientError;
use crate::http::{send_json, with_native_retries, DEFAULT_NATIVE_RETRY_DELAY};
use crate::retry::client_max_retries;

/// Public Messages API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
/// Value of the `anthropic-version` request header.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
/// Native retries used when SDK retries are enabled for Anthropic.
pub const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Sends Messages requests verbatim and returns the raw JSON response.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: Client,
    api_key: String,
    messages_url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl AnthropicClient {
    /// Starts a builder with every field unset.
    pub fn builder() -> AnthropicClientBuilder {
        AnthropicClientBuilder::default()
    }

    /// Native retry count in effect, after the retry-layer override.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

#[async_trait]
impl MessagesTransport for AnthropicClient {
    fn provider(&self) -> ProviderSlug {
        ProviderSlug::Anthropic
    }

    async fn create_message(&self, arguments: &CallArguments) -> Result<Value, ProviderError> {
        with_native_retries(self.max_retries, self.retry_delay, || {
            debug!(url = %self.messages_url, "POST messages");
            send_json(
                self.http
                    .post(&self.messages_url)
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .json(arguments),
            )
        })
        .await
    }
}

/// Builder for [`AnthropicClient`]. Unset fields fall back to settings and
/// defaults.
#[derive(Debug, Clone, Default)]
pub struct AnthropicClientBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    timeout: Option<Duration>,
    max_retries: Option<u32>,
    retry_delay: Option<Duration>,
}

impl AnthropicClientBuilder {
    /// Explicit API key; takes precedence over every configured source.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// API root, without the `/v1/messages` path.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Whole-request timeout for the HTTP client.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Requested native retry count. Forced to zero unless SDK retries are
    /// enabled for Anthropic.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// First native retry delay, doubled per retry.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Resolves the API key and builds the client.
    ///
    /// Fails with a configuration error when no key is found.
    pub fn build(self, settings: &Settings) -> Result<AnthropicClient, ClientError> {
        let api_key = settings.require(
            ProviderSlug::Anthropic,
            SettingKey::AnthropicApiKey,
            self.api_key.as_deref(),
        )?;
        let http = Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()?;
        let base_url = self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        Ok(AnthropicClient {
            http,
            api_key,
            messages_url: format!("{}/v1/messages", base_url.trim_end_matches('/')),
            max_retries: client_max_retries(
                ProviderSlug::Anthropic,
                settings,
                self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            ),
            retry_delay: self.retry_delay.unwrap_or(DEFAULT_NATIVE_RETRY_DELAY),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema::ConfigurationError;
    use settings::SdkRetryProviders;

    #[test]
    fn missing_key_is_a_configuration_error() {
        let err = AnthropicClient::builder()
            .build(&Settings::default())
            .unwrap_err();
        match err {
            ClientError::Configuration(ConfigurationError::MissingCredential { provider, env_var, .. }) => {
                assert_eq!(provider, ProviderSlug::Anthropic);
                assert_eq!(env_var, "ANTHROPIC_API_KEY");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn explicit_key_beats_settings() {
        let mut settings = Settings::default();
        settings.set_credential(SettingKey::AnthropicApiKey, Some("from-settings".into()));
        let client = AnthropicClient::builder()
            .api_key("explicit")
            .build(&settings)
            .unwrap();
        assert_eq!(client.api_key, "explicit");

        let client = AnthropicClient::builder().build(&settings).unwrap();
        assert_eq!(client.api_key, "from-settings");
    }

    #[test]
    fn native_retries_are_zeroed_unless_sdk_retries_enabled() {
        let mut settings = Settings::default();
        settings.set_credential(SettingKey::AnthropicApiKey, Some("k".into()));
        let client = AnthropicClient::builder()
            .max_retries(4)
            .build(&settings)
            .unwrap();
        assert_eq!(client.max_retries(), 0);

        settings.sdk_retry_providers = SdkRetryProviders::All;
        let client = AnthropicClient::builder()
            .max_retries(4)
            .build(&settings)
            .unwrap();
        assert_eq!(client.max_retries(), 4);
        let client = AnthropicClient::builder().build(&settings).unwrap();
        assert_eq!(client.max_retries(), DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn base_url_trailing_slash_is_ignored() {
        let mut settings = Settings::default();
        settings.set_credential(SettingKey::AnthropicApiKey, Some("k".into()));
        let client = AnthropicClient::builder()
            .base_url("http://localhost:9000/")
            .build(&settings)
            .unwrap();
        assert_eq!(client.messages_url, "http://localhost:9000/v1/messages");
    }
}
