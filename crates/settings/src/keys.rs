//! Credential keys known to the settings store.

use std::str::FromStr;

use schema::ProviderSlug;

use crate::SettingsError;

/// A credential field.
///
/// Each key has a settings name (used in the key-store file and on the
/// command line) and an environment variable. Both resolve with the same
/// precedence: explicit argument, then environment, then key store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SettingKey {
    /// Anthropic API key.
    AnthropicApiKey,
    /// Azure OpenAI API key.
    AzureOpenAiApiKey,
    /// Azure OpenAI REST API version, e.g. `2024-02-01`.
    OpenAiApiVersion,
    /// Azure OpenAI resource endpoint.
    AzureOpenAiEndpoint,
    /// Azure chat deployment name.
    AzureDeploymentName,
    /// Azure embedding deployment name.
    AzureEmbeddingDeploymentName,
    /// API key for the evaluation platform that receives results.
    PlatformApiKey,
}

impl SettingKey {
    /// Every credential key.
    pub const ALL: [SettingKey; 7] = [
        SettingKey::AnthropicApiKey,
        SettingKey::AzureOpenAiApiKey,
        SettingKey::OpenAiApiVersion,
        SettingKey::AzureOpenAiEndpoint,
        SettingKey::AzureDeploymentName,
        SettingKey::AzureEmbeddingDeploymentName,
        SettingKey::PlatformApiKey,
    ];

    /// Name used in the key-store file and by `evalkit settings`.
    pub fn as_str(self) -> &'static str {
        match self {
            SettingKey::AnthropicApiKey => "anthropic_api_key",
            SettingKey::AzureOpenAiApiKey => "azure_openai_api_key",
            SettingKey::OpenAiApiVersion => "openai_api_version",
            SettingKey::AzureOpenAiEndpoint => "azure_openai_endpoint",
            SettingKey::AzureDeploymentName => "azure_deployment_name",
            SettingKey::AzureEmbeddingDeploymentName => "azure_embedding_deployment_name",
            SettingKey::PlatformApiKey => "platform_api_key",
        }
    }

    /// Environment variable that supplies this key.
    pub fn env_var(self) -> &'static str {
        match self {
            SettingKey::AnthropicApiKey => "ANTHROPIC_API_KEY",
            SettingKey::AzureOpenAiApiKey => "AZURE_OPENAI_API_KEY",
            SettingKey::OpenAiApiVersion => "OPENAI_API_VERSION",
            SettingKey::AzureOpenAiEndpoint => "AZURE_OPENAI_ENDPOINT",
            SettingKey::AzureDeploymentName => "AZURE_DEPLOYMENT_NAME",
            SettingKey::AzureEmbeddingDeploymentName => "AZURE_EMBEDDING_DEPLOYMENT_NAME",
            SettingKey::PlatformApiKey => "EVALKIT_API_KEY",
        }
    }

    /// Returns `true` for values that must be masked when displayed.
    pub fn is_secret(self) -> bool {
        matches!(
            self,
            SettingKey::AnthropicApiKey | SettingKey::AzureOpenAiApiKey | SettingKey::PlatformApiKey
        )
    }

    /// Provider this key belongs to, if it is provider-specific.
    pub fn provider(self) -> Option<ProviderSlug> {
        match self {
            SettingKey::AnthropicApiKey => Some(ProviderSlug::Anthropic),
            SettingKey::AzureOpenAiApiKey
            | SettingKey::OpenAiApiVersion
            | SettingKey::AzureOpenAiEndpoint
            | SettingKey::AzureDeploymentName
            | SettingKey::AzureEmbeddingDeploymentName => Some(ProviderSlug::Azure),
            SettingKey::PlatformApiKey => None,
        }
    }
}

impl std::fmt::Display for SettingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingKey {
    type Err = SettingsError;

    /// Accepts either the settings name or the environment variable name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        SettingKey::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s) || k.env_var() == s)
            .ok_or_else(|| SettingsError::UnknownKey(s.to_string()))
    }
}
