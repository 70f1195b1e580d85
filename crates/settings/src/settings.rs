//! The [`Settings`] value: credentials, flags, and retry configuration.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use schema::{ConfigurationError, ProviderSlug};

use crate::{Environment, SettingKey, SettingsError};

// ---------------------------------------------------------------------------
// Environment variable names
// ---------------------------------------------------------------------------

pub const TELEMETRY_OPT_OUT_VAR: &str = "EVALKIT_TELEMETRY_OPT_OUT";
pub const SDK_RETRY_PROVIDERS_VAR: &str = "EVALKIT_SDK_RETRY_PROVIDERS";
pub const RETRY_MAX_ATTEMPTS_VAR: &str = "EVALKIT_RETRY_MAX_ATTEMPTS";
pub const RETRY_INITIAL_SECONDS_VAR: &str = "EVALKIT_RETRY_INITIAL_SECONDS";
pub const RETRY_EXP_BASE_VAR: &str = "EVALKIT_RETRY_EXP_BASE";
pub const RETRY_CAP_SECONDS_VAR: &str = "EVALKIT_RETRY_CAP_SECONDS";
pub const RETRY_JITTER_VAR: &str = "EVALKIT_RETRY_JITTER";
pub const PER_ATTEMPT_TIMEOUT_VAR: &str = "EVALKIT_PER_ATTEMPT_TIMEOUT_SECONDS";

// ---------------------------------------------------------------------------
// Retry configuration
// ---------------------------------------------------------------------------

/// Which providers keep their client's own retry behaviour.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SdkRetryProviders {
    /// Every provider is retried by this layer (the default).
    #[default]
    None,
    /// Only the listed providers use their client's native retries.
    Only(BTreeSet<ProviderSlug>),
    /// Every provider uses its client's native retries (`*`).
    All,
}

impl SdkRetryProviders {
    /// Returns `true` if `provider` retries natively.
    pub fn contains(&self, provider: ProviderSlug) -> bool {
        match self {
            SdkRetryProviders::None => false,
            SdkRetryProviders::Only(set) => set.contains(&provider),
            SdkRetryProviders::All => true,
        }
    }

    /// Parses a comma-separated list of provider slugs, or `*`.
    pub fn parse(raw: &str) -> Result<Self, SettingsError> {
        let mut set = BTreeSet::new();
        for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if item == "*" {
                return Ok(SdkRetryProviders::All);
            }
            let slug = item
                .parse::<ProviderSlug>()
                .map_err(|e| SettingsError::InvalidValue {
                    name: SDK_RETRY_PROVIDERS_VAR.to_string(),
                    message: e.to_string(),
                })?;
            set.insert(slug);
        }
        Ok(if set.is_empty() {
            SdkRetryProviders::None
        } else {
            SdkRetryProviders::Only(set)
        })
    }
}

/// Bounded exponential back-off parameters applied by this layer.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrySettings {
    /// Total attempts including the first; at least 1.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Multiplier applied per further attempt.
    pub exp_base: f64,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Randomise each delay by ±10%.
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            exp_base: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Resolved configuration for one store generation.
///
/// Readers hold an `Arc<Settings>` snapshot. Changes go through
/// [`crate::SettingsStore::edit`], which publishes a new snapshot atomically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    credentials: BTreeMap<SettingKey, String>,
    // Keys assigned through `set_credential` on this working copy.
    edited: BTreeSet<SettingKey>,
    /// Suppresses telemetry emission.
    pub telemetry_opt_out: bool,
    /// Providers whose clients retry natively.
    pub sdk_retry_providers: SdkRetryProviders,
    /// Back-off applied when this layer owns retries.
    pub retry: RetrySettings,
    /// Deadline for each individual attempt, if any.
    pub per_attempt_timeout: Option<Duration>,
}

impl Settings {
    /// Derives settings from an environment and the key-store contents.
    ///
    /// For credentials the environment wins over the key store.
    pub fn from_sources(
        env: &Environment,
        stored: &BTreeMap<String, String>,
    ) -> Result<Self, SettingsError> {
        let credentials = SettingKey::ALL
            .into_iter()
            .filter_map(|key| {
                env.get(key.env_var())
                    .map(str::to_string)
                    .or_else(|| stored.get(key.as_str()).filter(|v| !v.is_empty()).cloned())
                    .map(|v| (key, v))
            })
            .collect();

        let defaults = RetrySettings::default();
        let retry = RetrySettings {
            max_attempts: env
                .number::<u32>(RETRY_MAX_ATTEMPTS_VAR)?
                .unwrap_or(defaults.max_attempts)
                .max(1),
            initial_delay: seconds(env, RETRY_INITIAL_SECONDS_VAR)?
                .unwrap_or(defaults.initial_delay),
            exp_base: env
                .number::<f64>(RETRY_EXP_BASE_VAR)?
                .unwrap_or(defaults.exp_base),
            max_delay: seconds(env, RETRY_CAP_SECONDS_VAR)?.unwrap_or(defaults.max_delay),
            jitter: env.flag(RETRY_JITTER_VAR)?.unwrap_or(defaults.jitter),
        };
        if !(retry.exp_base.is_finite() && retry.exp_base >= 1.0) {
            return Err(SettingsError::InvalidValue {
                name: RETRY_EXP_BASE_VAR.to_string(),
                message: format!("must be a finite number >= 1, got {}", retry.exp_base),
            });
        }

        Ok(Self {
            credentials,
            edited: BTreeSet::new(),
            telemetry_opt_out: env.flag(TELEMETRY_OPT_OUT_VAR)?.unwrap_or(false),
            sdk_retry_providers: env
                .get(SDK_RETRY_PROVIDERS_VAR)
                .map(SdkRetryProviders::parse)
                .transpose()?
                .unwrap_or_default(),
            retry,
            per_attempt_timeout: seconds(env, PER_ATTEMPT_TIMEOUT_VAR)?,
        })
    }

    /// Current value of a credential (environment or key store).
    pub fn credential(&self, key: SettingKey) -> Option<&str> {
        self.credentials.get(&key).map(String::as_str)
    }

    /// Sets or clears a credential on this (working) copy.
    ///
    /// The key is recorded as edited even when the value is unchanged, so a
    /// persisting edit writes it to the key store regardless of where the
    /// current value came from.
    pub fn set_credential(&mut self, key: SettingKey, value: Option<String>) {
        self.edited.insert(key);
        match value.filter(|v| !v.is_empty()) {
            Some(v) => self.credentials.insert(key, v),
            None => self.credentials.remove(&key),
        };
    }

    /// Resolves a credential: explicit argument > environment > key store > `None`.
    pub fn resolve(&self, key: SettingKey, explicit: Option<&str>) -> Option<String> {
        explicit
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.credential(key))
            .map(str::to_string)
    }

    /// Like [`Settings::resolve`], but a missing value is a configuration error
    /// attributed to `provider`.
    pub fn require(
        &self,
        provider: ProviderSlug,
        key: SettingKey,
        explicit: Option<&str>,
    ) -> Result<String, ConfigurationError> {
        self.resolve(key, explicit)
            .ok_or_else(|| ConfigurationError::MissingCredential {
                provider,
                setting: key.as_str().to_string(),
                env_var: key.env_var().to_string(),
            })
    }

    /// Returns `true` if `provider`'s client keeps its native retries, in which
    /// case this layer does not retry.
    pub fn sdk_retries_for(&self, provider: ProviderSlug) -> bool {
        self.sdk_retry_providers.contains(provider)
    }

    /// Credentials assigned on this copy, as key-store changes.
    pub(crate) fn edited_credentials(&self) -> Vec<(SettingKey, Option<String>)> {
        self.edited
            .iter()
            .map(|k| (*k, self.credential(*k).map(str::to_string)))
            .collect()
    }

    pub(crate) fn clear_edits(&mut self) {
        self.edited.clear();
    }
}

fn seconds(env: &Environment, name: &str) -> Result<Option<Duration>, SettingsError> {
    env.number::<f64>(name)?
        .map(|secs| {
            Duration::try_from_secs_f64(secs).map_err(|e| SettingsError::InvalidValue {
                name: name.to_string(),
                message: e.to_string(),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_from_empty_sources() {
        let s = Settings::from_sources(&Environment::default(), &BTreeMap::new()).unwrap();
        assert_eq!(s, Settings::default());
        assert!(!s.sdk_retries_for(ProviderSlug::Anthropic));
        assert_eq!(s.retry.max_attempts, 5);
    }

    #[test]
    fn explicit_then_env_then_key_store() {
        let ks = stored(&[("anthropic_api_key", "from-store")]);

        let env = Environment::from_pairs([("ANTHROPIC_API_KEY", "from-env")]);
        let s = Settings::from_sources(&env, &ks).unwrap();
        assert_eq!(
            s.resolve(SettingKey::AnthropicApiKey, Some("explicit")).as_deref(),
            Some("explicit")
        );
        assert_eq!(
            s.resolve(SettingKey::AnthropicApiKey, None).as_deref(),
            Some("from-env")
        );

        let s = Settings::from_sources(&Environment::default(), &ks).unwrap();
        assert_eq!(
            s.resolve(SettingKey::AnthropicApiKey, None).as_deref(),
            Some("from-store")
        );

        let s = Settings::from_sources(&Environment::default(), &BTreeMap::new()).unwrap();
        assert_eq!(s.resolve(SettingKey::AnthropicApiKey, None), None);
    }

    #[test]
    fn blank_explicit_argument_falls_through() {
        let env = Environment::from_pairs([("ANTHROPIC_API_KEY", "from-env")]);
        let s = Settings::from_sources(&env, &BTreeMap::new()).unwrap();
        assert_eq!(
            s.resolve(SettingKey::AnthropicApiKey, Some("  ")).as_deref(),
            Some("from-env")
        );
    }

    #[test]
    fn require_reports_missing_credential() {
        let s = Settings::default();
        let err = s
            .require(ProviderSlug::Azure, SettingKey::AzureOpenAiEndpoint, None)
            .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::MissingCredential {
                provider: ProviderSlug::Azure,
                setting: "azure_openai_endpoint".into(),
                env_var: "AZURE_OPENAI_ENDPOINT".into(),
            }
        );
    }

    #[test]
    fn sdk_retry_providers_parse() {
        assert_eq!(SdkRetryProviders::parse("").unwrap(), SdkRetryProviders::None);
        assert_eq!(SdkRetryProviders::parse("azure, *").unwrap(), SdkRetryProviders::All);
        let only = SdkRetryProviders::parse("anthropic,azure").unwrap();
        assert!(only.contains(ProviderSlug::Azure));
        assert!(!only.contains(ProviderSlug::OpenAi));
        assert!(SdkRetryProviders::parse("anthropic,cohere").is_err());
    }

    #[test]
    fn retry_knobs_from_env() {
        let env = Environment::from_pairs([
            (RETRY_MAX_ATTEMPTS_VAR, "0"),
            (RETRY_INITIAL_SECONDS_VAR, "0.25"),
            (RETRY_JITTER_VAR, "false"),
            (PER_ATTEMPT_TIMEOUT_VAR, "12"),
            (SDK_RETRY_PROVIDERS_VAR, "azure"),
        ]);
        let s = Settings::from_sources(&env, &BTreeMap::new()).unwrap();
        assert_eq!(s.retry.max_attempts, 1);
        assert_eq!(s.retry.initial_delay, Duration::from_millis(250));
        assert!(!s.retry.jitter);
        assert_eq!(s.per_attempt_timeout, Some(Duration::from_secs(12)));
        assert!(s.sdk_retries_for(ProviderSlug::Azure));
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let env = Environment::from_pairs([(RETRY_CAP_SECONDS_VAR, "-3")]);
        assert!(Settings::from_sources(&env, &BTreeMap::new()).is_err());
        let env = Environment::from_pairs([(RETRY_EXP_BASE_VAR, "0.5")]);
        assert!(Settings::from_sources(&env, &BTreeMap::new()).is_err());
    }

    #[test]
    fn edited_credentials_include_unchanged_assignments() {
        let env = Environment::from_pairs([("ANTHROPIC_API_KEY", "k-env")]);
        let mut s = Settings::from_sources(&env, &BTreeMap::new()).unwrap();
        assert!(s.edited_credentials().is_empty());

        s.set_credential(SettingKey::AnthropicApiKey, Some("k-env".into()));
        s.set_credential(SettingKey::PlatformApiKey, None);
        assert_eq!(
            s.edited_credentials(),
            vec![
                (SettingKey::AnthropicApiKey, Some("k-env".to_string())),
                (SettingKey::PlatformApiKey, None)
            ]
        );

        s.clear_edits();
        assert!(s.edited_credentials().is_empty());
        assert_eq!(s.credential(SettingKey::AnthropicApiKey), Some("k-env"));
    }
}
