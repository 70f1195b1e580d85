//! Command-line surface and command handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use llm::{
    intercept, AnthropicClient, AzureEmbeddingConfig, AzureEmbeddingModel, RecordingObserver,
    TracingObserver,
};
use schema::{CallObserver, EmbeddingModel};
use serde_json::{Map, Value};
use settings::{SdkRetryProviders, SettingKey, Settings, SettingsError, SettingsStore};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "evalkit", version, about = "LLM evaluation harness adapters")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inspect or change stored settings.
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Send one instrumented Anthropic Messages call.
    Chat(ChatArgs),
    /// Embed texts with the Azure OpenAI embedding model.
    Embed(EmbedArgs),
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// Print the effective settings. Secrets are masked.
    Show {
        /// Print secrets in full.
        #[arg(long)]
        reveal: bool,
    },
    /// Set a credential.
    Set {
        key: SettingKey,
        value: String,
        /// Write the value to the key store.
        #[arg(long)]
        persist: bool,
    },
    /// Clear a credential.
    Unset {
        key: SettingKey,
        /// Remove the value from the key store.
        #[arg(long)]
        persist: bool,
    },
}

#[derive(Debug, Args)]
pub struct ChatArgs {
    /// JSON file with the Messages call arguments (`-` for stdin).
    pub arguments: PathBuf,
    /// Override the Messages API base URL.
    #[arg(long, env = "ANTHROPIC_BASE_URL")]
    pub base_url: Option<String>,
    /// Print the evaluation record instead of the raw response.
    #[arg(long)]
    pub record: bool,
}

#[derive(Debug, Args)]
pub struct EmbedArgs {
    /// Texts to embed, in order.
    #[arg(required = true)]
    pub texts: Vec<String>,
    /// Embedding deployment; defaults to `AZURE_EMBEDDING_DEPLOYMENT_NAME`.
    #[arg(long)]
    pub deployment: Option<String>,
    /// Requested output dimensions, if the model supports it.
    #[arg(long)]
    pub dimensions: Option<u32>,
}

pub async fn run(cli: Cli, store: &SettingsStore) -> anyhow::Result<()> {
    match cli.command {
        Command::Settings(command) => settings_command(command, store),
        Command::Chat(args) => chat(args, &store.snapshot()).await,
        Command::Embed(args) => embed(args, &store.snapshot()).await,
    }
}

fn settings_command(command: SettingsCommand, store: &SettingsStore) -> anyhow::Result<()> {
    let (key, value, persist) = match command {
        SettingsCommand::Show { reveal } => {
            print!("{}", describe(&store.snapshot(), store, reveal));
            return Ok(());
        }
        SettingsCommand::Set { key, value, persist } => (key, Some(value), persist),
        SettingsCommand::Unset { key, persist } => (key, None, persist),
    };

    store
        .edit(persist, |s| {
            s.set_credential(key, value);
            Ok::<_, SettingsError>(())
        })
        .with_context(|| format!("failed to update {key}"))?;

    if persist {
        info!(%key, path = %store.key_store().path().display(), "Key store updated");
    } else {
        eprintln!("{key} changed for this process only; pass --persist to store it");
    }
    Ok(())
}

fn describe(settings: &Settings, store: &SettingsStore, reveal: bool) -> String {
    let mut out = String::new();
    for key in SettingKey::ALL {
        let value = match settings.credential(key) {
            Some(v) if key.is_secret() && !reveal => mask(v),
            Some(v) => v.to_string(),
            None => "<unset>".to_string(),
        };
        out.push_str(&format!("{key} = {value}\n"));
    }
    let sdk = match &settings.sdk_retry_providers {
        SdkRetryProviders::None => "none".to_string(),
        SdkRetryProviders::All => "*".to_string(),
        SdkRetryProviders::Only(set) => set
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(","),
    };
    let retry = &settings.retry;
    out.push_str(&format!("telemetry_opt_out = {}\n", settings.telemetry_opt_out));
    out.push_str(&format!("sdk_retry_providers = {sdk}\n"));
    out.push_str(&format!(
        "retry = {} attempts, initial {:?}, base {}, cap {:?}, jitter {}\n",
        retry.max_attempts, retry.initial_delay, retry.exp_base, retry.max_delay, retry.jitter
    ));
    match settings.per_attempt_timeout {
        Some(t) => out.push_str(&format!("per_attempt_timeout = {t:?}\n")),
        None => out.push_str("per_attempt_timeout = <none>\n"),
    }
    out.push_str(&format!("key_store = {}\n", store.key_store().path().display()));
    out
}

fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "********".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}

async fn chat(args: ChatArgs, settings: &Settings) -> anyhow::Result<()> {
    let arguments = read_arguments(&args.arguments)?;

    let mut builder = AnthropicClient::builder();
    if let Some(url) = args.base_url {
        builder = builder.base_url(url);
    }
    let transport = builder.build(settings)?;

    let observer = Arc::new(RecordingObserver::new());
    let client = intercept::install()?.wrap(transport, settings, observer.clone());
    let result = client.create_message(&arguments).await;

    let records = observer.take();
    for record in &records {
        TracingObserver.on_call(record);
    }
    let response = result.context("Messages call failed")?;

    let printed = match records.first() {
        Some(record) if args.record => serde_json::to_string_pretty(record)?,
        _ => serde_json::to_string_pretty(&response)?,
    };
    println!("{printed}");
    Ok(())
}

fn read_arguments(path: &Path) -> anyhow::Result<Map<String, Value>> {
    let raw = if path.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin()).context("failed to read arguments from stdin")?
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?
    };
    match serde_json::from_str(&raw).context("arguments are not valid JSON")? {
        Value::Object(map) => Ok(map),
        _ => bail!("arguments must be a JSON object"),
    }
}

async fn embed(args: EmbedArgs, settings: &Settings) -> anyhow::Result<()> {
    let mut generation_kwargs = Map::new();
    if let Some(dimensions) = args.dimensions {
        generation_kwargs.insert("dimensions".to_string(), Value::from(dimensions));
    }
    let model = AzureEmbeddingModel::new(
        AzureEmbeddingConfig {
            deployment: args.deployment,
            generation_kwargs,
            ..AzureEmbeddingConfig::default()
        },
        settings,
    )?;

    let vectors = model
        .embed_texts(&args.texts)
        .await
        .context("embedding request failed")?;
    info!(model = model.model_name(), count = vectors.len(), "Embedded texts");
    println!("{}", serde_json::to_string(&vectors)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn settings_keys_parse_by_name_or_env_var() {
        let cli = Cli::try_parse_from(["evalkit", "settings", "set", "anthropic_api_key", "k", "--persist"])
            .unwrap();
        match cli.command {
            Command::Settings(SettingsCommand::Set { key, value, persist }) => {
                assert_eq!(key, SettingKey::AnthropicApiKey);
                assert_eq!(value, "k");
                assert!(persist);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::try_parse_from(["evalkit", "settings", "unset", "AZURE_OPENAI_ENDPOINT"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Settings(SettingsCommand::Unset {
                key: SettingKey::AzureOpenAiEndpoint,
                persist: false
            })
        ));

        assert!(Cli::try_parse_from(["evalkit", "settings", "set", "nope", "v"]).is_err());
    }

    #[test]
    fn embed_requires_text() {
        assert!(Cli::try_parse_from(["evalkit", "embed"]).is_err());
    }

    #[test]
    fn secrets_are_masked() {
        assert_eq!(mask("short"), "********");
        assert_eq!(mask("sk-ant-0123456789abcd"), "****abcd");
    }

    #[test]
    fn describe_masks_secrets_unless_revealed() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::load(settings::SettingsOptions::isolated(
            settings::Environment::from_pairs([("ANTHROPIC_API_KEY", "sk-ant-0123456789abcd")]),
            settings::KeyStore::in_dir(dir.path()),
        ))
        .unwrap();

        let masked = describe(&store.snapshot(), &store, false);
        assert!(masked.contains("anthropic_api_key = ****abcd"));
        assert!(masked.contains("azure_openai_endpoint = <unset>"));
        assert!(masked.contains("sdk_retry_providers = none"));

        let revealed = describe(&store.snapshot(), &store, true);
        assert!(revealed.contains("anthropic_api_key = sk-ant-0123456789abcd"));
    }
}
