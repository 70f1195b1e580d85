//! evalkit CLI entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Load settings** from the process environment, dotenv files, and the
//!    `.evalkit/keys.json` key store.
//! 2. **Wire observability** (see [`telemetry`]).
//! 3. **Run one command**:
//!    - `settings show|set|unset` inspects or edits credentials.
//!    - `chat <args.json>` sends one instrumented Anthropic Messages call.
//!    - `embed <text>...` embeds texts with the Azure OpenAI embedding model.

mod commands;
mod telemetry;

use anyhow::Context;
use clap::Parser;
use settings::SettingsStore;

use crate::commands::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let store = SettingsStore::global().context("failed to load settings")?;
    let provider = telemetry::init(store.snapshot().telemetry_opt_out)?;

    let result = commands::run(cli, store).await;

    if let Some(provider) = provider {
        telemetry::shutdown(provider);
    }
    result
}
