//! Observability wiring for the `evalkit` binary.
//!
//! Logs go to stderr so command output on stdout stays machine-readable.
//! `RUST_LOG` filters (default `info`), `EVALKIT_LOG_FORMAT=json` switches to
//! JSON lines, and `OTEL_EXPORTER_OTLP_ENDPOINT` enables span export over
//! OTLP unless telemetry is opted out.

use anyhow::Context;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::TracerProvider;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_FORMAT_VAR: &str = "EVALKIT_LOG_FORMAT";
pub const OTLP_ENDPOINT_VAR: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

/// Installs the global subscriber. Returns the tracer provider when OTLP
/// export is active; call [`shutdown`] on it before exit to flush spans.
pub fn init(telemetry_opt_out: bool) -> anyhow::Result<Option<TracerProvider>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(LOG_FORMAT_VAR).is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let export = !telemetry_opt_out
        && std::env::var(OTLP_ENDPOINT_VAR).is_ok_and(|v| !v.trim().is_empty());

    let provider = if export {
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .build()
            .context("failed to build OTLP span exporter")?;
        Some(
            TracerProvider::builder()
                .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
                .build(),
        )
    } else {
        None
    };
    let otel = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer("evalkit")));

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .with(otel)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(provider)
}

/// Flushes and stops span export.
pub fn shutdown(provider: TracerProvider) {
    if let Err(err) = provider.shutdown() {
        eprintln!("failed to flush telemetry: {err}");
    }
}
