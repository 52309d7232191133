use anyhow::{anyhow, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Initialize structured logging.
///
/// `RUST_LOG` wins over `default_level` when set. JSON output carries the
/// current span so correlation ids show up on every line.
pub fn init_telemetry(default_level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("Invalid log level {default_level:?}: {e}"))?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    result.map_err(|e| anyhow!("Failed to install tracing subscriber: {e}"))?;

    tracing::debug!(json, "deploy-flow telemetry initialized");
    Ok(())
}

/// Generate a correlation ID for linking related operations
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span carrying the common workflow attributes
pub fn create_workflow_span(
    operation: &str,
    dseq: Option<&str>,
    correlation_id: Option<&str>,
) -> tracing::Span {
    tracing::info_span!(
        "deployment_workflow",
        operation = operation,
        deployment.dseq = dseq,
        correlation.id = correlation_id,
    )
}

/// Nothing buffered to flush for plain structured logging
pub fn shutdown_telemetry() {
    tracing::debug!("deploy-flow telemetry shutdown complete");
}
