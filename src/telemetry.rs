use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Initialize structured logging.
///
/// `RUST_LOG` takes precedence over `default_level`. JSON output carries the
/// current span and span list so migration ids and correlation ids appear on
/// every line.
pub fn init_telemetry(default_level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))?;

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init()?;
    }

    tracing::debug!(json, "migration master telemetry initialized");
    Ok(())
}

/// Generate a correlation ID for linking the log lines of one operation
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Create a span for one facade operation. `migration.id` is recorded once
/// the migration has been resolved.
pub fn create_migration_span(operation: &str, correlation_id: &str) -> tracing::Span {
    tracing::info_span!(
        "migration_master",
        operation = operation,
        migration.id = tracing::field::Empty,
        correlation.id = correlation_id
    )
}
