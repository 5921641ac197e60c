use tracing_subscriber::{prelude::*, EnvFilter};

use crate::settings::Settings;

pub(crate) const DEFAULT_LOG_FILTER: &str = "rehome_worker=info,rehome_engine=info,sqlx=warn";

pub(crate) fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let format_json = std::env::var("LOG_FORMAT").unwrap_or_default() == "json";

    let registry = tracing_subscriber::registry().with(filter);
    if format_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

pub(crate) fn log_startup(settings: &Settings, command: &str) {
    let reassignment = &settings.config.reassignment;
    tracing::info!(
        event = "worker_start",
        command,
        db_pool_max = settings.db_pool_max,
        batch_size = reassignment.batch_size,
        relation_batch_sleep_ms = reassignment.relation_batch_sleep_ms,
        execution_budget_seconds = reassignment.execution_budget_seconds,
        throttling_enabled = reassignment.throttling.enabled,
        direct_enabled = reassignment.direct.enabled,
        unavailable_tables = ?settings.config.health.unavailable_tables,
        registry_file = settings.config.registry.file.as_deref(),
        "rehome worker starting"
    );
}
