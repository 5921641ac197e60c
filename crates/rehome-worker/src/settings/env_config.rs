use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use tracing::warn;

use crate::config::WorkerConfig;

pub(super) fn load_config(path: &str) -> WorkerConfig {
    if !Path::new(path).exists() {
        return WorkerConfig::default();
    }

    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            warn!(event = "config_read_failed", path, error = %err);
            return WorkerConfig::default();
        }
    };
    match serde_yaml::from_str(&contents) {
        Ok(config) => config,
        Err(err) => {
            warn!(event = "config_parse_failed", path, error = %err);
            WorkerConfig::default()
        }
    }
}

pub(super) fn apply_reassignment_env_overrides(config: &mut WorkerConfig) {
    let reassignment = &mut config.reassignment;
    if let Some(value) = parsed_env::<i64>("REHOME_BATCH_SIZE", |value| *value > 0) {
        reassignment.batch_size = value;
    }
    if let Some(value) = parsed_env::<u64>("REHOME_RELATION_BATCH_SLEEP_MS", |_| true) {
        reassignment.relation_batch_sleep_ms = value;
    }
    if let Some(value) = parsed_env::<u64>("REHOME_EXECUTION_BUDGET_SECONDS", |value| *value > 0) {
        reassignment.execution_budget_seconds = value;
    }
    if let Some(enabled) = bool_env("REHOME_THROTTLING_ENABLED") {
        reassignment.throttling.enabled = enabled;
    }
    if let Some(enabled) = bool_env("REHOME_DIRECT_ENABLED") {
        reassignment.direct.enabled = enabled;
    }
}

pub(super) fn apply_health_env_overrides(config: &mut WorkerConfig) {
    if let Ok(value) = env::var("REHOME_UNAVAILABLE_TABLES") {
        config.health.unavailable_tables = value
            .split(',')
            .map(str::trim)
            .filter(|table| !table.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(value) = parsed_env::<u64>("REHOME_MAX_REPLICATION_LAG_SECONDS", |_| true) {
        config.health.max_replication_lag_seconds = value;
    }
}

fn parsed_env<T: FromStr>(field: &'static str, valid: impl Fn(&T) -> bool) -> Option<T> {
    let value = env::var(field).ok()?;
    match value.trim().parse::<T>() {
        Ok(parsed) if valid(&parsed) => Some(parsed),
        _ => {
            warn!(event = "config_invalid", field, value = %value);
            None
        }
    }
}

fn bool_env(field: &'static str) -> Option<bool> {
    let value = env::var(field).ok()?;
    let parsed = parse_bool(&value);
    if parsed.is_none() {
        warn!(event = "config_invalid", field, value = %value);
    }
    parsed
}

pub(super) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
