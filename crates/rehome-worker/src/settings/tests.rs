use super::*;
use std::sync::Mutex;
use uuid::Uuid;

static ENV_LOCK: Mutex<()> = Mutex::new(());

const ENV_VARS: &[&str] = &[
    "REHOME_DB_URL",
    "REHOME_DB_POOL_MAX",
    "REHOME_CONFIG_PATH",
    "REHOME_BATCH_SIZE",
    "REHOME_RELATION_BATCH_SLEEP_MS",
    "REHOME_EXECUTION_BUDGET_SECONDS",
    "REHOME_THROTTLING_ENABLED",
    "REHOME_DIRECT_ENABLED",
    "REHOME_UNAVAILABLE_TABLES",
    "REHOME_MAX_REPLICATION_LAG_SECONDS",
];

fn clear_env() {
    for name in ENV_VARS {
        env::remove_var(name);
    }
}

fn set_config(yaml: &str) {
    let config_path =
        std::env::temp_dir().join(format!("rehome-test-config-{}.yaml", Uuid::now_v7()));
    std::fs::write(&config_path, yaml).expect("write config");
    env::set_var("REHOME_CONFIG_PATH", config_path);
}

#[test]
fn defaults_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|err| err.into_inner());
    clear_env();
    env::set_var("REHOME_CONFIG_PATH", "/nonexistent/rehome.yaml");

    let settings = Settings::from_env();
    assert_eq!(settings.db_url, DEFAULT_DB_URL);
    assert_eq!(settings.db_pool_max, DEFAULT_DB_POOL_MAX);
    let reassignment = &settings.config.reassignment;
    assert_eq!(reassignment.batch_size, 500);
    assert_eq!(reassignment.relation_batch_sleep_ms, 1000);
    assert_eq!(reassignment.execution_budget_seconds, 120);
    assert!(reassignment.throttling.enabled);
    assert!(!reassignment.direct.enabled);
    assert_eq!(settings.config.health.max_replication_lag_seconds, 60);
    assert!(settings.config.health.unavailable_tables.is_empty());
    assert!(settings.config.registry.file.is_none());
    clear_env();
}

#[test]
fn yaml_sections_are_loaded() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|err| err.into_inner());
    clear_env();
    set_config(
        "reassignment:\n  batch_size: 50\n  throttling:\n    enabled: false\n  direct:\n    enabled: true\nhealth:\n  max_replication_lag_seconds: 5\n  unavailable_tables: [notes]\nregistry:\n  file: models.yaml\n",
    );

    let settings = Settings::from_env();
    let reassignment = &settings.config.reassignment;
    assert_eq!(reassignment.batch_size, 50);
    assert_eq!(reassignment.relation_batch_sleep_ms, 1000);
    assert!(!reassignment.throttling.enabled);
    assert_eq!(reassignment.throttling.health_cache_ttl_seconds, 30);
    assert!(reassignment.direct.enabled);
    assert_eq!(settings.config.health.max_replication_lag_seconds, 5);
    assert_eq!(settings.config.health.unavailable_tables, vec!["notes"]);
    assert_eq!(settings.config.registry.file.as_deref(), Some("models.yaml"));
    clear_env();
}

#[test]
fn unparsable_yaml_falls_back_to_defaults() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|err| err.into_inner());
    clear_env();
    set_config("reassignment: [not, a, map]\n");

    let settings = Settings::from_env();
    assert_eq!(settings.config.reassignment.batch_size, 500);
    clear_env();
}

#[test]
fn env_overrides_win_over_yaml() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|err| err.into_inner());
    clear_env();
    set_config("reassignment:\n  batch_size: 50\n  direct:\n    enabled: false\n");
    env::set_var("REHOME_DB_URL", "postgres://db.internal/rehome");
    env::set_var("REHOME_DB_POOL_MAX", "12");
    env::set_var("REHOME_BATCH_SIZE", "250");
    env::set_var("REHOME_RELATION_BATCH_SLEEP_MS", "0");
    env::set_var("REHOME_EXECUTION_BUDGET_SECONDS", "30");
    env::set_var("REHOME_THROTTLING_ENABLED", "off");
    env::set_var("REHOME_DIRECT_ENABLED", "yes");
    env::set_var("REHOME_UNAVAILABLE_TABLES", " notes, events ,,");

    let settings = Settings::from_env();
    assert_eq!(settings.db_url, "postgres://db.internal/rehome");
    assert_eq!(settings.db_pool_max, 12);
    let reassignment = &settings.config.reassignment;
    assert_eq!(reassignment.batch_size, 250);
    assert_eq!(reassignment.relation_batch_sleep_ms, 0);
    assert_eq!(reassignment.execution_budget_seconds, 30);
    assert!(!reassignment.throttling.enabled);
    assert!(reassignment.direct.enabled);
    assert_eq!(
        settings.config.health.unavailable_tables,
        vec!["notes".to_string(), "events".to_string()]
    );
    clear_env();
}

#[test]
fn invalid_env_values_keep_prior_values() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|err| err.into_inner());
    clear_env();
    set_config("reassignment:\n  batch_size: 50\n");
    env::set_var("REHOME_BATCH_SIZE", "0");
    env::set_var("REHOME_EXECUTION_BUDGET_SECONDS", "soon");
    env::set_var("REHOME_DIRECT_ENABLED", "maybe");
    env::set_var("REHOME_DB_POOL_MAX", "-1");

    let settings = Settings::from_env();
    assert_eq!(settings.config.reassignment.batch_size, 50);
    assert_eq!(settings.config.reassignment.execution_budget_seconds, 120);
    assert!(!settings.config.reassignment.direct.enabled);
    assert_eq!(settings.db_pool_max, DEFAULT_DB_POOL_MAX);
    clear_env();
}

#[test]
fn parse_bool_accepts_common_spellings() {
    for value in ["1", "true", "YES", " on "] {
        assert_eq!(env_config::parse_bool(value), Some(true), "{value}");
    }
    for value in ["0", "False", "no", "off"] {
        assert_eq!(env_config::parse_bool(value), Some(false), "{value}");
    }
    assert_eq!(env_config::parse_bool("enabled"), None);
}
