//! One-shot jobs behind each CLI command. Scheduling and retries belong to
//! whatever invokes the worker; exit codes tell it what to do next.

use std::fs;

use rehome_core::{ModelRegistry, RegistryError, SourceUserStore, VerifiedRegistry};
use rehome_db::repo::{PgHealthProbe, PgIndexCatalog, PgRepos};
use rehome_db::PgPool;
use rehome_engine::{
    DirectEngine, DirectOutcome, DirectRequest, HealthCache, ReassignError, ReplayEngine,
    ReplayOutcome, Throttle,
};

use crate::cli::{DirectArgs, ReplayArgs};
use crate::config::{RegistryConfig, WorkerConfig};

/// `EX_TEMPFAIL`: the invocation should be scheduled again.
pub const EXIT_TEMPFAIL: i32 = 75;
pub const EXIT_FAILURE: i32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("database error: {0}")]
    Database(#[from] sqlx_core::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx_core::migrate::MigrateError),
    #[error("registry file {path} unreadable: {message}")]
    RegistryFile { path: String, message: String },
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("source user {0} not found")]
    SourceUserNotFound(i64),
    #[error(transparent)]
    Reassign(#[from] ReassignError),
}

impl JobError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Reassign(err) if err.is_reschedulable() => EXIT_TEMPFAIL,
            _ => EXIT_FAILURE,
        }
    }
}

pub fn load_registry(config: &RegistryConfig) -> Result<ModelRegistry, JobError> {
    let Some(path) = config.file.as_deref() else {
        return Ok(ModelRegistry::builtin()?);
    };
    let contents = fs::read_to_string(path).map_err(|err| JobError::RegistryFile {
        path: path.to_string(),
        message: err.to_string(),
    })?;
    Ok(ModelRegistry::from_yaml(&contents)?)
}

pub async fn verify_registry(
    pool: &PgPool,
    config: &WorkerConfig,
) -> Result<VerifiedRegistry, JobError> {
    let registry = load_registry(&config.registry)?;
    let verified = registry.verify(&PgIndexCatalog::new(pool)).await?;
    tracing::info!(
        event = "registry_verified",
        models = verified.entries().count(),
        columns = verified.pairs().count(),
        "Model reference registry verified"
    );
    Ok(verified)
}

fn health_probe<'a>(pool: &'a PgPool, config: &WorkerConfig) -> PgHealthProbe<'a> {
    PgHealthProbe::new(
        pool,
        config.health.max_replication_lag_seconds,
        config.health.unavailable_tables.iter().cloned(),
    )
}

fn health_cache(config: &WorkerConfig) -> HealthCache {
    HealthCache::new(config.reassignment.throttling.health_cache_ttl())
}

pub async fn replay(
    pool: &PgPool,
    config: &WorkerConfig,
    args: &ReplayArgs,
) -> Result<ReplayOutcome, JobError> {
    let registry = verify_registry(pool, config).await?;
    let repos = PgRepos::new(pool);
    let source_user = repos
        .source_users
        .find_source_user(args.source_user_id)
        .await
        .map_err(ReassignError::from)?
        .ok_or(JobError::SourceUserNotFound(args.source_user_id))?;

    let probe = health_probe(pool, config);
    let throttle = Throttle::new(&config.reassignment, &probe, health_cache(config));
    let outcome = ReplayEngine::new(repos.stores(), &registry, throttle, &config.reassignment)
        .execute(&source_user)
        .await?;
    Ok(outcome)
}

pub async fn direct(
    pool: &PgPool,
    config: &WorkerConfig,
    args: &DirectArgs,
) -> Result<DirectOutcome, JobError> {
    if !config.reassignment.direct.enabled {
        tracing::info!(
            event = "direct_disabled",
            "Direct reassignment is disabled, nothing to do"
        );
        return Ok(DirectOutcome::Disabled);
    }
    let registry = verify_registry(pool, config).await?;
    let repos = PgRepos::new(pool);
    let probe = health_probe(pool, config);
    let throttle = Throttle::new(&config.reassignment, &probe, health_cache(config));
    let request = DirectRequest {
        placeholder_user_id: args.placeholder_user_id,
        reassign_to_user_id: args.reassign_to_user_id,
        source_user_id: args.source_user_id,
    };
    let outcome = DirectEngine::new(&repos.contributions, &registry, throttle, &config.reassignment)
        .execute(request)
        .await?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rehome_core::StoreError;
    use uuid::Uuid;

    #[test]
    fn reschedulable_failures_exit_tempfail() {
        let budget = JobError::from(ReassignError::ExecutionTimeExceeded);
        assert_eq!(budget.exit_code(), EXIT_TEMPFAIL);
        let health = JobError::from(ReassignError::DatabaseUnhealthy("lag".to_string()));
        assert_eq!(health.exit_code(), EXIT_TEMPFAIL);
        let store = JobError::from(ReassignError::Store(StoreError::Backend(
            "connection reset".to_string(),
        )));
        assert_eq!(store.exit_code(), EXIT_FAILURE);
        assert_eq!(JobError::SourceUserNotFound(9).exit_code(), EXIT_FAILURE);
    }

    #[test]
    fn builtin_registry_without_file() {
        let registry = load_registry(&RegistryConfig::default()).expect("builtin");
        assert!(registry.entry("MergeRequest").is_some());
        assert!(registry.entry("DiffNote").is_some());
    }

    #[test]
    fn registry_file_replaces_builtin() {
        let path = std::env::temp_dir().join(format!("rehome-registry-{}.yaml", Uuid::now_v7()));
        std::fs::write(
            &path,
            "models:\n  - model: Snippet\n    table: snippets\n    columns: [author_id]\n",
        )
        .expect("write registry");
        let config = RegistryConfig {
            file: Some(path.display().to_string()),
        };
        let registry = load_registry(&config).expect("registry");
        assert!(registry.entry("Snippet").is_some());
        assert!(registry.entry("MergeRequest").is_none());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_registry_file_is_reported() {
        let config = RegistryConfig {
            file: Some("/nonexistent/registry.yaml".to_string()),
        };
        let err = load_registry(&config).expect_err("missing file");
        assert!(matches!(err, JobError::RegistryFile { .. }));
        assert_eq!(err.exit_code(), EXIT_FAILURE);
    }
}
