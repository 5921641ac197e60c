#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rehome_core::{ModelRegistry, NewSourceUser, SourceUser, VerifiedRegistry};
use rehome_db::local::{LocalHealthProbe, LocalIndexCatalog, LocalRepos};
use rehome_db::{connect_sqlite_with_max, migrate_local, SqlitePool};
use rehome_engine::{ExecutionTracker, HealthCache, ReassignmentConfig, Throttle};
use sqlx_core::row::Row;
use sqlx_sqlite::Sqlite;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use uuid::Uuid;

const DOMAIN_SCHEMA: &str = include_str!("../../rehome-db/tests/fixtures/domain_local.sql");

pub const PLACEHOLDER: i64 = 100;
pub const DESTINATION: i64 = 200;
pub const REASSIGNED_BY: i64 = 300;
pub const OTHER_PLACEHOLDER: i64 = 110;
pub const ADMIN: i64 = 900;
pub const ROOT_NAMESPACE: i64 = 1;

pub async fn setup_db() -> SqlitePool {
    let db_path = std::env::temp_dir().join(format!(
        "rehome-engine-{}.sqlite",
        Uuid::now_v7().simple()
    ));
    let db_url = format!("sqlite://{}", db_path.display());
    let pool = connect_sqlite_with_max(&db_url, 1).await.expect("sqlite");
    migrate_local(&pool).await.expect("migrate");
    for statement in DOMAIN_SCHEMA.split(';') {
        if !statement.trim().is_empty() {
            exec(&pool, statement).await;
        }
    }
    exec(
        &pool,
        "INSERT INTO users (id, email, admin) VALUES
            (100, 'placeholder_100@noreply.example.com', FALSE),
            (110, 'placeholder_110@noreply.example.com', FALSE),
            (200, 'dest@example.com', FALSE),
            (300, 'owner@example.com', FALSE),
            (900, 'root@admin.example.org', TRUE)",
    )
    .await;
    exec(
        &pool,
        "INSERT INTO namespaces (id, parent_id, path) VALUES
            (1, NULL, 'imported'),
            (2, 1, 'imported/team'),
            (3, NULL, 'elsewhere')",
    )
    .await;
    exec(
        &pool,
        "INSERT INTO projects (id, namespace_id) VALUES (50, 2), (60, 3)",
    )
    .await;
    pool
}

pub async fn exec(pool: &SqlitePool, sql: &str) {
    sqlx_core::query::query::<Sqlite>(sql)
        .execute(pool)
        .await
        .expect("exec");
}

pub async fn scalar(pool: &SqlitePool, sql: &str) -> Option<i64> {
    let row = sqlx_core::query::query::<Sqlite>(sql)
        .fetch_one(pool)
        .await
        .expect("scalar");
    row.try_get(0).expect("column")
}

pub async fn verified_registry(pool: &SqlitePool) -> VerifiedRegistry {
    ModelRegistry::builtin()
        .expect("registry")
        .verify(&LocalIndexCatalog::new(pool))
        .await
        .expect("verified")
}

pub fn test_config() -> ReassignmentConfig {
    ReassignmentConfig {
        relation_batch_sleep_ms: 0,
        batch_size: 2,
        ..ReassignmentConfig::default()
    }
}

pub fn throttle<'a>(
    config: &ReassignmentConfig,
    probe: &'a LocalHealthProbe,
) -> Throttle<'a> {
    Throttle::new(config, probe, HealthCache::new(Duration::ZERO))
}

/// Creates a source user and moves it into progress towards `reassign_to`.
pub async fn source_user_in_progress(
    repos: &LocalRepos<'_>,
    placeholder_user_id: i64,
    reassign_to: i64,
    reassigned_by: Option<i64>,
) -> SourceUser {
    let created = repos
        .source_users
        .create(&NewSourceUser {
            namespace_id: ROOT_NAMESPACE,
            placeholder_user_id,
            source_hostname: "https://source.example.com".to_string(),
        })
        .await
        .expect("source user");
    assert!(repos
        .source_users
        .start_reassignment(created.id, reassign_to, reassigned_by)
        .await
        .expect("start"));
    repos
        .source_users
        .get_by_id(created.id)
        .await
        .expect("get")
        .expect("exists")
}

/// Reports over-limit once more than `allowed` checks were made.
pub struct TripAfter {
    allowed: usize,
    checks: Arc<AtomicUsize>,
}

impl TripAfter {
    pub fn new(allowed: usize) -> (Self, Arc<AtomicUsize>) {
        let checks = Arc::new(AtomicUsize::new(0));
        (
            Self {
                allowed,
                checks: checks.clone(),
            },
            checks,
        )
    }
}

impl ExecutionTracker for TripAfter {
    fn over_limit(&self) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst) + 1 > self.allowed
    }
}

#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
    pub fields: BTreeMap<String, String>,
}

#[derive(Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl LogCapture {
    /// Installs the capture as the thread's default subscriber.
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let capture = Self::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().expect("events").clone()
    }

    pub fn find(&self, level: Level, message: &str) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.level == level && event.message == message)
            .collect()
    }
}

struct FieldVisitor<'a> {
    message: &'a mut String,
    fields: &'a mut BTreeMap<String, String>,
}

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = value.to_string();
        } else {
            self.fields.insert(field.name().to_string(), value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            *self.message = format!("{value:?}");
        } else {
            self.fields
                .insert(field.name().to_string(), format!("{value:?}"));
        }
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if event.metadata().target().starts_with("sqlx") {
            return;
        }
        let mut message = String::new();
        let mut fields = BTreeMap::new();
        event.record(&mut FieldVisitor {
            message: &mut message,
            fields: &mut fields,
        });
        self.events.lock().expect("events").push(CapturedEvent {
            level: *event.metadata().level(),
            message,
            fields,
        });
    }
}
