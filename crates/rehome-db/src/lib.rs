#![allow(clippy::pedantic)]
#![allow(clippy::nursery)]
#![deny(clippy::unwrap_used)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_raw_string_hashes)]
#![allow(clippy::uninlined_format_args)]

extern crate sqlx_core as sqlx;

use sqlx_core::pool::{Pool, PoolOptions};
#[cfg(feature = "postgres")]
use sqlx_postgres::{PgConnectOptions, Postgres};
#[cfg(feature = "sqlite")]
use sqlx_sqlite::{Sqlite, SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};
use std::str::FromStr;
use std::time::Duration;

mod sql;

#[cfg(feature = "sqlite")]
pub mod local;
#[cfg(feature = "postgres")]
pub mod repo;

#[cfg(feature = "sqlite")]
pub type SqlitePool = Pool<Sqlite>;
#[cfg(feature = "postgres")]
pub type PgPool = Pool<Postgres>;

/// Writes into user-scoped unique indexes may collide; callers get the
/// collision as a value.
#[cfg_attr(not(any(feature = "postgres", feature = "sqlite")), allow(dead_code))]
pub(crate) fn write_outcome<T>(
    result: Result<T, sqlx_core::Error>,
    rows: impl FnOnce(&T) -> u64,
) -> Result<rehome_core::WriteOutcome, sqlx_core::Error> {
    match result {
        Ok(done) => Ok(rehome_core::WriteOutcome::Applied(rows(&done))),
        Err(err)
            if err
                .as_database_error()
                .is_some_and(|db_err| db_err.is_unique_violation()) =>
        {
            Ok(rehome_core::WriteOutcome::UniqueViolation)
        }
        Err(err) => Err(err),
    }
}

pub const APPLICATION_NAME: &str = "rehome";

/// Pool for the reassignment jobs. Sessions are tagged so the health probe
/// and operators can tell them apart in `pg_stat_activity`.
#[cfg(feature = "postgres")]
pub async fn connect_postgres_with_max(
    url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx_core::Error> {
    let options = PgConnectOptions::from_str(url)?.application_name(APPLICATION_NAME);
    PoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
}

#[cfg(feature = "sqlite")]
pub async fn connect_sqlite_with_max(
    url: &str,
    max_connections: u32,
) -> Result<SqlitePool, sqlx_core::Error> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);

    PoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
}

#[cfg(feature = "postgres")]
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx_core::migrate::MigrateError> {
    sqlx_macros::migrate!("migrations/postgres")
        .run(pool)
        .await
}

#[cfg(feature = "sqlite")]
pub async fn migrate_local(pool: &SqlitePool) -> Result<(), sqlx_core::migrate::MigrateError> {
    sqlx_macros::migrate!("migrations/local")
        .run(pool)
        .await
}
