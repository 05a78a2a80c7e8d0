//! Connection pools for the SQL-backed stores.

use anyhow::Result;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::config::{PostgresStoreConfig, POSTGRES_PASSWORD_ENV};

/// Open (creating if missing) a WAL-mode SQLite database.
pub async fn connect_sqlite(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Lazily-connecting Postgres pool against `host`.
///
/// No connection is opened until the first query, so construction never
/// fails because the server is down; the store's health check and
/// initialization surface that instead.
pub fn postgres_pool(config: &PostgresStoreConfig, host: &str) -> Result<PgPool> {
    let mut options = PgConnectOptions::new()
        .host(host)
        .port(config.port)
        .database(&config.database)
        .username(&config.user);
    if let Ok(password) = std::env::var(POSTGRES_PASSWORD_ENV) {
        options = options.password(&password);
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect_lazy_with(options);

    Ok(pool)
}
