//! Catalog database connection pool and connection metadata.

use anyhow::Result;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::config::DbConfig;

/// Opens the shared catalog pool.
///
/// Connections are pinged before every checkout and recycled after
/// `max_lifetime_secs`, so a pool that outlives a database restart hands out
/// fresh connections instead of dead ones.
pub async fn connect(config: &DbConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    // Ensure parent directory exists
    if let Some(parent) = options.get_filename().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
        .test_before_acquire(true)
        .connect_with(options)
        .await?;

    debug!(max_connections = config.max_connections, "catalog pool ready");
    Ok(pool)
}

/// Connection metadata safe to show to clients. The password is never included.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConnectionMeta {
    pub driver: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub username: Option<String>,
}

pub fn connection_meta(url: &str) -> Result<ConnectionMeta> {
    let parsed = reqwest::Url::parse(url)?;

    let database = match parsed.host_str() {
        // `driver://host/db` style: the database is the first path segment.
        Some(_) => parsed
            .path()
            .trim_start_matches('/')
            .split('/')
            .next()
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        // `sqlite:path` style: the whole path is the database.
        None => Some(parsed.path().to_string()).filter(|p| !p.is_empty()),
    };

    Ok(ConnectionMeta {
        driver: parsed.scheme().to_string(),
        host: parsed.host_str().map(str::to_string),
        port: parsed.port(),
        database,
        username: Some(parsed.username().to_string()).filter(|u| !u.is_empty()),
    })
}
