//! # Gateway Store Pool
//!
//! Opens the gateway's SQLite file (or a private in-memory store for
//! tests) and applies the embedded schema.
//!
//! ```text
//!   Inbound telemetry tasks ──► INSERT sensor_logs / pump_logs ──┐
//!   HTTP save               ──► replace_all transaction ─────────┼──► SqlitePool (WAL)
//!   Announce worker         ──► read_snapshot transaction ───────┘
//! ```
//!
//! WAL lets telemetry appends proceed while a snapshot read is open, and a
//! snapshot reader sees a replace either entirely or not at all.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::state::ConfigStore;
use crate::repository::telemetry::TelemetryRepository;

const MEMORY_PATH: &str = ":memory:";

/// How long a caller waits for a free connection before `PoolExhausted`.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Where the store lives and how many connections share it.
///
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/roslinki/gateway.db").max_connections(8);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub database_path: PathBuf,
    pub max_connections: u32,
}

impl DbConfig {
    /// File-backed store, created on first open. Five connections by default.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
        }
    }

    /// Private in-memory store. Every call gives an independent database.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(MEMORY_PATH),
            max_connections: 1,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    fn is_memory(&self) -> bool {
        self.database_path.as_os_str() == MEMORY_PATH
    }
}

/// Shared handle to the store. Clones share one pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and brings the schema up to date.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening gateway store");

        let options = SqliteConnectOptions::from_str(&format!(
            "sqlite://{}?mode=rwc",
            config.database_path.display()
        ))
        .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .create_if_missing(true);

        // A memory store lives only as long as its one connection.
        let (max_connections, idle_timeout) = if config.is_memory() {
            (1, None)
        } else {
            (config.max_connections, Some(Duration::from_secs(600)))
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .idle_timeout(idle_timeout)
            .connect_with(options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        migrations::run_migrations(&pool).await?;
        info!(max_connections, "Gateway store ready");

        Ok(Database { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn config_store(&self) -> ConfigStore {
        ConfigStore::new(self.pool.clone())
    }

    pub fn telemetry(&self) -> TelemetryRepository {
        TelemetryRepository::new(self.pool.clone())
    }

    /// Closes every connection. Later queries fail with `ConnectionFailed`.
    pub async fn close(&self) {
        info!("Closing gateway store");
        self.pool.close().await;
    }

    /// True when the store answers a trivial query.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
