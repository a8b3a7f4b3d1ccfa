use std::str::FromStr;

use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::error::StoreError;

/// URL of a private, process-local database.
pub const MEMORY_URL: &str = "sqlite::memory:";

/// Handle on the SQLite database. Clones share one pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Pool for `url` that opens connections on first use.
    ///
    /// In-memory databases are held by a single connection that is never
    /// recycled: every SQLite connection to `:memory:` sees its own database.
    pub fn connect_lazy(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool_options = if is_memory(url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        tracing::debug!(target: "stacks::db", url, "database pool configured");
        Ok(Self {
            pool: pool_options.connect_lazy_with(options),
        })
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::connect_lazy(MEMORY_URL, 1)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply every pending migration of `migrator`.
    pub async fn migrate(&self, migrator: &Migrator) -> Result<(), StoreError> {
        migrator.run(&self.pool).await?;
        tracing::info!(
            target: "stacks::db",
            migrations = migrator.iter().count(),
            "schema up to date"
        );
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// SQLite row id for a public `u64` id. -1 is never stored, so out-of-range ids match nothing.
pub fn sql_id(id: u64) -> i64 {
    i64::try_from(id).unwrap_or(-1)
}

fn is_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}
