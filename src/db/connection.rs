// Connection pools for every backend.
// `establish_connection` is the startup barrier: no pool is handed out
// until the schema is current.

use std::str::FromStr;
use std::time::Duration;

use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::db::migration::Migrator;
use crate::error::StoreError;
use crate::schema::Backend;

#[derive(Debug, Clone)]
pub enum DbPool {
    Sqlite(SqlitePool),
    MySql(MySqlPool),
    Postgres(PgPool),
}

impl DbPool {
    pub fn backend(&self) -> Backend {
        match self {
            DbPool::Sqlite(_) => Backend::Sqlite,
            DbPool::MySql(_) => Backend::MySql,
            DbPool::Postgres(_) => Backend::Postgres,
        }
    }

    pub async fn close(&self) {
        with_pool!(self, p => p.close().await)
    }
}

/// Open a pool without touching the schema.
pub async fn connect(config: &DatabaseConfig) -> Result<DbPool, StoreError> {
    let backend = config.backend;
    let fail = |e: sqlx::Error| StoreError::from_sqlx(e, backend, "connection", "pool");

    info!("Connecting to {} database", backend);

    let pool = match backend {
        Backend::Sqlite => {
            let mut options = SqliteConnectOptions::from_str(&config.database_url)
                .map_err(fail)?
                .create_if_missing(true)
                .busy_timeout(Duration::from_secs(5))
                .foreign_keys(true);

            let mut pool_options = SqlitePoolOptions::new()
                .max_connections(config.max_connections)
                .min_connections(config.min_connections)
                .acquire_timeout(config.connect_timeout);

            if config.is_in_memory() {
                // Every new connection would see a fresh empty database.
                pool_options = pool_options
                    .max_connections(1)
                    .min_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None);
            } else {
                options = options
                    .journal_mode(SqliteJournalMode::Wal)
                    .synchronous(SqliteSynchronous::Normal);
            }

            DbPool::Sqlite(pool_options.connect_with(options).await.map_err(fail)?)
        }
        Backend::MySql => DbPool::MySql(
            MySqlPoolOptions::new()
                .max_connections(config.max_connections)
                .min_connections(config.min_connections)
                .acquire_timeout(config.connect_timeout)
                .connect(&config.database_url)
                .await
                .map_err(fail)?,
        ),
        Backend::Postgres => DbPool::Postgres(
            PgPoolOptions::new()
                .max_connections(config.max_connections)
                .min_connections(config.min_connections)
                .acquire_timeout(config.connect_timeout)
                .connect(&config.database_url)
                .await
                .map_err(fail)?,
        ),
    };

    debug!("{} pool ready", backend);
    Ok(pool)
}

/// Connect, then bring the schema up to date (or verify it is) before returning.
pub async fn establish_connection(config: &DatabaseConfig) -> Result<DbPool, StoreError> {
    let pool = connect(config).await?;
    let migrator = Migrator::new(pool.backend());

    if config.auto_migrate {
        let report = migrator.run(&pool).await?;
        info!(
            "{} schema current: {} unit(s) applied now, {} already applied",
            pool.backend(),
            report.newly_applied(),
            report.previously_applied()
        );
    } else {
        migrator.ensure_current(&pool).await?;
        info!("{} schema verified current", pool.backend());
    }

    Ok(pool)
}

/// Round-trip a trivial query.
pub async fn test_connection(pool: &DbPool) -> Result<(), StoreError> {
    let backend = pool.backend();
    with_pool!(pool, p => sqlx::query("SELECT 1").execute(p).await.map(|_| ()))
        .map_err(|e| StoreError::from_sqlx(e, backend, "connection", "ping"))
}
