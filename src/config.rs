// Configuration structure for:
// - Database backend and connection string
// - Pool sizing and connect timeout
// - Whether pending migrations are applied at startup
// - Log filter for the binaries

use dotenv::dotenv;
use std::env;
use std::time::Duration;

use crate::error::StoreError;
use crate::schema::Backend;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub backend: Backend,
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub auto_migrate: bool,
}

impl DatabaseConfig {
    /// Defaults for `database_url`, with the backend taken from its scheme.
    pub fn new(database_url: impl Into<String>) -> Result<Self, StoreError> {
        let database_url = database_url.into();
        let backend = Backend::from_url(&database_url)?;

        Ok(Self {
            backend,
            database_url,
            max_connections: default_max_connections(),
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            auto_migrate: true,
        })
    }

    /// A private in-memory SQLite database.
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Sqlite,
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            auto_migrate: true,
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.backend == Backend::Sqlite
            && (self.database_url.contains(":memory:") || self.database_url.contains("mode=memory"))
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub log_filter: String,
}

impl Config {
    pub fn from_env() -> Result<Self, StoreError> {
        dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://chain_store.db?mode=rwc".to_string());
        let mut database = DatabaseConfig::new(database_url)?;

        // An explicit backend wins over the URL scheme.
        if let Ok(backend) = env::var("DATABASE_BACKEND") {
            database.backend = backend.parse()?;
        }

        database.max_connections = env::var("DB_MAX_CONNECTIONS")
            .map(|v| v.parse().unwrap_or_else(|_| default_max_connections()))
            .unwrap_or_else(|_| default_max_connections());
        database.min_connections = env::var("DB_MIN_CONNECTIONS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()
            .unwrap_or(1);
        database.connect_timeout = env::var("DB_CONNECT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));
        database.auto_migrate = env::var("DB_AUTO_MIGRATE")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);

        if database.min_connections > database.max_connections {
            return Err(StoreError::InvalidConfig(format!(
                "DB_MIN_CONNECTIONS ({}) exceeds DB_MAX_CONNECTIONS ({})",
                database.min_connections, database.max_connections
            )));
        }

        let log_filter = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(Self { database, log_filter })
    }
}

fn default_max_connections() -> u32 {
    (num_cpus::get() as u32 * 2).max(2)
}
