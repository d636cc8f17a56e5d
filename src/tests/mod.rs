pub mod store_tests;

use crate::config::DatabaseConfig;
use crate::db::{self, DbPool};

/// Fresh in-memory SQLite database with every unit applied.
pub async fn memory_store() -> DbPool {
    db::establish_connection(&DatabaseConfig::in_memory())
        .await
        .expect("Failed to open in-memory store")
}
