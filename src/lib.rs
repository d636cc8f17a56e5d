pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod schema;

#[cfg(test)]
pub mod tests;

// Re-export the pieces most callers need
pub use config::{Config, DatabaseConfig};
pub use db::connection;
pub use db::migration;
pub use db::{establish_connection, DbPool, Migrator};
pub use error::StoreError;
pub use schema::Backend;
