/// Run `$body` once per backend with `$p` bound to the concrete pool.
///
/// The body is expanded for every variant, so it must type-check against
/// each driver and evaluate to the same type in every arm.
macro_rules! with_pool {
    ($pool:expr, $p:ident => $body:expr) => {
        match $pool {
            $crate::db::connection::DbPool::Sqlite($p) => $body,
            $crate::db::connection::DbPool::MySql($p) => $body,
            $crate::db::connection::DbPool::Postgres($p) => $body,
        }
    };
}

use futures::future::BoxFuture;

/// Outcome of a write that first looks up the rows it references.
enum Guarded {
    Written,
    /// Referenced entity and key that were not found.
    Missing(&'static str, String),
}

impl Guarded {
    fn into_result(
        self,
        backend: crate::schema::Backend,
        entity: &'static str,
        key: &str,
    ) -> Result<(), crate::error::StoreError> {
        match self {
            Guarded::Written => Ok(()),
            Guarded::Missing(referenced, missing) => Err(crate::error::StoreError::constraint(
                backend,
                entity,
                key,
                format!("referenced {} {} does not exist", referenced, missing),
            )),
        }
    }
}

/// Open a transaction that holds the write lock from its first statement.
///
/// SQLite starts `BEGIN` deferred, and a reader that later writes gets
/// `SQLITE_BUSY` at once instead of waiting out the busy timeout.
trait BeginWrite {
    type Db: sqlx::Database;

    fn begin_write(&self) -> BoxFuture<'_, Result<sqlx::Transaction<'static, Self::Db>, sqlx::Error>>;
}

impl BeginWrite for sqlx::SqlitePool {
    type Db = sqlx::Sqlite;

    fn begin_write(&self) -> BoxFuture<'_, Result<sqlx::Transaction<'static, Self::Db>, sqlx::Error>> {
        Box::pin(self.begin_with("BEGIN IMMEDIATE"))
    }
}

impl BeginWrite for sqlx::MySqlPool {
    type Db = sqlx::MySql;

    fn begin_write(&self) -> BoxFuture<'_, Result<sqlx::Transaction<'static, Self::Db>, sqlx::Error>> {
        Box::pin(self.begin())
    }
}

impl BeginWrite for sqlx::PgPool {
    type Db = sqlx::Postgres;

    fn begin_write(&self) -> BoxFuture<'_, Result<sqlx::Transaction<'static, Self::Db>, sqlx::Error>> {
        Box::pin(self.begin())
    }
}

/// Count rows of `table` whose `column` equals the bound value.
fn exists_sql(backend: crate::schema::Backend, table: &str, column: &str) -> String {
    backend.sql(&format!("SELECT COUNT(*) FROM {} WHERE {} = ?", table, column))
}

pub mod account;
pub mod connection;
pub mod label;
pub mod migration;
pub mod slot;
pub mod stats;
pub mod tracking;
pub mod transaction;
pub mod wallet;

pub use connection::{connect, establish_connection, test_connection, DbPool};
pub use migration::{MigrationReport, MigrationUnit, Migrator, UnitState};
