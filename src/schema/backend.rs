//! Backend identity, capabilities and the SQL phrasing that differs between engines.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// The three supported storage engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Embedded single-file engine.
    Sqlite,
    /// Client/server engine with a proprietary JSON column type.
    MySql,
    /// Client/server engine with binary JSON and inverted indexes.
    Postgres,
}

/// What a backend can and cannot do, as far as the schema and applier care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendCapabilities {
    /// DDL statements can be rolled back with the surrounding transaction.
    pub transactional_ddl: bool,
    /// `CREATE INDEX IF NOT EXISTS` is accepted.
    pub conditional_index: bool,
    /// JSON columns support an indexed containment operator.
    pub json_containment: bool,
}

impl Backend {
    pub const ALL: [Backend; 3] = [Backend::Sqlite, Backend::MySql, Backend::Postgres];

    /// Resolve the backend from a connection URL scheme.
    pub fn from_url(url: &str) -> Result<Self, StoreError> {
        let scheme = url
            .split_once(':')
            .map(|(scheme, _)| scheme)
            .ok_or_else(|| StoreError::InvalidConfig(format!("database url has no scheme: {}", url)))?;

        match scheme.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Backend::Sqlite),
            "mysql" | "mariadb" => Ok(Backend::MySql),
            "postgres" | "postgresql" => Ok(Backend::Postgres),
            other => Err(StoreError::InvalidConfig(format!(
                "unsupported database scheme: {}",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Sqlite => "sqlite",
            Backend::MySql => "mysql",
            Backend::Postgres => "postgres",
        }
    }

    pub fn capabilities(&self) -> BackendCapabilities {
        match self {
            Backend::Sqlite => BackendCapabilities {
                transactional_ddl: true,
                conditional_index: true,
                json_containment: false,
            },
            Backend::MySql => BackendCapabilities {
                transactional_ddl: false,
                conditional_index: false,
                json_containment: false,
            },
            Backend::Postgres => BackendCapabilities {
                transactional_ddl: true,
                conditional_index: true,
                json_containment: true,
            },
        }
    }

    /// Rewrite `?` placeholders into the backend's native form.
    ///
    /// Statements are written once with `?`; PostgreSQL wants `$1, $2, ...`.
    /// Question marks inside single-quoted literals are left alone.
    pub fn sql(&self, statement: &str) -> String {
        if *self != Backend::Postgres {
            return statement.to_string();
        }

        let mut out = String::with_capacity(statement.len() + 8);
        let mut index = 0;
        let mut in_literal = false;
        for ch in statement.chars() {
            match ch {
                '\'' => {
                    in_literal = !in_literal;
                    out.push(ch);
                }
                '?' if !in_literal => {
                    index += 1;
                    out.push('$');
                    out.push_str(&index.to_string());
                }
                _ => out.push(ch),
            }
        }
        out
    }

    /// Placeholder expression for a value bound into a JSON column.
    pub fn json_param(&self) -> &'static str {
        match self {
            Backend::Sqlite => "?",
            Backend::MySql => "CAST(? AS JSON)",
            Backend::Postgres => "CAST(? AS JSONB)",
        }
    }

    /// Select expression that reads a JSON column back as text.
    pub fn json_text(&self, column: &str) -> String {
        match self {
            Backend::Sqlite => column.to_string(),
            Backend::MySql => format!("CAST({} AS CHAR)", column),
            Backend::Postgres => format!("{}::text", column),
        }
    }

    /// `INSERT ...` statement that updates `update` columns when `keys` collide.
    pub fn upsert(
        &self,
        table: &str,
        columns: &[&str],
        values: &[&str],
        keys: &[&str],
        update: &[Assignment<'_>],
    ) -> String {
        let mut sql = insert_prefix(table, columns, values);
        match self {
            Backend::Sqlite | Backend::Postgres => {
                let set = update
                    .iter()
                    .map(|a| a.render_excluded(table))
                    .collect::<Vec<_>>()
                    .join(", ");
                sql.push_str(&format!(" ON CONFLICT ({}) DO UPDATE SET {}", keys.join(", "), set));
            }
            Backend::MySql => {
                let set = update
                    .iter()
                    .map(|a| a.render_values())
                    .collect::<Vec<_>>()
                    .join(", ");
                sql.push_str(&format!(" ON DUPLICATE KEY UPDATE {}", set));
            }
        }
        sql
    }

    /// `INSERT ...` statement that leaves an existing row with the same key untouched.
    ///
    /// MySQL's `INSERT IGNORE` would also swallow foreign key failures, so a
    /// self-assignment on the key is used instead.
    pub fn insert_if_absent(&self, table: &str, columns: &[&str], values: &[&str], keys: &[&str]) -> String {
        let mut sql = insert_prefix(table, columns, values);
        match self {
            Backend::Sqlite | Backend::Postgres => {
                sql.push_str(&format!(" ON CONFLICT ({}) DO NOTHING", keys.join(", ")));
            }
            Backend::MySql => {
                sql.push_str(&format!(" ON DUPLICATE KEY UPDATE {0} = {0}", keys[0]));
            }
        }
        sql
    }

    /// Query counting tables named `?` in the connected database. Pass through [`Backend::sql`].
    pub fn table_exists_sql(&self) -> &'static str {
        match self {
            Backend::Sqlite => "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
            Backend::MySql => {
                "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = DATABASE() AND table_name = ?"
            }
            Backend::Postgres => {
                "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = current_schema() AND table_name = ?"
            }
        }
    }

    /// Query counting index entries for `(table, index)`. Pass through [`Backend::sql`].
    pub fn index_exists_sql(&self) -> &'static str {
        match self {
            Backend::Sqlite => "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND tbl_name = ? AND name = ?",
            Backend::MySql => {
                "SELECT COUNT(*) FROM information_schema.statistics WHERE table_schema = DATABASE() AND table_name = ? AND index_name = ?"
            }
            Backend::Postgres => {
                "SELECT COUNT(*) FROM pg_indexes WHERE schemaname = current_schema() AND tablename = ? AND indexname = ?"
            }
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "embedded" => Ok(Backend::Sqlite),
            "mysql" | "server-json" => Ok(Backend::MySql),
            "postgres" | "postgresql" | "server-binary-json" => Ok(Backend::Postgres),
            other => Err(StoreError::InvalidConfig(format!("unknown backend: {}", other))),
        }
    }
}

/// One `SET` item of an upsert.
#[derive(Debug, Clone, Copy)]
pub enum Assignment<'a> {
    /// Take the incoming row's value.
    Replace(&'a str),
    /// Boolean that may only go from false to true.
    Latch(&'a str),
}

impl Assignment<'_> {
    fn render_excluded(&self, table: &str) -> String {
        match self {
            Assignment::Replace(col) => format!("{0} = excluded.{0}", col),
            Assignment::Latch(col) => format!("{0} = ({1}.{0} OR excluded.{0})", col, table),
        }
    }

    fn render_values(&self) -> String {
        match self {
            Assignment::Replace(col) => format!("{0} = VALUES({0})", col),
            Assignment::Latch(col) => format!("{0} = ({0} OR VALUES({0}))", col),
        }
    }
}

fn insert_prefix(table: &str, columns: &[&str], values: &[&str]) -> String {
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        values.join(", ")
    )
}
