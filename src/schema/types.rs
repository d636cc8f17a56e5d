//! Canonical column types and how each backend spells them.

use super::backend::Backend;

/// What a text column holds. Only MySQL cares: indexed and keyed columns
/// there need a bounded `VARCHAR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRole {
    /// Addresses, signatures, hashes, program ids.
    Identifier,
    /// Names, enum values, symbols.
    Label,
    /// Unbounded free text.
    Body,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    BigInt,
    Text(TextRole),
    Bool,
    /// A point in time. `auto_refresh` marks columns the backend should bump
    /// on every update where it can.
    Instant { auto_refresh: bool },
    /// An ordered list of strings.
    Json,
    Real,
    /// Backend-local auto-incrementing key. Always the primary key.
    Surrogate,
}

/// Canonical default values, rendered per backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(&'static str),
    EmptyJsonArray,
}

impl ColumnType {
    /// Native type token for `backend`.
    pub fn native(&self, backend: Backend) -> &'static str {
        match (self, backend) {
            (ColumnType::BigInt, Backend::Sqlite) => "INTEGER",
            (ColumnType::BigInt, _) => "BIGINT",

            (ColumnType::Text(_), Backend::Sqlite | Backend::Postgres) => "TEXT",
            (ColumnType::Text(TextRole::Identifier), Backend::MySql) => "VARCHAR(128)",
            (ColumnType::Text(TextRole::Label), Backend::MySql) => "VARCHAR(255)",
            (ColumnType::Text(TextRole::Body), Backend::MySql) => "TEXT",

            (ColumnType::Bool, Backend::Sqlite) => "INTEGER",
            (ColumnType::Bool, _) => "BOOLEAN",

            (ColumnType::Instant { .. }, Backend::Sqlite) => "TEXT",
            (ColumnType::Instant { .. }, Backend::MySql) => "DATETIME(6)",
            (ColumnType::Instant { .. }, Backend::Postgres) => "TIMESTAMPTZ",

            (ColumnType::Json, Backend::Sqlite) => "TEXT",
            (ColumnType::Json, Backend::MySql) => "JSON",
            (ColumnType::Json, Backend::Postgres) => "JSONB",

            (ColumnType::Real, Backend::Sqlite) => "REAL",
            (ColumnType::Real, Backend::MySql) => "DOUBLE",
            (ColumnType::Real, Backend::Postgres) => "DOUBLE PRECISION",

            (ColumnType::Surrogate, Backend::Sqlite) => "INTEGER PRIMARY KEY AUTOINCREMENT",
            (ColumnType::Surrogate, Backend::MySql) => "BIGINT AUTO_INCREMENT PRIMARY KEY",
            (ColumnType::Surrogate, Backend::Postgres) => "BIGSERIAL PRIMARY KEY",
        }
    }

    /// Clause the backend appends to maintain the column by itself, if any.
    pub fn managed_clause(&self, backend: Backend) -> Option<&'static str> {
        match (self, backend) {
            (ColumnType::Instant { auto_refresh: true }, Backend::MySql) => {
                Some("DEFAULT CURRENT_TIMESTAMP(6) ON UPDATE CURRENT_TIMESTAMP(6)")
            }
            _ => None,
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, ColumnType::Json)
    }
}

impl DefaultValue {
    /// `DEFAULT ...` clause for `backend`.
    pub fn render(&self, backend: Backend) -> String {
        let literal = match (self, backend) {
            (DefaultValue::Bool(v), Backend::Sqlite) => (if *v { "1" } else { "0" }).to_string(),
            (DefaultValue::Bool(v), _) => (if *v { "TRUE" } else { "FALSE" }).to_string(),
            (DefaultValue::Int(v), _) => v.to_string(),
            (DefaultValue::Real(v), _) => format!("{:?}", v),
            (DefaultValue::Text(v), _) => format!("'{}'", v.replace('\'', "''")),
            (DefaultValue::EmptyJsonArray, Backend::Sqlite) => "'[]'".to_string(),
            (DefaultValue::EmptyJsonArray, Backend::MySql) => "(JSON_ARRAY())".to_string(),
            (DefaultValue::EmptyJsonArray, Backend::Postgres) => "'[]'::jsonb".to_string(),
        };
        format!("DEFAULT {}", literal)
    }
}
