use sqlx::error::ErrorKind;
use thiserror::Error;

use crate::schema::Backend;

/// Everything the store can report to a caller.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A migration unit failed or the ledger disagrees with the registry.
    /// Ingestion must not start while this is outstanding.
    #[error("Schema error on {backend} in unit {unit}: {detail}")]
    Schema {
        backend: Backend,
        unit: String,
        detail: String,
    },

    /// A write broke a foreign key, uniqueness rule or row invariant.
    #[error("Constraint violation on {backend} for {entity} {key}: {detail}")]
    ConstraintViolation {
        backend: Backend,
        entity: &'static str,
        key: String,
        detail: String,
    },

    /// Connection, timeout or lock contention. Safe to retry.
    #[error("Transient I/O error on {backend} for {entity} {key}: {source}")]
    TransientIo {
        backend: Backend,
        entity: &'static str,
        key: String,
        #[source]
        source: sqlx::Error,
    },

    /// The active backend cannot express the requested operation.
    #[error("{operation} is not supported on {backend}")]
    TypeMappingGap {
        backend: Backend,
        operation: &'static str,
    },

    #[error("Database error on {backend} for {entity} {key}: {source}")]
    Database {
        backend: Backend,
        entity: &'static str,
        key: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// SQLITE_BUSY / SQLITE_LOCKED, serialization failure / deadlock, lock wait timeout / deadlock.
const TRANSIENT_CODES: &[&str] = &["5", "6", "261", "262", "517", "40001", "40P01", "1205", "1213"];

impl StoreError {
    /// Classify a driver error, attaching the entity and key being written or read.
    pub fn from_sqlx(err: sqlx::Error, backend: Backend, entity: &'static str, key: impl ToString) -> Self {
        let key = key.to_string();

        let violation = match &err {
            sqlx::Error::Database(db) => match db.kind() {
                ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation => Some(db.message().to_string()),
                _ => None,
            },
            _ => None,
        };
        if let Some(detail) = violation {
            return StoreError::ConstraintViolation {
                backend,
                entity,
                key,
                detail,
            };
        }

        let transient = match &err {
            sqlx::Error::Database(db) => db
                .code()
                .is_some_and(|c| TRANSIENT_CODES.contains(&c.as_ref())),
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => true,
            _ => false,
        };

        if transient {
            StoreError::TransientIo {
                backend,
                entity,
                key,
                source: err,
            }
        } else {
            StoreError::Database {
                backend,
                entity,
                key,
                source: err,
            }
        }
    }

    pub fn constraint(backend: Backend, entity: &'static str, key: impl ToString, detail: impl Into<String>) -> Self {
        StoreError::ConstraintViolation {
            backend,
            entity,
            key: key.to_string(),
            detail: detail.into(),
        }
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, StoreError::ConstraintViolation { .. })
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::TransientIo { .. })
    }
}
