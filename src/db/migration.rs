//! Migration registry and applier.
//!
//! Units are rendered from the canonical model for one backend at a time and
//! recorded in `schema_migrations` once applied. The ledger, not file naming,
//! decides what has run.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use tracing::{debug, error, info, warn};

use crate::db::connection::DbPool;
use crate::error::StoreError;
use crate::schema::ddl::{self, Statement};
use crate::schema::model::{self, Table};
use crate::schema::Backend;

const LEDGER: &str = "schema_migrations";

enum UnitContent {
    Tables(&'static [Table]),
    ContainmentIndexes(&'static [Table]),
}

struct UnitDef {
    version: i64,
    name: &'static str,
    backends: &'static [Backend],
    content: UnitContent,
}

const ALL_BACKENDS: &[Backend] = &Backend::ALL;

const UNITS: &[UnitDef] = &[
    UnitDef {
        version: 1,
        name: "bootstrap_ledger",
        backends: ALL_BACKENDS,
        content: UnitContent::Tables(&[model::SCHEMA_MIGRATIONS]),
    },
    UnitDef {
        version: 2,
        name: "chain_state",
        backends: ALL_BACKENDS,
        content: UnitContent::Tables(&[model::SLOTS, model::TRANSACTIONS, model::SLOT_LEADERS, model::ACCOUNTS]),
    },
    UnitDef {
        version: 3,
        name: "account_tracking",
        backends: ALL_BACKENDS,
        content: UnitContent::Tables(&[
            model::TRACKED_ACCOUNTS,
            model::ACCOUNT_ACTIVITIES,
            model::ACCOUNT_SNAPSHOTS,
            model::ACCOUNT_LABELS,
        ]),
    },
    UnitDef {
        version: 4,
        name: "wallet_tracking",
        backends: ALL_BACKENDS,
        content: UnitContent::Tables(&[
            model::TRACKED_WALLETS,
            model::WALLET_ACTIVITIES,
            model::WALLET_BALANCES,
            model::WALLET_LABELS,
        ]),
    },
    UnitDef {
        version: 5,
        name: "json_containment_indexes",
        backends: &[Backend::Postgres],
        content: UnitContent::ContainmentIndexes(&[model::TRANSACTIONS, model::TRACKED_ACCOUNTS, model::TRACKED_WALLETS]),
    },
];

/// One named, ordered schema change rendered for a single backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationUnit {
    pub version: i64,
    pub name: &'static str,
    pub backend: Backend,
    pub statements: Vec<Statement>,
}

impl MigrationUnit {
    pub fn new(version: i64, name: &'static str, backend: Backend, statements: Vec<Statement>) -> Self {
        Self {
            version,
            name,
            backend,
            statements,
        }
    }

    pub fn id(&self) -> String {
        format!("{:04}_{}", self.version, self.name)
    }

    /// The unit as a plain SQL script.
    pub fn script(&self) -> String {
        let mut script = String::new();
        for statement in &self.statements {
            script.push_str(statement.sql());
            script.push_str(";\n\n");
        }
        script
    }

    /// Hex SHA-256 of the rendered statements; detects units edited after being applied.
    pub fn checksum(&self) -> String {
        format!("{:x}", Sha256::digest(self.script().as_bytes()))
    }
}

/// The ordered unit sequence for `backend`.
pub fn registry(backend: Backend) -> Vec<MigrationUnit> {
    UNITS
        .iter()
        .filter(|def| def.backends.contains(&backend))
        .map(|def| {
            let statements = match def.content {
                UnitContent::Tables(tables) => tables
                    .iter()
                    .flat_map(|t| ddl::table_statements(t, backend))
                    .collect(),
                UnitContent::ContainmentIndexes(tables) => ddl::containment_statements(tables, backend),
            };
            MigrationUnit::new(def.version, def.name, backend, statements)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Pending,
    Applying,
    Applied,
    Failed,
}

/// A row of the applied-units ledger.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct AppliedUnit {
    pub version: i64,
    pub name: String,
    pub checksum: String,
    pub applied_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitStatus {
    pub version: i64,
    pub name: &'static str,
    pub state: UnitState,
    pub applied_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct MigrationReport {
    pub backend: Backend,
    pub units: Vec<UnitStatus>,
    newly_applied: usize,
}

impl MigrationReport {
    pub fn is_current(&self) -> bool {
        self.units.iter().all(|u| u.state == UnitState::Applied)
    }

    pub fn pending(&self) -> Vec<&UnitStatus> {
        self.units.iter().filter(|u| u.state != UnitState::Applied).collect()
    }

    pub fn newly_applied(&self) -> usize {
        self.newly_applied
    }

    pub fn previously_applied(&self) -> usize {
        self.units
            .iter()
            .filter(|u| u.state == UnitState::Applied)
            .count()
            - self.newly_applied
    }
}

pub struct Migrator {
    backend: Backend,
    units: Vec<MigrationUnit>,
}

impl Migrator {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            units: registry(backend),
        }
    }

    /// A migrator over an explicit unit list, which must start with the ledger bootstrap.
    pub fn with_units(backend: Backend, units: Vec<MigrationUnit>) -> Self {
        Self { backend, units }
    }

    pub fn units(&self) -> &[MigrationUnit] {
        &self.units
    }

    /// Ledger contents; empty when the ledger table does not exist yet.
    pub async fn applied(&self, pool: &DbPool) -> Result<Vec<AppliedUnit>, StoreError> {
        self.check_backend(pool)?;
        let backend = self.backend;
        let fail = |e: sqlx::Error| StoreError::from_sqlx(e, backend, "schema_migrations", "ledger");

        let exists_sql = backend.sql(backend.table_exists_sql());
        let exists: i64 = with_pool!(pool, p => {
            sqlx::query_scalar::<_, i64>(&exists_sql).bind(LEDGER).fetch_one(p).await
        })
        .map_err(fail)?;

        if exists == 0 {
            return Ok(Vec::new());
        }

        let sql = "SELECT version, name, checksum, applied_at FROM schema_migrations ORDER BY version";
        with_pool!(pool, p => sqlx::query_as::<_, AppliedUnit>(sql).fetch_all(p).await).map_err(fail)
    }

    /// Per-unit state without applying anything.
    pub async fn status(&self, pool: &DbPool) -> Result<MigrationReport, StoreError> {
        let applied = self.verified_ledger(pool).await?;

        let units = self
            .units
            .iter()
            .map(|unit| match applied.get(&unit.version) {
                Some(row) => UnitStatus {
                    version: unit.version,
                    name: unit.name,
                    state: UnitState::Applied,
                    applied_at: Some(row.applied_at),
                },
                None => UnitStatus {
                    version: unit.version,
                    name: unit.name,
                    state: UnitState::Pending,
                    applied_at: None,
                },
            })
            .collect();

        Ok(MigrationReport {
            backend: self.backend,
            units,
            newly_applied: 0,
        })
    }

    /// Fail with a schema error unless every unit is already applied.
    pub async fn ensure_current(&self, pool: &DbPool) -> Result<(), StoreError> {
        let report = self.status(pool).await?;
        match report.pending().first() {
            None => Ok(()),
            Some(first) => Err(StoreError::Schema {
                backend: self.backend,
                unit: format!("{:04}_{}", first.version, first.name),
                detail: format!("{} unit(s) pending and auto-migration is disabled", report.pending().len()),
            }),
        }
    }

    /// Apply every pending unit in order. Stops at the first failure.
    pub async fn run(&self, pool: &DbPool) -> Result<MigrationReport, StoreError> {
        let mut report = self.status(pool).await?;

        for (unit, status) in self.units.iter().zip(report.units.iter_mut()) {
            if status.state == UnitState::Applied {
                debug!("{} unit {} already applied", self.backend, unit.id());
                continue;
            }

            status.state = UnitState::Applying;
            info!("Applying {} migration unit {}", self.backend, unit.id());

            match self.apply_unit(pool, unit).await {
                Ok(applied_at) => {
                    status.state = UnitState::Applied;
                    status.applied_at = Some(applied_at);
                    report.newly_applied += 1;
                }
                Err(detail) => {
                    status.state = UnitState::Failed;
                    error!("{} migration unit {} failed: {}", self.backend, unit.id(), detail);
                    return Err(StoreError::Schema {
                        backend: self.backend,
                        unit: unit.id(),
                        detail,
                    });
                }
            }
        }

        Ok(report)
    }

    /// Ledger keyed by version, after checking it against the registry.
    async fn verified_ledger(&self, pool: &DbPool) -> Result<BTreeMap<i64, AppliedUnit>, StoreError> {
        let applied: BTreeMap<i64, AppliedUnit> = self
            .applied(pool)
            .await?
            .into_iter()
            .map(|row| (row.version, row))
            .collect();

        for row in applied.values() {
            let unit = self.units.iter().find(|u| u.version == row.version).ok_or_else(|| {
                StoreError::Schema {
                    backend: self.backend,
                    unit: format!("{:04}_{}", row.version, row.name),
                    detail: "recorded in the ledger but unknown to this build".to_string(),
                }
            })?;

            if unit.checksum() != row.checksum {
                warn!("{} unit {} checksum drifted", self.backend, unit.id());
                return Err(StoreError::Schema {
                    backend: self.backend,
                    unit: unit.id(),
                    detail: format!(
                        "checksum mismatch: ledger has {}, registry renders {}",
                        row.checksum,
                        unit.checksum()
                    ),
                });
            }
        }

        Ok(applied)
    }

    async fn apply_unit(&self, pool: &DbPool, unit: &MigrationUnit) -> Result<DateTime<Utc>, String> {
        let applied_at = Utc::now();
        let checksum = unit.checksum();
        let record_sql = self.backend.sql(
            "INSERT INTO schema_migrations (version, name, backend, checksum, applied_at) VALUES (?, ?, ?, ?, ?)",
        );
        let index_sql = self.backend.sql(self.backend.index_exists_sql());

        let result: Result<(), sqlx::Error> = if self.backend.capabilities().transactional_ddl {
            with_pool!(pool, p => async {
                let mut tx = p.begin().await?;
                for statement in &unit.statements {
                    if let Statement::CreateIndex { table, index, guarded: true, .. } = statement {
                        let existing: i64 = sqlx::query_scalar(&index_sql)
                            .bind(*table)
                            .bind(*index)
                            .fetch_one(&mut *tx)
                            .await?;
                        if existing > 0 {
                            debug!("Index {} already exists, skipping", index);
                            continue;
                        }
                    }
                    sqlx::raw_sql(statement.sql()).execute(&mut *tx).await?;
                }
                sqlx::query(&record_sql)
                    .bind(unit.version)
                    .bind(unit.name)
                    .bind(self.backend.as_str())
                    .bind(&checksum)
                    .bind(applied_at)
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await
            }
            .await)
        } else {
            // DDL auto-commits here; whatever ran before a failure stays.
            with_pool!(pool, p => async {
                for statement in &unit.statements {
                    if let Statement::CreateIndex { table, index, guarded: true, .. } = statement {
                        let existing: i64 = sqlx::query_scalar(&index_sql)
                            .bind(*table)
                            .bind(*index)
                            .fetch_one(p)
                            .await?;
                        if existing > 0 {
                            debug!("Index {} already exists, skipping", index);
                            continue;
                        }
                    }
                    sqlx::raw_sql(statement.sql()).execute(p).await?;
                }
                sqlx::query(&record_sql)
                    .bind(unit.version)
                    .bind(unit.name)
                    .bind(self.backend.as_str())
                    .bind(&checksum)
                    .bind(applied_at)
                    .execute(p)
                    .await
                    .map(|_| ())
            }
            .await)
        };

        result.map(|_| applied_at).map_err(|e| e.to_string())
    }

    fn check_backend(&self, pool: &DbPool) -> Result<(), StoreError> {
        if pool.backend() != self.backend {
            return Err(StoreError::InvalidConfig(format!(
                "migrator for {} used with a {} pool",
                self.backend,
                pool.backend()
            )));
        }
        Ok(())
    }
}
