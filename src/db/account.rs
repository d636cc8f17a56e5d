// Latest account state plus the append-only snapshot history.

use chrono::Utc;
use tracing::debug;

use super::{exists_sql, BeginWrite, Guarded};
use crate::db::connection::DbPool;
use crate::error::StoreError;
use crate::models::{AccountSnapshot, AccountState, AccountStateUpdate, NewAccountSnapshot, TimeRange};
use crate::schema::Assignment;

const ENTITY: &str = "account";
const SNAPSHOT_ENTITY: &str = "account snapshot";

/// Insert or replace the latest state of an address.
///
/// `updated_at` is refreshed on every call; `created_at` is written only by the first.
pub async fn upsert_account_state(pool: &DbPool, account: &AccountStateUpdate) -> Result<(), StoreError> {
    let backend = pool.backend();
    let now = Utc::now();
    let sql = backend.sql(&backend.upsert(
        "accounts",
        &["address", "lamports", "owner", "executable", "slot", "data_size", "updated_at", "created_at"],
        &["?", "?", "?", "?", "?", "?", "?", "?"],
        &["address"],
        &[
            Assignment::Replace("lamports"),
            Assignment::Replace("owner"),
            Assignment::Replace("executable"),
            Assignment::Replace("slot"),
            Assignment::Replace("data_size"),
            Assignment::Replace("updated_at"),
        ],
    ));

    with_pool!(pool, p => {
        sqlx::query(&sql)
            .bind(&account.address)
            .bind(account.lamports)
            .bind(&account.owner)
            .bind(account.executable)
            .bind(account.slot)
            .bind(account.data_size)
            .bind(now)
            .bind(now)
            .execute(p)
            .await
            .map(|_| ())
    })
    .map_err(|e| StoreError::from_sqlx(e, backend, ENTITY, &account.address))?;

    debug!("Upserted account {} as of slot {}", account.address, account.slot);
    Ok(())
}

pub async fn query_latest_account_state(pool: &DbPool, address: &str) -> Result<Option<AccountState>, StoreError> {
    let backend = pool.backend();
    let sql = backend.sql(
        "SELECT address, lamports, owner, executable, slot, data_size, updated_at, created_at \
         FROM accounts WHERE address = ?",
    );

    with_pool!(pool, p => sqlx::query_as::<_, AccountState>(&sql).bind(address).fetch_optional(p).await)
        .map_err(|e| StoreError::from_sqlx(e, backend, ENTITY, address))
}

/// Append a snapshot of a tracked account. Both the tracked account and the slot must exist.
pub async fn append_account_snapshot(pool: &DbPool, snapshot: &NewAccountSnapshot) -> Result<(), StoreError> {
    let backend = pool.backend();
    let tracked_sql = exists_sql(backend, "tracked_accounts", "address");
    let slot_sql = exists_sql(backend, "slots", "slot");
    let insert_sql = backend.sql(
        "INSERT INTO account_snapshots \
         (account_address, lamports, data_size, owner, executable, rent_epoch, timestamp, slot) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    );

    let outcome = with_pool!(pool, p => async {
        let mut tx = p.begin_write().await?;

        let tracked: i64 = sqlx::query_scalar(&tracked_sql)
            .bind(&snapshot.account_address)
            .fetch_one(&mut *tx)
            .await?;
        if tracked == 0 {
            return Ok(Guarded::Missing("tracked account", snapshot.account_address.clone()));
        }

        let slot: i64 = sqlx::query_scalar(&slot_sql)
            .bind(snapshot.slot)
            .fetch_one(&mut *tx)
            .await?;
        if slot == 0 {
            return Ok(Guarded::Missing("slot", snapshot.slot.to_string()));
        }

        sqlx::query(&insert_sql)
            .bind(&snapshot.account_address)
            .bind(snapshot.lamports)
            .bind(snapshot.data_size)
            .bind(&snapshot.owner)
            .bind(snapshot.executable)
            .bind(snapshot.rent_epoch)
            .bind(snapshot.timestamp)
            .bind(snapshot.slot)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok::<_, sqlx::Error>(Guarded::Written)
    }
    .await)
    .map_err(|e| StoreError::from_sqlx(e, backend, SNAPSHOT_ENTITY, &snapshot.account_address))?;

    outcome.into_result(backend, SNAPSHOT_ENTITY, &snapshot.account_address)?;
    debug!("Snapshot of {} at slot {} stored", snapshot.account_address, snapshot.slot);
    Ok(())
}

/// Snapshots of `address` taken within `range`, oldest first.
pub async fn query_account_snapshots(
    pool: &DbPool,
    address: &str,
    range: TimeRange,
) -> Result<Vec<AccountSnapshot>, StoreError> {
    let backend = pool.backend();
    let sql = backend.sql(
        "SELECT id, account_address, lamports, data_size, owner, executable, rent_epoch, timestamp, slot \
         FROM account_snapshots \
         WHERE account_address = ? AND timestamp >= ? AND timestamp < ? \
         ORDER BY timestamp ASC, slot ASC, id ASC",
    );

    with_pool!(pool, p => {
        sqlx::query_as::<_, AccountSnapshot>(&sql)
            .bind(address)
            .bind(range.start)
            .bind(range.end)
            .fetch_all(p)
            .await
    })
    .map_err(|e| StoreError::from_sqlx(e, backend, SNAPSHOT_ENTITY, address))
}
