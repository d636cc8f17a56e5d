use tracing::debug;

use crate::db::connection::DbPool;
use crate::error::StoreError;
use crate::models::{Slot, SlotLeader, SlotRange};
use crate::schema::Assignment;

const ENTITY: &str = "slot";
const COLUMNS: &str = "slot, blockhash, parent_slot, finalized, timestamp";

/// Insert or replace a slot by number. A finalized slot stays finalized.
pub async fn upsert_slot(pool: &DbPool, slot: &Slot) -> Result<(), StoreError> {
    let backend = pool.backend();

    if slot.slot < 0 || (slot.slot > 0 && slot.parent_slot >= slot.slot) {
        return Err(StoreError::constraint(
            backend,
            ENTITY,
            slot.slot,
            format!("parent slot {} must precede slot {}", slot.parent_slot, slot.slot),
        ));
    }

    let sql = backend.sql(&backend.upsert(
        "slots",
        &["slot", "blockhash", "parent_slot", "finalized", "timestamp"],
        &["?", "?", "?", "?", "?"],
        &["slot"],
        &[
            Assignment::Replace("blockhash"),
            Assignment::Replace("parent_slot"),
            Assignment::Latch("finalized"),
            Assignment::Replace("timestamp"),
        ],
    ));

    with_pool!(pool, p => {
        sqlx::query(&sql)
            .bind(slot.slot)
            .bind(&slot.blockhash)
            .bind(slot.parent_slot)
            .bind(slot.finalized)
            .bind(slot.timestamp)
            .execute(p)
            .await
            .map(|_| ())
    })
    .map_err(|e| StoreError::from_sqlx(e, backend, ENTITY, slot.slot))?;

    debug!("Upserted slot {}", slot.slot);
    Ok(())
}

pub async fn get_slot(pool: &DbPool, slot: i64) -> Result<Option<Slot>, StoreError> {
    let backend = pool.backend();
    let sql = backend.sql(&format!("SELECT {} FROM slots WHERE slot = ?", COLUMNS));

    with_pool!(pool, p => sqlx::query_as::<_, Slot>(&sql).bind(slot).fetch_optional(p).await)
        .map_err(|e| StoreError::from_sqlx(e, backend, ENTITY, slot))
}

/// Slots in `range`, both ends included, lowest first.
pub async fn query_slots_in_range(pool: &DbPool, range: SlotRange) -> Result<Vec<Slot>, StoreError> {
    let backend = pool.backend();
    let sql = backend.sql(&format!(
        "SELECT {} FROM slots WHERE slot >= ? AND slot <= ? ORDER BY slot ASC",
        COLUMNS
    ));

    with_pool!(pool, p => {
        sqlx::query_as::<_, Slot>(&sql)
            .bind(range.start)
            .bind(range.end)
            .fetch_all(p)
            .await
    })
    .map_err(|e| StoreError::from_sqlx(e, backend, ENTITY, format!("{}..={}", range.start, range.end)))
}

/// Highest slots first.
pub async fn get_recent_slots(pool: &DbPool, limit: i64) -> Result<Vec<Slot>, StoreError> {
    let backend = pool.backend();
    let sql = backend.sql(&format!("SELECT {} FROM slots ORDER BY slot DESC LIMIT ?", COLUMNS));

    with_pool!(pool, p => sqlx::query_as::<_, Slot>(&sql).bind(limit).fetch_all(p).await)
        .map_err(|e| StoreError::from_sqlx(e, backend, ENTITY, "recent"))
}

pub async fn get_finalized_slots(pool: &DbPool, limit: i64) -> Result<Vec<Slot>, StoreError> {
    let backend = pool.backend();
    let sql = backend.sql(&format!(
        "SELECT {} FROM slots WHERE finalized = ? ORDER BY slot DESC LIMIT ?",
        COLUMNS
    ));

    with_pool!(pool, p => {
        sqlx::query_as::<_, Slot>(&sql)
            .bind(true)
            .bind(limit)
            .fetch_all(p)
            .await
    })
    .map_err(|e| StoreError::from_sqlx(e, backend, ENTITY, "finalized"))
}

/// Returns false when the slot is unknown.
pub async fn mark_slot_finalized(pool: &DbPool, slot: i64) -> Result<bool, StoreError> {
    let backend = pool.backend();
    let sql = backend.sql("UPDATE slots SET finalized = ? WHERE slot = ?");

    let rows = with_pool!(pool, p => {
        sqlx::query(&sql)
            .bind(true)
            .bind(slot)
            .execute(p)
            .await
            .map(|r| r.rows_affected())
    })
    .map_err(|e| StoreError::from_sqlx(e, backend, ENTITY, slot))?;

    // MySQL reports zero affected rows when the value did not change.
    if rows > 0 {
        return Ok(true);
    }
    Ok(get_slot(pool, slot).await?.is_some())
}

pub async fn upsert_slot_leader(pool: &DbPool, leader: &SlotLeader) -> Result<(), StoreError> {
    let backend = pool.backend();
    let sql = backend.sql(&backend.upsert(
        "slot_leaders",
        &["slot", "leader_pubkey", "validator_name"],
        &["?", "?", "?"],
        &["slot"],
        &[Assignment::Replace("leader_pubkey"), Assignment::Replace("validator_name")],
    ));

    with_pool!(pool, p => {
        sqlx::query(&sql)
            .bind(leader.slot)
            .bind(&leader.leader_pubkey)
            .bind(&leader.validator_name)
            .execute(p)
            .await
            .map(|_| ())
    })
    .map_err(|e| StoreError::from_sqlx(e, backend, "slot leader", leader.slot))
}

pub async fn get_slot_leader(pool: &DbPool, slot: i64) -> Result<Option<SlotLeader>, StoreError> {
    let backend = pool.backend();
    let sql = backend.sql("SELECT slot, leader_pubkey, validator_name FROM slot_leaders WHERE slot = ?");

    with_pool!(pool, p => sqlx::query_as::<_, SlotLeader>(&sql).bind(slot).fetch_optional(p).await)
        .map_err(|e| StoreError::from_sqlx(e, backend, "slot leader", slot))
}
