use futures::{future, TryStreamExt};
use tracing::debug;

use crate::db::connection::DbPool;
use crate::error::StoreError;
use crate::models::{SlotRange, StringList, Transaction};
use crate::schema::{Assignment, Backend};

const ENTITY: &str = "transaction";
const INSERT_COLUMNS: &[&str] = &["signature", "slot", "fee", "status", "program_ids", "timestamp"];

fn select_columns(backend: Backend) -> String {
    format!(
        "signature, slot, fee, status, {} AS program_ids, timestamp",
        backend.json_text("program_ids")
    )
}

fn insert_values(backend: Backend) -> [&'static str; 6] {
    ["?", "?", "?", "?", backend.json_param(), "?"]
}

/// Insert a transaction, or refine the status of one already stored.
pub async fn upsert_transaction(pool: &DbPool, transaction: &Transaction) -> Result<(), StoreError> {
    let backend = pool.backend();
    let sql = backend.sql(&backend.upsert(
        "transactions",
        INSERT_COLUMNS,
        &insert_values(backend),
        &["signature"],
        &[Assignment::Replace("status")],
    ));

    write(pool, &sql, transaction).await?;
    debug!("Upserted transaction {} in slot {}", transaction.signature, transaction.slot);
    Ok(())
}

/// Insert the transaction unless one with the same signature exists. Returns true if inserted.
pub async fn ensure_transaction(pool: &DbPool, transaction: &Transaction) -> Result<bool, StoreError> {
    let backend = pool.backend();
    let sql = backend.sql(&backend.insert_if_absent(
        "transactions",
        INSERT_COLUMNS,
        &insert_values(backend),
        &["signature"],
    ));

    // MySQL counts the no-op key assignment as zero rows.
    let inserted = write(pool, &sql, transaction).await? == 1;
    if inserted {
        debug!("Inserted transaction {}", transaction.signature);
    }
    Ok(inserted)
}

async fn write(pool: &DbPool, sql: &str, transaction: &Transaction) -> Result<u64, StoreError> {
    let backend = pool.backend();
    let program_ids = transaction.program_ids.to_json()?;

    with_pool!(pool, p => {
        sqlx::query(sql)
            .bind(&transaction.signature)
            .bind(transaction.slot)
            .bind(transaction.fee)
            .bind(transaction.status.as_str())
            .bind(&program_ids)
            .bind(transaction.timestamp)
            .execute(p)
            .await
            .map(|r| r.rows_affected())
    })
    .map_err(|e| StoreError::from_sqlx(e, backend, ENTITY, &transaction.signature))
}

pub async fn get_transaction(pool: &DbPool, signature: &str) -> Result<Option<Transaction>, StoreError> {
    let backend = pool.backend();
    let sql = backend.sql(&format!(
        "SELECT {} FROM transactions WHERE signature = ?",
        select_columns(backend)
    ));

    with_pool!(pool, p => {
        sqlx::query_as::<_, Transaction>(&sql)
            .bind(signature)
            .fetch_optional(p)
            .await
    })
    .map_err(|e| StoreError::from_sqlx(e, backend, ENTITY, signature))
}

pub async fn get_transactions_by_slot(pool: &DbPool, slot: i64) -> Result<Vec<Transaction>, StoreError> {
    let backend = pool.backend();
    let sql = backend.sql(&format!(
        "SELECT {} FROM transactions WHERE slot = ? ORDER BY timestamp ASC, signature ASC",
        select_columns(backend)
    ));

    with_pool!(pool, p => sqlx::query_as::<_, Transaction>(&sql).bind(slot).fetch_all(p).await)
        .map_err(|e| StoreError::from_sqlx(e, backend, ENTITY, format!("slot {}", slot)))
}

/// Transactions whose `program_ids` contain `program_id`, answered by the
/// containment index. Only PostgreSQL can do this; see
/// [`scan_transactions_for_program`] for the other backends.
pub async fn transactions_containing_program(
    pool: &DbPool,
    program_id: &str,
) -> Result<Vec<Transaction>, StoreError> {
    let backend = pool.backend();
    let DbPool::Postgres(p) = pool else {
        return Err(StoreError::TypeMappingGap {
            backend,
            operation: "JSON containment query on transactions.program_ids",
        });
    };

    let needle = StringList(vec![program_id.to_string()]).to_json()?;
    let sql = backend.sql(&format!(
        "SELECT {} FROM transactions WHERE program_ids @> {} ORDER BY slot ASC, signature ASC",
        select_columns(backend),
        backend.json_param()
    ));

    sqlx::query_as::<_, Transaction>(&sql)
        .bind(needle)
        .fetch_all(p)
        .await
        .map_err(|e| StoreError::from_sqlx(e, backend, ENTITY, program_id))
}

/// Application-side filter over the transactions of `range`. Works everywhere,
/// at the cost of reading every row in the range.
pub async fn scan_transactions_for_program(
    pool: &DbPool,
    program_id: &str,
    range: SlotRange,
) -> Result<Vec<Transaction>, StoreError> {
    let backend = pool.backend();
    let sql = backend.sql(&format!(
        "SELECT {} FROM transactions WHERE slot >= ? AND slot <= ? ORDER BY slot ASC, signature ASC",
        select_columns(backend)
    ));

    with_pool!(pool, p => {
        sqlx::query_as::<_, Transaction>(&sql)
            .bind(range.start)
            .bind(range.end)
            .fetch(p)
            .try_filter(|tx| future::ready(tx.program_ids.contains(program_id)))
            .try_collect::<Vec<_>>()
            .await
    })
    .map_err(|e| StoreError::from_sqlx(e, backend, ENTITY, program_id))
}
