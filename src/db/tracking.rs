// Tracked accounts and their activity log.
// - activity_count and last_activity only change together with an activity insert
// - activities are append-only and read back ordered by timestamp, then slot

use chrono::Utc;
use tracing::{debug, info};

use super::{exists_sql, BeginWrite, Guarded};
use crate::db::connection::DbPool;
use crate::error::StoreError;
use crate::models::{AccountActivity, NewAccountActivity, NewTrackedAccount, TimeRange, TrackedAccount};
use crate::schema::{Assignment, Backend};

const ENTITY: &str = "tracked account";
const ACTIVITY_ENTITY: &str = "account activity";

const ACTIVITY_COLUMNS: &str = "id, account_address, activity_type, change_type, old_value, new_value, \
     timestamp, block_slot, lamports_change, data_size_change, transaction_signature, program_id, instruction_type";

fn tracked_columns(backend: Backend) -> String {
    format!(
        "id, address, name, program_id, is_active, created_at, last_activity, activity_count, \
         balance_threshold, data_size_threshold, {} AS tags",
        backend.json_text("tags")
    )
}

/// Insert a tracked account or update its settings. Activity bookkeeping is left alone.
pub async fn upsert_tracked_account(pool: &DbPool, account: &NewTrackedAccount) -> Result<(), StoreError> {
    let backend = pool.backend();
    let tags = account.tags.to_json()?;
    let sql = backend.sql(&backend.upsert(
        "tracked_accounts",
        &[
            "address",
            "name",
            "program_id",
            "is_active",
            "created_at",
            "balance_threshold",
            "data_size_threshold",
            "tags",
        ],
        &["?", "?", "?", "?", "?", "?", "?", backend.json_param()],
        &["address"],
        &[
            Assignment::Replace("name"),
            Assignment::Replace("program_id"),
            Assignment::Replace("is_active"),
            Assignment::Replace("balance_threshold"),
            Assignment::Replace("data_size_threshold"),
            Assignment::Replace("tags"),
        ],
    ));

    with_pool!(pool, p => {
        sqlx::query(&sql)
            .bind(&account.address)
            .bind(&account.name)
            .bind(&account.program_id)
            .bind(account.is_active)
            .bind(Utc::now())
            .bind(account.balance_threshold)
            .bind(account.data_size_threshold)
            .bind(&tags)
            .execute(p)
            .await
            .map(|_| ())
    })
    .map_err(|e| StoreError::from_sqlx(e, backend, ENTITY, &account.address))?;

    info!("Tracking account {}", account.address);
    Ok(())
}

pub async fn get_tracked_account(pool: &DbPool, address: &str) -> Result<Option<TrackedAccount>, StoreError> {
    let backend = pool.backend();
    let sql = backend.sql(&format!(
        "SELECT {} FROM tracked_accounts WHERE address = ?",
        tracked_columns(backend)
    ));

    with_pool!(pool, p => sqlx::query_as::<_, TrackedAccount>(&sql).bind(address).fetch_optional(p).await)
        .map_err(|e| StoreError::from_sqlx(e, backend, ENTITY, address))
}

/// Look up by address, falling back to the display name. Names are not unique;
/// the earliest tracked entry with that name wins.
pub async fn find_tracked_account(pool: &DbPool, identifier: &str) -> Result<Option<TrackedAccount>, StoreError> {
    if let Some(account) = get_tracked_account(pool, identifier).await? {
        return Ok(Some(account));
    }

    let backend = pool.backend();
    let sql = backend.sql(&format!(
        "SELECT {} FROM tracked_accounts WHERE name = ? ORDER BY id ASC LIMIT 1",
        tracked_columns(backend)
    ));

    with_pool!(pool, p => sqlx::query_as::<_, TrackedAccount>(&sql).bind(identifier).fetch_optional(p).await)
        .map_err(|e| StoreError::from_sqlx(e, backend, ENTITY, identifier))
}

pub async fn list_tracked_accounts(pool: &DbPool, active_only: bool) -> Result<Vec<TrackedAccount>, StoreError> {
    let backend = pool.backend();
    let filter = if active_only { " WHERE is_active = ?" } else { "" };
    let sql = backend.sql(&format!(
        "SELECT {} FROM tracked_accounts{} ORDER BY id ASC",
        tracked_columns(backend),
        filter
    ));

    with_pool!(pool, p => {
        let mut query = sqlx::query_as::<_, TrackedAccount>(&sql);
        if active_only {
            query = query.bind(true);
        }
        query.fetch_all(p).await
    })
    .map_err(|e| StoreError::from_sqlx(e, backend, ENTITY, "all"))
}

/// Soft delete. Returns false when the address was never tracked.
pub async fn deactivate_tracked_account(pool: &DbPool, address: &str) -> Result<bool, StoreError> {
    let backend = pool.backend();
    let sql = backend.sql("UPDATE tracked_accounts SET is_active = ? WHERE address = ?");

    let rows = with_pool!(pool, p => {
        sqlx::query(&sql)
            .bind(false)
            .bind(address)
            .execute(p)
            .await
            .map(|r| r.rows_affected())
    })
    .map_err(|e| StoreError::from_sqlx(e, backend, ENTITY, address))?;

    if rows > 0 {
        info!("Stopped tracking account {}", address);
        return Ok(true);
    }
    Ok(get_tracked_account(pool, address).await?.is_some())
}

/// Append an activity and bump the tracked account's counters in one transaction.
///
/// Fails with a constraint violation when the tracked account or the block slot
/// is missing, or when a numeric old/new pair disagrees with the reported delta.
pub async fn append_account_activity(pool: &DbPool, activity: &NewAccountActivity) -> Result<(), StoreError> {
    let backend = pool.backend();
    let key = activity.account_address.as_str();

    activity
        .check_delta()
        .map_err(|detail| StoreError::constraint(backend, ACTIVITY_ENTITY, key, detail))?;

    let tracked_sql = exists_sql(backend, "tracked_accounts", "address");
    let slot_sql = exists_sql(backend, "slots", "slot");
    let insert_sql = backend.sql(
        "INSERT INTO account_activities \
         (account_address, activity_type, change_type, old_value, new_value, timestamp, block_slot, \
          lamports_change, data_size_change, transaction_signature, program_id, instruction_type) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    );
    let counter_sql = counter_sql(backend, "tracked_accounts");

    let outcome = with_pool!(pool, p => async {
        let mut tx = p.begin_write().await?;

        let tracked: i64 = sqlx::query_scalar(&tracked_sql).bind(key).fetch_one(&mut *tx).await?;
        if tracked == 0 {
            return Ok(Guarded::Missing("tracked account", key.to_string()));
        }

        let slot: i64 = sqlx::query_scalar(&slot_sql)
            .bind(activity.block_slot)
            .fetch_one(&mut *tx)
            .await?;
        if slot == 0 {
            return Ok(Guarded::Missing("slot", activity.block_slot.to_string()));
        }

        sqlx::query(&insert_sql)
            .bind(key)
            .bind(activity.activity_type.as_str())
            .bind(&activity.change_type)
            .bind(&activity.old_value)
            .bind(&activity.new_value)
            .bind(activity.timestamp)
            .bind(activity.block_slot)
            .bind(activity.lamports_change)
            .bind(activity.data_size_change)
            .bind(&activity.transaction_signature)
            .bind(&activity.program_id)
            .bind(&activity.instruction_type)
            .execute(&mut *tx)
            .await?;

        sqlx::query(&counter_sql)
            .bind(activity.timestamp)
            .bind(activity.timestamp)
            .bind(key)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok::<_, sqlx::Error>(Guarded::Written)
    }
    .await)
    .map_err(|e| StoreError::from_sqlx(e, backend, ACTIVITY_ENTITY, key))?;

    outcome.into_result(backend, ACTIVITY_ENTITY, key)?;
    debug!(
        "Recorded {} for {} at slot {}",
        activity.activity_type, key, activity.block_slot
    );
    Ok(())
}

/// `activity_count + 1` and `last_activity = max(last_activity, ?)`, keyed by address.
pub(super) fn counter_sql(backend: Backend, table: &str) -> String {
    backend.sql(&format!(
        "UPDATE {} SET activity_count = activity_count + 1, \
         last_activity = CASE WHEN last_activity IS NULL OR last_activity < ? THEN ? ELSE last_activity END \
         WHERE address = ?",
        table
    ))
}

/// Activities of `address` within `range`, in replay order.
pub async fn query_activities(
    pool: &DbPool,
    address: &str,
    range: TimeRange,
) -> Result<Vec<AccountActivity>, StoreError> {
    let backend = pool.backend();
    let sql = backend.sql(&format!(
        "SELECT {} FROM account_activities \
         WHERE account_address = ? AND timestamp >= ? AND timestamp < ? \
         ORDER BY timestamp ASC, block_slot ASC, id ASC",
        ACTIVITY_COLUMNS
    ));

    with_pool!(pool, p => {
        sqlx::query_as::<_, AccountActivity>(&sql)
            .bind(address)
            .bind(range.start)
            .bind(range.end)
            .fetch_all(p)
            .await
    })
    .map_err(|e| StoreError::from_sqlx(e, backend, ACTIVITY_ENTITY, address))
}

/// Newest first, for reporting.
pub async fn recent_account_activities(
    pool: &DbPool,
    address: &str,
    limit: i64,
) -> Result<Vec<AccountActivity>, StoreError> {
    let backend = pool.backend();
    let sql = backend.sql(&format!(
        "SELECT {} FROM account_activities WHERE account_address = ? \
         ORDER BY timestamp DESC, block_slot DESC, id DESC LIMIT ?",
        ACTIVITY_COLUMNS
    ));

    with_pool!(pool, p => {
        sqlx::query_as::<_, AccountActivity>(&sql)
            .bind(address)
            .bind(limit)
            .fetch_all(p)
            .await
    })
    .map_err(|e| StoreError::from_sqlx(e, backend, ACTIVITY_ENTITY, address))
}
