// Tracked wallets, their activity log and balance history.

use chrono::Utc;
use tracing::{debug, info};

use super::tracking::counter_sql;
use super::{exists_sql, BeginWrite, Guarded};
use crate::db::connection::DbPool;
use crate::error::StoreError;
use crate::models::{NewTrackedWallet, NewWalletActivity, NewWalletBalance, TimeRange, TrackedWallet, WalletActivity, WalletBalance};
use crate::schema::{Assignment, Backend};

const ENTITY: &str = "tracked wallet";
const ACTIVITY_ENTITY: &str = "wallet activity";
const BALANCE_ENTITY: &str = "wallet balance";

const ACTIVITY_COLUMNS: &str = "id, wallet_address, activity_type, transaction_signature, amount, token_symbol, \
     counterparty, timestamp, block_slot, fee, status, details";
const BALANCE_COLUMNS: &str = "id, wallet_address, token_mint, token_symbol, balance, slot, timestamp";

fn tracked_columns(backend: Backend) -> String {
    format!(
        "id, address, name, is_active, created_at, last_activity, activity_count, balance_threshold, {} AS tags",
        backend.json_text("tags")
    )
}

pub async fn upsert_tracked_wallet(pool: &DbPool, wallet: &NewTrackedWallet) -> Result<(), StoreError> {
    let backend = pool.backend();
    let tags = wallet.tags.to_json()?;
    let sql = backend.sql(&backend.upsert(
        "tracked_wallets",
        &["address", "name", "is_active", "created_at", "balance_threshold", "tags"],
        &["?", "?", "?", "?", "?", backend.json_param()],
        &["address"],
        &[
            Assignment::Replace("name"),
            Assignment::Replace("is_active"),
            Assignment::Replace("balance_threshold"),
            Assignment::Replace("tags"),
        ],
    ));

    with_pool!(pool, p => {
        sqlx::query(&sql)
            .bind(&wallet.address)
            .bind(&wallet.name)
            .bind(wallet.is_active)
            .bind(Utc::now())
            .bind(wallet.balance_threshold)
            .bind(&tags)
            .execute(p)
            .await
            .map(|_| ())
    })
    .map_err(|e| StoreError::from_sqlx(e, backend, ENTITY, &wallet.address))?;

    info!("Tracking wallet {}", wallet.address);
    Ok(())
}

pub async fn get_tracked_wallet(pool: &DbPool, address: &str) -> Result<Option<TrackedWallet>, StoreError> {
    let backend = pool.backend();
    let sql = backend.sql(&format!(
        "SELECT {} FROM tracked_wallets WHERE address = ?",
        tracked_columns(backend)
    ));

    with_pool!(pool, p => sqlx::query_as::<_, TrackedWallet>(&sql).bind(address).fetch_optional(p).await)
        .map_err(|e| StoreError::from_sqlx(e, backend, ENTITY, address))
}

/// Address first, then the earliest wallet carrying `identifier` as its name.
pub async fn find_tracked_wallet(pool: &DbPool, identifier: &str) -> Result<Option<TrackedWallet>, StoreError> {
    if let Some(wallet) = get_tracked_wallet(pool, identifier).await? {
        return Ok(Some(wallet));
    }

    let backend = pool.backend();
    let sql = backend.sql(&format!(
        "SELECT {} FROM tracked_wallets WHERE name = ? ORDER BY id ASC LIMIT 1",
        tracked_columns(backend)
    ));

    with_pool!(pool, p => sqlx::query_as::<_, TrackedWallet>(&sql).bind(identifier).fetch_optional(p).await)
        .map_err(|e| StoreError::from_sqlx(e, backend, ENTITY, identifier))
}

pub async fn list_tracked_wallets(pool: &DbPool, active_only: bool) -> Result<Vec<TrackedWallet>, StoreError> {
    let backend = pool.backend();
    let filter = if active_only { " WHERE is_active = ?" } else { "" };
    let sql = backend.sql(&format!(
        "SELECT {} FROM tracked_wallets{} ORDER BY id ASC",
        tracked_columns(backend),
        filter
    ));

    with_pool!(pool, p => {
        let mut query = sqlx::query_as::<_, TrackedWallet>(&sql);
        if active_only {
            query = query.bind(true);
        }
        query.fetch_all(p).await
    })
    .map_err(|e| StoreError::from_sqlx(e, backend, ENTITY, "all"))
}

/// Soft delete. Returns false when the address was never tracked.
pub async fn deactivate_tracked_wallet(pool: &DbPool, address: &str) -> Result<bool, StoreError> {
    let backend = pool.backend();
    let sql = backend.sql("UPDATE tracked_wallets SET is_active = ? WHERE address = ?");

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
        info!("Stopped tracking wallet {}", address);
        return Ok(true);
    }
    Ok(get_tracked_wallet(pool, address).await?.is_some())
}

/// Append a wallet activity and bump the wallet's counters in one transaction.
///
/// The wallet, the transaction and the block slot must already exist.
pub async fn append_wallet_activity(pool: &DbPool, activity: &NewWalletActivity) -> Result<(), StoreError> {
    let backend = pool.backend();
    let key = activity.wallet_address.as_str();

    let wallet_sql = exists_sql(backend, "tracked_wallets", "address");
    let transaction_sql = exists_sql(backend, "transactions", "signature");
    let slot_sql = exists_sql(backend, "slots", "slot");
    let insert_sql = backend.sql(
        "INSERT INTO wallet_activities \
         (wallet_address, activity_type, transaction_signature, amount, token_symbol, counterparty, \
          timestamp, block_slot, fee, status, details) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    );
    let counter_sql = counter_sql(backend, "tracked_wallets");

    let outcome = with_pool!(pool, p => async {
        let mut tx = p.begin_write().await?;

        let wallet: i64 = sqlx::query_scalar(&wallet_sql).bind(key).fetch_one(&mut *tx).await?;
        if wallet == 0 {
            return Ok(Guarded::Missing("tracked wallet", key.to_string()));
        }

        let transaction: i64 = sqlx::query_scalar(&transaction_sql)
            .bind(&activity.transaction_signature)
            .fetch_one(&mut *tx)
            .await?;
        if transaction == 0 {
            return Ok(Guarded::Missing("transaction", activity.transaction_signature.clone()));
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
            .bind(&activity.transaction_signature)
            .bind(activity.amount)
            .bind(&activity.token_symbol)
            .bind(&activity.counterparty)
            .bind(activity.timestamp)
            .bind(activity.block_slot)
            .bind(activity.fee)
            .bind(activity.status.as_str())
            .bind(&activity.details)
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
        "Recorded {} for wallet {} in {}",
        activity.activity_type, key, activity.transaction_signature
    );
    Ok(())
}

/// Activities of `address` within `range`, in replay order.
pub async fn query_wallet_activities(
    pool: &DbPool,
    address: &str,
    range: TimeRange,
) -> Result<Vec<WalletActivity>, StoreError> {
    let backend = pool.backend();
    let sql = backend.sql(&format!(
        "SELECT {} FROM wallet_activities \
         WHERE wallet_address = ? AND timestamp >= ? AND timestamp < ? \
         ORDER BY timestamp ASC, block_slot ASC, id ASC",
        ACTIVITY_COLUMNS
    ));

    with_pool!(pool, p => {
        sqlx::query_as::<_, WalletActivity>(&sql)
            .bind(address)
            .bind(range.start)
            .bind(range.end)
            .fetch_all(p)
            .await
    })
    .map_err(|e| StoreError::from_sqlx(e, backend, ACTIVITY_ENTITY, address))
}

pub async fn recent_wallet_activities(
    pool: &DbPool,
    address: &str,
    limit: i64,
) -> Result<Vec<WalletActivity>, StoreError> {
    let backend = pool.backend();
    let sql = backend.sql(&format!(
        "SELECT {} FROM wallet_activities WHERE wallet_address = ? \
         ORDER BY timestamp DESC, block_slot DESC, id DESC LIMIT ?",
        ACTIVITY_COLUMNS
    ));

    with_pool!(pool, p => {
        sqlx::query_as::<_, WalletActivity>(&sql)
            .bind(address)
            .bind(limit)
            .fetch_all(p)
            .await
    })
    .map_err(|e| StoreError::from_sqlx(e, backend, ACTIVITY_ENTITY, address))
}

/// Record a balance observation. Repeats for the same wallet, mint and slot are kept;
/// readers take the latest one.
pub async fn append_wallet_balance(pool: &DbPool, balance: &NewWalletBalance) -> Result<(), StoreError> {
    let backend = pool.backend();
    let sql = backend.sql(
        "INSERT INTO wallet_balances (wallet_address, token_mint, token_symbol, balance, slot, timestamp) \
         VALUES (?, ?, ?, ?, ?, ?)",
    );

    with_pool!(pool, p => {
        sqlx::query(&sql)
            .bind(&balance.wallet_address)
            .bind(&balance.token_mint)
            .bind(&balance.token_symbol)
            .bind(balance.balance)
            .bind(balance.slot)
            .bind(balance.timestamp)
            .execute(p)
            .await
            .map(|_| ())
    })
    .map_err(|e| StoreError::from_sqlx(e, backend, BALANCE_ENTITY, &balance.wallet_address))?;

    debug!(
        "Balance of {} ({}) at slot {}: {}",
        balance.wallet_address,
        balance.token_mint.as_deref().unwrap_or("native"),
        balance.slot,
        balance.balance
    );
    Ok(())
}

/// Balance of `wallet` in `token_mint` (`None` for the base currency) as of `slot`:
/// the latest slot at or below it, and within that slot the last row written.
pub async fn current_wallet_balance(
    pool: &DbPool,
    wallet: &str,
    token_mint: Option<&str>,
    slot: i64,
) -> Result<Option<WalletBalance>, StoreError> {
    let backend = pool.backend();
    let mint_filter = if token_mint.is_some() { "token_mint = ?" } else { "token_mint IS NULL" };
    let sql = backend.sql(&format!(
        "SELECT {} FROM wallet_balances \
         WHERE wallet_address = ? AND {} AND slot <= ? \
         ORDER BY slot DESC, id DESC LIMIT 1",
        BALANCE_COLUMNS, mint_filter
    ));

    with_pool!(pool, p => {
        let mut query = sqlx::query_as::<_, WalletBalance>(&sql).bind(wallet);
        if let Some(mint) = token_mint {
            query = query.bind(mint);
        }
        query.bind(slot).fetch_optional(p).await
    })
    .map_err(|e| StoreError::from_sqlx(e, backend, BALANCE_ENTITY, wallet))
}
