use chrono::Utc;
use tracing::debug;

use crate::db::connection::DbPool;
use crate::error::StoreError;
use crate::models::{AccountLabel, AccountLabelType, NewLabel, WalletLabel, WalletLabelType};

const LABEL_COLUMNS: &str = "id, address, label, label_type, source, confidence, created_at";

pub async fn add_account_label(pool: &DbPool, label: &NewLabel<AccountLabelType>) -> Result<(), StoreError> {
    insert_label(pool, "account_labels", "account label", label, label.label_type.as_str()).await
}

pub async fn add_wallet_label(pool: &DbPool, label: &NewLabel<WalletLabelType>) -> Result<(), StoreError> {
    insert_label(pool, "wallet_labels", "wallet label", label, label.label_type.as_str()).await
}

async fn insert_label<T>(
    pool: &DbPool,
    table: &str,
    entity: &'static str,
    label: &NewLabel<T>,
    label_type: &str,
) -> Result<(), StoreError> {
    let backend = pool.backend();

    if !label.confidence_in_range() {
        return Err(StoreError::constraint(
            backend,
            entity,
            &label.address,
            format!("confidence {} outside 0.0..=1.0", label.confidence),
        ));
    }

    let sql = backend.sql(&format!(
        "INSERT INTO {} (address, label, label_type, source, confidence, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        table
    ));

    with_pool!(pool, p => {
        sqlx::query(&sql)
            .bind(&label.address)
            .bind(&label.label)
            .bind(label_type)
            .bind(label.source.as_str())
            .bind(label.confidence)
            .bind(Utc::now())
            .execute(p)
            .await
            .map(|_| ())
    })
    .map_err(|e| StoreError::from_sqlx(e, backend, entity, &label.address))?;

    debug!("Labelled {} as {} ({})", label.address, label.label, label_type);
    Ok(())
}

/// Labels attached to `address`, oldest first.
pub async fn account_labels_for(pool: &DbPool, address: &str) -> Result<Vec<AccountLabel>, StoreError> {
    let backend = pool.backend();
    let sql = backend.sql(&format!(
        "SELECT {} FROM account_labels WHERE address = ? ORDER BY created_at ASC, id ASC",
        LABEL_COLUMNS
    ));

    with_pool!(pool, p => sqlx::query_as::<_, AccountLabel>(&sql).bind(address).fetch_all(p).await)
        .map_err(|e| StoreError::from_sqlx(e, backend, "account label", address))
}

pub async fn wallet_labels_for(pool: &DbPool, address: &str) -> Result<Vec<WalletLabel>, StoreError> {
    let backend = pool.backend();
    let sql = backend.sql(&format!(
        "SELECT {} FROM wallet_labels WHERE address = ? ORDER BY created_at ASC, id ASC",
        LABEL_COLUMNS
    ));

    with_pool!(pool, p => sqlx::query_as::<_, WalletLabel>(&sql).bind(address).fetch_all(p).await)
        .map_err(|e| StoreError::from_sqlx(e, backend, "wallet label", address))
}
