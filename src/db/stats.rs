use crate::db::connection::DbPool;
use crate::error::StoreError;
use crate::models::TableCount;
use crate::schema::model;

/// Row count of every entity table, in creation order.
pub async fn table_counts(pool: &DbPool) -> Result<Vec<TableCount>, StoreError> {
    let backend = pool.backend();
    let mut counts = Vec::new();

    for table in model::entity_tables() {
        let sql = format!("SELECT COUNT(*) FROM {}", table.name);
        let rows = with_pool!(pool, p => sqlx::query_scalar::<_, i64>(&sql).fetch_one(p).await)
            .map_err(|e| StoreError::from_sqlx(e, backend, "table", table.name))?;

        counts.push(TableCount {
            table: table.name,
            rows,
        });
    }

    Ok(counts)
}
