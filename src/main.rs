// Load configuration
// Set up logging
// Open the pool (migrations run before it is handed back)
// Report schema status and row counts

use chain_store::config::Config;
use chain_store::db::{self, stats, Migrator};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting chain-store on {}", config.database.backend);

    let pool = db::establish_connection(&config.database).await?;
    db::test_connection(&pool).await?;
    tracing::info!("Database connection verified");

    let report = Migrator::new(pool.backend()).status(&pool).await?;
    for unit in &report.units {
        tracing::info!(
            "unit {:04}_{}: {:?}{}",
            unit.version,
            unit.name,
            unit.state,
            unit.applied_at
                .map(|at| format!(" at {}", at.to_rfc3339()))
                .unwrap_or_default()
        );
    }

    for count in stats::table_counts(&pool).await? {
        tracing::info!("{:<20} {}", count.table, count.rows);
    }

    pool.close().await;
    Ok(())
}
