//! PostgreSQL persistence for scenarios.
//!
//! Pool helpers, the `scenarios` row model, [`ScenarioRepo`](repositories::ScenarioRepo)
//! and [`PgScenarioStore`], the [`ScenarioStore`](signage_core::store::ScenarioStore)
//! implementation used in production.

use sqlx::postgres::PgPoolOptions;

pub mod models;
pub mod repositories;
pub mod store;

pub use store::PgScenarioStore;

pub type DbPool = sqlx::PgPool;

/// The coordinator issues one query at a time; a couple of spare connections
/// cover health checks and admin commands overlapping the timeline.
const MAX_CONNECTIONS: u32 = 5;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to verify the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply the bundled migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
