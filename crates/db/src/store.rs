//! [`ScenarioStore`] backed by PostgreSQL.

use async_trait::async_trait;
use chrono::Utc;
use signage_core::record::{NewScenarioRecord, ScenarioRecord};
use signage_core::selection::weekday_index;
use signage_core::store::{ScenarioStore, StoreError, StoreResult};
use signage_core::types::{DbId, LocalTimestamp, Timestamp};

use crate::repositories::ScenarioRepo;
use crate::DbPool;

/// Scenario store over the process-wide connection pool.
#[derive(Debug, Clone)]
pub struct PgScenarioStore {
    pool: DbPool,
}

impl PgScenarioStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(Box::new(err))
}

#[async_trait]
impl ScenarioStore for PgScenarioStore {
    async fn find_best_candidate(&self, now: LocalTimestamp) -> StoreResult<Option<ScenarioRecord>> {
        let row = ScenarioRepo::find_best_candidate(
            &self.pool,
            now.with_timezone(&Utc),
            weekday_index(&now),
            now.time(),
        )
        .await
        .map_err(backend)?;
        Ok(row.map(ScenarioRecord::from))
    }

    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<ScenarioRecord>> {
        let row = ScenarioRepo::find_by_id(&self.pool, id)
            .await
            .map_err(backend)?;
        Ok(row.map(ScenarioRecord::from))
    }

    async fn insert(&self, record: NewScenarioRecord) -> StoreResult<DbId> {
        let id = ScenarioRepo::create(&self.pool, &record)
            .await
            .map_err(backend)?;
        tracing::debug!(scenario_id = id, handler = %record.handler, "Scenario row inserted");
        Ok(id)
    }

    async fn mark_displayed(&self, id: DbId, now: Timestamp) -> StoreResult<()> {
        let updated = ScenarioRepo::mark_displayed(&self.pool, id, now)
            .await
            .map_err(backend)?;
        if updated {
            Ok(())
        } else {
            Err(StoreError::NotFound(id))
        }
    }

    async fn health_check(&self) -> StoreResult<()> {
        crate::health_check(&self.pool).await.map_err(backend)
    }
}
