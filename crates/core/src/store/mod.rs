//! Scenario persistence contract.
//!
//! The scheduler and command handlers only talk to storage through
//! [`ScenarioStore`]. Implementations: [`MemoryScenarioStore`] here, and the
//! PostgreSQL store in the `signage-db` crate.

mod memory;

use async_trait::async_trait;

use crate::record::{NewScenarioRecord, ScenarioRecord};
use crate::types::{DbId, LocalTimestamp, Timestamp};

pub use memory::MemoryScenarioStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Scenario {0} not found")]
    NotFound(DbId),

    #[error("Store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable home of scenario records.
#[async_trait]
pub trait ScenarioStore: Send + Sync {
    /// The best eligible record at `now`, per [`crate::selection`].
    ///
    /// `Ok(None)` means nothing is eligible, which is not an error.
    async fn find_best_candidate(&self, now: LocalTimestamp) -> StoreResult<Option<ScenarioRecord>>;

    /// Look up a record by id, regardless of eligibility.
    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<ScenarioRecord>>;

    /// Persist a new record and return its id.
    async fn insert(&self, record: NewScenarioRecord) -> StoreResult<DbId>;

    /// Count one more display of `id` and remember when it happened.
    async fn mark_displayed(&self, id: DbId, now: Timestamp) -> StoreResult<()>;

    /// Cheap liveness probe.
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}
