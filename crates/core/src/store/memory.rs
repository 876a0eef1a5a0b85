use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::record::{NewScenarioRecord, ScenarioRecord};
use crate::selection;
use crate::store::{ScenarioStore, StoreError, StoreResult};
use crate::types::{DbId, LocalTimestamp, Timestamp};

/// Process-local scenario store.
///
/// Used for database-less runs and tests. Ranking goes through
/// [`selection::best_candidate`], so it follows the same policy as the SQL
/// store.
#[derive(Debug, Default)]
pub struct MemoryScenarioStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    records: BTreeMap<DbId, ScenarioRecord>,
    last_id: DbId,
}

impl MemoryScenarioStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `records`, keeping their ids.
    pub fn with_records(records: impl IntoIterator<Item = ScenarioRecord>) -> Self {
        let mut inner = Inner::default();
        for record in records {
            inner.last_id = inner.last_id.max(record.id);
            inner.records.insert(record.id, record);
        }
        Self {
            inner: RwLock::new(inner),
        }
    }

    /// Snapshot of a single record.
    pub async fn get(&self, id: DbId) -> Option<ScenarioRecord> {
        self.inner.read().await.records.get(&id).cloned()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ScenarioStore for MemoryScenarioStore {
    async fn find_best_candidate(&self, now: LocalTimestamp) -> StoreResult<Option<ScenarioRecord>> {
        let inner = self.inner.read().await;
        Ok(selection::best_candidate(inner.records.values(), &now).cloned())
    }

    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<ScenarioRecord>> {
        Ok(self.get(id).await)
    }

    async fn insert(&self, record: NewScenarioRecord) -> StoreResult<DbId> {
        let mut inner = self.inner.write().await;
        inner.last_id += 1;
        let id = inner.last_id;
        inner.records.insert(id, ScenarioRecord::from_new(id, record));
        Ok(id)
    }

    async fn mark_displayed(&self, id: DbId, now: Timestamp) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let record = inner.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.display_count += 1;
        record.display_date_last = Some(now);
        Ok(())
    }
}
