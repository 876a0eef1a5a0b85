#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::Message;
use chrono::{FixedOffset, TimeZone, Utc};
use serde_json::Value;
use signage_core::builder::ScenarioBuilder;
use signage_core::clock::{SimulatedTimeSource, TimeSource};
use signage_core::record::{NewScenarioRecord, ScenarioRecord};
use signage_core::store::{MemoryScenarioStore, ScenarioStore, StoreError, StoreResult};
use signage_core::types::{DbId, LocalTimestamp, Timestamp};
use tokio::sync::{mpsc, Notify};

use signage_api::commands::CommandRegistry;
use signage_api::coordinator::Coordinator;
use signage_api::engine::TimelineConfig;

pub const TOKEN: &str = "test-token";

/// Default display time used by test timelines.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Wednesday 2026-03-04 12:00 UTC.
pub fn t0() -> Timestamp {
    Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap()
}

pub fn timeline_config() -> TimelineConfig {
    TimelineConfig {
        default_timeout: DEFAULT_TIMEOUT,
        display_offset: FixedOffset::east_opt(0).unwrap(),
    }
}

/// Minimal insertable record with no schedule constraints.
pub fn record(title: &str, priority: i32) -> NewScenarioRecord {
    NewScenarioRecord {
        title: title.to_string(),
        handler: "slideshow".to_string(),
        handler_options: Some(r#"{"images":["a.png"]}"#.to_string()),
        priority,
        date_start: None,
        date_end: None,
        week_days: None,
        hour_start: None,
        hour_end: None,
        display_limit: None,
        display_timeout_ms: None,
    }
}

/// Coordinator over `store` driven by `clock`, with the built-in commands.
pub fn coordinator(store: Arc<dyn ScenarioStore>, clock: Arc<dyn TimeSource>) -> Arc<Coordinator> {
    Arc::new(Coordinator::new(
        store,
        ScenarioBuilder::default(),
        clock,
        CommandRegistry::with_defaults(),
        TOKEN,
        timeline_config(),
    ))
}

pub fn simulated_clock() -> SimulatedTimeSource {
    SimulatedTimeSource::new(t0())
}

/// Inbound message text carrying the test token.
pub fn message(command: &str, params: Value) -> String {
    serde_json::json!({
        "token": TOKEN,
        "payload": { "command": command, "params": params },
    })
    .to_string()
}

/// Decode every text frame waiting in `rx`.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Value> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        if let Message::Text(text) = msg {
            out.push(serde_json::from_str(text.as_str()).unwrap());
        }
    }
    out
}

/// Scenario ids carried by the `runScenario` frames in `frames`.
pub fn run_scenario_ids(frames: &[Value]) -> Vec<Option<DbId>> {
    frames
        .iter()
        .filter(|f| f["payload"]["command"] == "runScenario")
        .map(|f| f["payload"]["params"]["scenario"]["id"].as_i64())
        .collect()
}

// ---------------------------------------------------------------------------
// Instrumented store
// ---------------------------------------------------------------------------

/// In-memory store with hooks for ordering and failure injection.
///
/// - `gate(id)` makes `find_by_id(id)` wait until the returned `Notify` is
///   signalled.
/// - `fail_best_candidate(n)` makes the next `n` selections fail.
/// - `panic_on_best_candidate(nth)` panics on the given selection call
///   (1-based).
/// - `fail_inserts()` / `fail_mark_displayed()` make every later write of
///   that kind fail.
#[derive(Default)]
pub struct InstrumentedStore {
    inner: MemoryScenarioStore,
    gates: Mutex<HashMap<DbId, Arc<Notify>>>,
    lookups: Mutex<HashMap<DbId, usize>>,
    best_candidate_calls: AtomicUsize,
    failures_left: AtomicUsize,
    panic_on_call: AtomicUsize,
    panicked: AtomicBool,
    inserts_fail: AtomicBool,
    mark_displayed_fails: AtomicBool,
}

impl InstrumentedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_record(&self, record: NewScenarioRecord) -> DbId {
        self.inner.insert(record).await.unwrap()
    }

    pub async fn get(&self, id: DbId) -> Option<ScenarioRecord> {
        self.inner.get(id).await
    }

    pub fn gate(&self, id: DbId) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(id, Arc::clone(&notify));
        notify
    }

    pub fn lookups(&self, id: DbId) -> usize {
        self.lookups.lock().unwrap().get(&id).copied().unwrap_or(0)
    }

    /// Yield until `find_by_id(id)` has been entered `count` times.
    pub async fn wait_for_lookups(&self, id: DbId, count: usize) {
        while self.lookups(id) < count {
            tokio::task::yield_now().await;
        }
    }

    pub fn best_candidate_calls(&self) -> usize {
        self.best_candidate_calls.load(Ordering::SeqCst)
    }

    pub fn fail_best_candidate(&self, times: usize) {
        self.failures_left.store(times, Ordering::SeqCst);
    }

    pub fn panic_on_best_candidate(&self, nth_call: usize) {
        self.panic_on_call.store(nth_call, Ordering::SeqCst);
    }

    pub fn fail_inserts(&self) {
        self.inserts_fail.store(true, Ordering::SeqCst);
    }

    pub fn fail_mark_displayed(&self) {
        self.mark_displayed_fails.store(true, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.inner.len().await
    }
}

#[async_trait]
impl ScenarioStore for InstrumentedStore {
    async fn find_best_candidate(&self, now: LocalTimestamp) -> StoreResult<Option<ScenarioRecord>> {
        let call = self.best_candidate_calls.fetch_add(1, Ordering::SeqCst) + 1;

        if call == self.panic_on_call.load(Ordering::SeqCst) && !self.panicked.swap(true, Ordering::SeqCst) {
            panic!("injected selection panic");
        }

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Backend("injected store failure".into()));
        }

        self.inner.find_best_candidate(now).await
    }

    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<ScenarioRecord>> {
        *self.lookups.lock().unwrap().entry(id).or_default() += 1;
        let gate = self.gates.lock().unwrap().get(&id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.inner.find_by_id(id).await
    }

    async fn insert(&self, record: NewScenarioRecord) -> StoreResult<DbId> {
        if self.inserts_fail.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected insert failure".into()));
        }
        self.inner.insert(record).await
    }

    async fn mark_displayed(&self, id: DbId, now: Timestamp) -> StoreResult<()> {
        if self.mark_displayed_fails.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected mark-displayed failure".into()));
        }
        self.inner.mark_displayed(id, now).await
    }
}
