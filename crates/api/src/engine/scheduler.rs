//! Display timeline: picks the scenario every display should show and when
//! to pick the next one.
//!
//! Every selection runs in three steps. `begin` bumps the generation and
//! cancels the armed timer, the store is queried without holding the state
//! lock, and `apply` installs the result only if no newer selection has begun
//! in the meantime. A late result from a superseded generation is dropped,
//! so overlapping force-runs resolve to whichever was requested last.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::FixedOffset;
use futures::FutureExt;
use serde::Serialize;
use serde_json::{Map, Value};
use signage_core::builder::ScenarioBuilder;
use signage_core::clock::TimeSource;
use signage_core::error::CoreError;
use signage_core::protocol::Payload;
use signage_core::scenario::Scenario;
use signage_core::store::{ScenarioStore, StoreError};
use signage_core::types::{DbId, LocalTimestamp};
use tokio::sync::Mutex;

use crate::engine::timer::TimerSlot;
use crate::error::panic_message;
use crate::ws::BroadcastHub;

/// Delay before a crashed timeline cycle is retried.
pub const RESTART_BACKOFF: Duration = Duration::from_secs(3);

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelinePhase {
    /// Nothing showing and no selection in flight.
    Idle,
    AwaitingSelection,
    /// A scenario is current and the next-selection timer is armed.
    Displaying,
}

/// What became of one selection request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionOutcome {
    Displayed { id: DbId },
    /// Nothing eligible (or an unknown id); a retry is armed.
    NoScenario,
    /// The store or the overrides failed; a retry is armed.
    Failed,
    /// A newer selection began before this one resolved.
    Superseded,
}

/// Point-in-time view of the timeline, for health reporting and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineSnapshot {
    pub phase: TimelinePhase,
    pub generation: u64,
    pub current_id: Option<DbId>,
    pub previous_id: Option<DbId>,
    pub timer_armed: bool,
}

/// Timing settings of the timeline.
#[derive(Debug, Clone, Copy)]
pub struct TimelineConfig {
    /// Display time for scenarios without their own timeout, and the retry
    /// delay after an empty or failed selection.
    pub default_timeout: Duration,
    /// Offset of the display network's wall clock.
    pub display_offset: FixedOffset,
}

// ---------------------------------------------------------------------------
// Internal types
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Selection {
    Best,
    ById {
        id: DbId,
        overrides: Map<String, Value>,
    },
}

#[derive(Debug, thiserror::Error)]
enum SelectionFailure {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid overrides for scenario {id}: {source}")]
    Overrides {
        id: DbId,
        #[source]
        source: CoreError,
    },
}

#[derive(Debug)]
struct TimelineState {
    phase: TimelinePhase,
    generation: u64,
    current: Option<Scenario>,
    previous: Option<Scenario>,
    timer: TimerSlot,
    closed: bool,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

pub struct Scheduler {
    store: Arc<dyn ScenarioStore>,
    builder: ScenarioBuilder,
    hub: Arc<BroadcastHub>,
    clock: Arc<dyn TimeSource>,
    config: TimelineConfig,
    state: Mutex<TimelineState>,
    /// Handed to timer tasks so a pending timer never keeps the scheduler alive.
    weak_self: Weak<Scheduler>,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn ScenarioStore>,
        builder: ScenarioBuilder,
        hub: Arc<BroadcastHub>,
        clock: Arc<dyn TimeSource>,
        config: TimelineConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            store,
            builder,
            hub,
            clock,
            config,
            state: Mutex::new(TimelineState {
                phase: TimelinePhase::Idle,
                generation: 0,
                current: None,
                previous: None,
                timer: TimerSlot::new(),
                closed: false,
            }),
            weak_self: weak_self.clone(),
        })
    }

    /// Start the timeline with a best-candidate selection.
    pub async fn start(&self) -> SelectionOutcome {
        tracing::info!(
            default_timeout_ms = millis(self.config.default_timeout),
            "Timeline starting"
        );
        self.run_next().await
    }

    /// Select the best eligible scenario now, pre-empting the armed timer.
    pub async fn run_next(&self) -> SelectionOutcome {
        self.select(Selection::Best, None).await
    }

    /// Display scenario `id` now, with `overrides` merged over its fields.
    ///
    /// An unknown id or invalid overrides arm the default retry, after which
    /// the regular timeline resumes.
    pub async fn force_run(&self, id: DbId, overrides: Option<Map<String, Value>>) -> SelectionOutcome {
        let overrides = overrides.unwrap_or_default();
        self.select(Selection::ById { id, overrides }, None).await
    }

    /// Tell every display to reload. Timeline state is untouched.
    pub async fn reset_displays(&self) -> usize {
        let delivered = self.hub.broadcast(&Payload::reset()).await;
        tracing::info!(delivered, "Reset sent to displays");
        delivered
    }

    /// Scenario currently on screen.
    pub async fn current(&self) -> Option<Scenario> {
        self.state.lock().await.current.clone()
    }

    /// Scenario shown before the current one.
    pub async fn previous(&self) -> Option<Scenario> {
        self.state.lock().await.previous.clone()
    }

    pub async fn snapshot(&self) -> TimelineSnapshot {
        let state = self.state.lock().await;
        TimelineSnapshot {
            phase: state.phase,
            generation: state.generation,
            current_id: state.current.as_ref().map(|s| s.id),
            previous_id: state.previous.as_ref().map(|s| s.id),
            timer_armed: state.timer.is_armed(),
        }
    }

    /// Stop the timeline: cancel the armed timer and discard in-flight
    /// selections. Later selection requests are ignored.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        state.closed = true;
        state.generation += 1;
        state.timer.cancel();
        tracing::info!(generation = state.generation, "Timeline stopped");
    }

    // -----------------------------------------------------------------------
    // Selection cycle
    // -----------------------------------------------------------------------

    /// Run one selection. A panic anywhere in the cycle is contained and the
    /// timeline restarts after [`RESTART_BACKOFF`], whichever entry point
    /// triggered it.
    async fn select(&self, request: Selection, fired_timer: Option<u64>) -> SelectionOutcome {
        let cycle = self.run_cycle(request, fired_timer);
        match AssertUnwindSafe(cycle).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                tracing::error!(
                    panic = %panic_message(&*panic),
                    backoff_ms = millis(RESTART_BACKOFF),
                    "Timeline cycle panicked, restarting after backoff"
                );
                self.recover().await;
                SelectionOutcome::Failed
            }
        }
    }

    async fn run_cycle(&self, request: Selection, fired_timer: Option<u64>) -> SelectionOutcome {
        let Some(generation) = self.begin(fired_timer).await else {
            return SelectionOutcome::Superseded;
        };
        tracing::debug!(generation, ?request, "Selection started");

        let resolved = self.resolve(&request).await;
        self.apply(generation, resolved).await
    }

    /// Re-arm after a panicked cycle unless the timeline is closed or a newer
    /// selection already armed its own timer.
    async fn recover(&self) {
        let mut state = self.state.lock().await;
        if state.closed || state.timer.is_armed() {
            return;
        }
        state.phase = if state.current.is_some() {
            TimelinePhase::Displaying
        } else {
            TimelinePhase::Idle
        };
        self.arm(&mut state, RESTART_BACKOFF);
    }

    /// Open a new generation. `fired_timer` is the generation of the timer
    /// that triggered this selection; if that timer has been replaced the
    /// selection does not happen.
    async fn begin(&self, fired_timer: Option<u64>) -> Option<u64> {
        let mut state = self.state.lock().await;
        if state.closed {
            return None;
        }
        if let Some(timer_generation) = fired_timer {
            if !state.timer.take_if(timer_generation) {
                return None;
            }
        }
        state.generation += 1;
        state.timer.cancel();
        state.phase = TimelinePhase::AwaitingSelection;
        Some(state.generation)
    }

    async fn resolve(&self, request: &Selection) -> Result<Option<Scenario>, SelectionFailure> {
        match request {
            Selection::Best => {
                let record = self.store.find_best_candidate(self.local_now()).await?;
                Ok(record.map(|r| self.builder.build_or_degrade(&r)))
            }
            Selection::ById { id, overrides } => {
                let Some(record) = self.store.find_by_id(*id).await? else {
                    tracing::warn!(scenario_id = id, "Force-run of unknown scenario");
                    return Ok(None);
                };
                self.builder
                    .build_or_degrade(&record)
                    .with_overrides(overrides)
                    .map(Some)
                    .map_err(|source| SelectionFailure::Overrides { id: *id, source })
            }
        }
    }

    async fn apply(
        &self,
        generation: u64,
        resolved: Result<Option<Scenario>, SelectionFailure>,
    ) -> SelectionOutcome {
        let mut state = self.state.lock().await;
        if state.generation != generation {
            tracing::debug!(
                generation,
                latest = state.generation,
                "Discarding superseded selection"
            );
            return SelectionOutcome::Superseded;
        }

        let scenario = match resolved {
            Ok(Some(scenario)) => scenario,
            Ok(None) => {
                tracing::debug!(generation, "No eligible scenario, retry armed");
                self.arm_retry(&mut state);
                return SelectionOutcome::NoScenario;
            }
            Err(e) => {
                tracing::warn!(generation, error = %e, "Selection failed, retry armed");
                self.arm_retry(&mut state);
                return SelectionOutcome::Failed;
            }
        };

        let id = scenario.id;
        let timeout = scenario
            .display_timeout
            .filter(|t| !t.is_zero())
            .unwrap_or(self.config.default_timeout);
        let payload = Payload::run_scenario(Some(&scenario));

        state.previous = state.current.replace(scenario);
        state.phase = TimelinePhase::Displaying;
        self.arm(&mut state, timeout);

        // Sent under the lock so displays never see an older generation
        // after a newer one.
        let delivered = self.hub.broadcast(&payload).await;
        drop(state);

        tracing::info!(
            scenario_id = id,
            generation,
            delivered,
            timeout_ms = millis(timeout),
            "Scenario displayed"
        );

        if let Err(e) = self.store.mark_displayed(id, self.clock.now()).await {
            tracing::warn!(scenario_id = id, error = %e, "Failed to record display");
        }

        SelectionOutcome::Displayed { id }
    }

    // -----------------------------------------------------------------------
    // Timer
    // -----------------------------------------------------------------------

    fn arm_retry(&self, state: &mut TimelineState) {
        state.phase = if state.current.is_some() {
            TimelinePhase::Displaying
        } else {
            TimelinePhase::Idle
        };
        self.arm(state, self.config.default_timeout);
    }

    fn arm(&self, state: &mut TimelineState, delay: Duration) {
        let generation = state.generation;
        let weak = self.weak_self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(scheduler) = weak.upgrade() {
                scheduler.fire(generation).await;
            }
        });
        state.timer.arm(generation, handle);
    }

    async fn fire(&self, generation: u64) {
        self.select(Selection::Best, Some(generation)).await;
    }

    fn local_now(&self) -> LocalTimestamp {
        self.clock.now().with_timezone(&self.config.display_offset)
    }
}

/// Milliseconds in `d` for log fields, saturating.
pub(crate) fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
