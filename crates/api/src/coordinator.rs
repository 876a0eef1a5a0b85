//! Top-level wiring of store, builder, broadcast hub, scheduler and
//! command dispatcher.

use std::sync::{Arc, Weak};

use signage_core::builder::ScenarioBuilder;
use signage_core::clock::{SystemTimeSource, TimeSource};
use signage_core::store::ScenarioStore;
use tokio_util::sync::CancellationToken;

use crate::commands::{CommandDispatcher, CommandRegistry};
use crate::config::ServerConfig;
use crate::engine::scheduler::millis;
use crate::engine::{Scheduler, TimelineConfig, RESTART_BACKOFF};
use crate::error::panic_message;
use crate::ws::{BroadcastHub, DisplayConnection};

pub struct Coordinator {
    store: Arc<dyn ScenarioStore>,
    hub: Arc<BroadcastHub>,
    scheduler: Arc<Scheduler>,
    dispatcher: CommandDispatcher,
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn ScenarioStore>,
        builder: ScenarioBuilder,
        clock: Arc<dyn TimeSource>,
        registry: CommandRegistry,
        request_token: impl Into<String>,
        timeline: TimelineConfig,
    ) -> Self {
        let hub = Arc::new(BroadcastHub::new());
        let scheduler = Scheduler::new(
            Arc::clone(&store),
            builder,
            Arc::clone(&hub),
            clock,
            timeline,
        );
        let dispatcher = CommandDispatcher::new(
            registry,
            request_token,
            Arc::clone(&scheduler),
            Arc::clone(&hub),
            Arc::clone(&store),
        );
        Self {
            store,
            hub,
            scheduler,
            dispatcher,
        }
    }

    /// Production wiring: system clock and the built-in command set.
    pub fn from_config(
        config: &ServerConfig,
        store: Arc<dyn ScenarioStore>,
        builder: ScenarioBuilder,
    ) -> Self {
        Self::new(
            store,
            builder,
            Arc::new(SystemTimeSource),
            CommandRegistry::with_defaults(),
            config.request_token.clone(),
            TimelineConfig {
                default_timeout: config.scenario_timeout,
                display_offset: config.display_offset,
            },
        )
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn store(&self) -> &Arc<dyn ScenarioStore> {
        &self.store
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    /// Entry point for every inbound text frame.
    pub async fn on_message(&self, origin: Weak<DisplayConnection>, raw: &str) {
        self.dispatcher.handle(origin, raw).await;
    }

    /// Supervise the timeline until `cancel` fires.
    ///
    /// If starting the timeline panics, it is started again after
    /// [`RESTART_BACKOFF`]. On cancellation the scheduler is shut down.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            let scheduler = Arc::clone(&self.scheduler);
            let start = tokio::spawn(async move { scheduler.start().await });

            let joined = tokio::select! {
                _ = cancel.cancelled() => break,
                joined = start => joined,
            };

            match joined {
                Ok(outcome) => {
                    tracing::info!(?outcome, "Timeline started");
                    cancel.cancelled().await;
                    break;
                }
                Err(e) if e.is_panic() => {
                    tracing::error!(
                        panic = %panic_message(&*e.into_panic()),
                        backoff_ms = millis(RESTART_BACKOFF),
                        "Timeline crashed, restarting after backoff"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(RESTART_BACKOFF) => {}
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Timeline task cancelled");
                    break;
                }
            }
        }

        self.scheduler.shutdown().await;
    }
}
