//! Scenario timeline engine.

pub mod scheduler;
mod timer;

pub use scheduler::{
    Scheduler, SelectionOutcome, TimelineConfig, TimelinePhase, TimelineSnapshot, RESTART_BACKOFF,
};
