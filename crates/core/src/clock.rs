//! Injectable time source.
//!
//! The scheduler asks a [`TimeSource`] for "now" instead of calling
//! `Utc::now()` directly, so selection windows can be exercised in tests
//! by moving a [`SimulatedTimeSource`] forward.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;

use crate::types::Timestamp;

/// Source of the current UTC instant.
pub trait TimeSource: Send + Sync {
    /// Current instant.
    fn now(&self) -> Timestamp;
}

/// Real system clock (production use).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// Manually driven clock for tests and simulations.
///
/// Clones share the same underlying instant.
#[derive(Debug, Clone)]
pub struct SimulatedTimeSource {
    current: Arc<Mutex<Timestamp>>,
}

impl SimulatedTimeSource {
    /// Create a clock frozen at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: chrono::Duration) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current += delta;
    }

    /// Jump to an absolute instant.
    pub fn set(&self, at: Timestamp) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }
}

impl TimeSource for SimulatedTimeSource {
    fn now(&self) -> Timestamp {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
