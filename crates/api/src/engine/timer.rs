use tokio::task::JoinHandle;

/// The one timer a timeline may have armed.
#[derive(Debug)]
struct ArmedTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Single-slot holder for the next-selection timer.
///
/// Arming always aborts whatever was armed before, so at most one timer is
/// pending at any instant.
#[derive(Debug, Default)]
pub struct TimerSlot {
    armed: Option<ArmedTimer>,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `handle` for `generation`, aborting the previous timer.
    pub fn arm(&mut self, generation: u64, handle: JoinHandle<()>) {
        self.cancel();
        self.armed = Some(ArmedTimer { generation, handle });
    }

    /// Abort the armed timer, if any.
    pub fn cancel(&mut self) {
        if let Some(timer) = self.armed.take() {
            timer.handle.abort();
        }
    }

    /// Release the slot for a timer that has fired.
    ///
    /// Returns `false` if the slot has since been re-armed for a different
    /// generation, in which case the fired timer is stale and must not act.
    /// The handle is dropped without aborting so the firing task can go on
    /// running.
    pub fn take_if(&mut self, generation: u64) -> bool {
        match &self.armed {
            Some(timer) if timer.generation == generation => {
                self.armed = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}
