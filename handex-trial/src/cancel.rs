use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Explicit stop flag checked at the top of every poll iteration.
///
/// Once set, the controller makes no further provider calls; teardown is a
/// single synchronous action with that postcondition guaranteed.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
