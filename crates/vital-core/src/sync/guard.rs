//! Single-flight upload guard
//!
//! At most one upload cycle runs at a time. Acquisition never blocks: a
//! would-be concurrent cycle gets `None` and reports itself retryable,
//! without touching the network.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Non-blocking mutual exclusion handle shared by upload triggers
#[derive(Debug, Clone, Default)]
pub struct SingleFlightGuard {
    lock: Arc<Mutex<()>>,
}

impl SingleFlightGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to become the in-flight cycle. The permit releases on drop, on
    /// every exit path including panics and timeouts.
    #[must_use]
    pub fn try_acquire(&self) -> Option<SingleFlightPermit> {
        self.lock
            .clone()
            .try_lock_owned()
            .ok()
            .map(SingleFlightPermit)
    }
}

/// Proof of being the one in-flight upload cycle
#[derive(Debug)]
pub struct SingleFlightPermit(OwnedMutexGuard<()>);
