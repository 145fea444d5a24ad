pub mod address_check;
pub mod coordinator;
pub mod estimator;
pub mod poller;
pub mod throttle;

pub use address_check::{AddressCheck, AddressValidator};
pub use coordinator::OrderCoordinator;
pub use estimator::RateEstimator;
pub use poller::{PollResult, PollerStats, StatusPoller};
pub use throttle::{Debouncer, MinInterval};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Handle to a cancellable repeating background task (a watch loop, the
/// bulk poller, an estimate refresher). Dropping the handle does not stop
/// the task; call `stop`.
#[derive(Clone)]
pub struct TaskHandle {
    running: Arc<AtomicBool>,
}

impl TaskHandle {
    pub(crate) fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
