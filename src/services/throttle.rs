//! Rate limiting shared by the estimator, the address validator and the
//! status poller: burst coalescing with a guaranteed trailing call, and a
//! minimum-spacing guard for repeated calls against the same resource.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Coalesces a burst of calls into the trailing one.
///
/// Every caller awaits the quiet period; only the last caller of a burst is
/// told to proceed. Works purely on a generation counter, so a superseded
/// waiter costs nothing but its sleep.
pub struct Debouncer {
    delay: Duration,
    generation: AtomicU64,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: AtomicU64::new(0),
        }
    }

    /// Wait out the quiet period. Returns true when this call is still the
    /// newest one, false when a later call superseded it.
    pub async fn settle(&self) -> bool {
        let my_generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        self.generation.load(Ordering::SeqCst) == my_generation
    }

    /// Invalidate any pending burst without waiting (used by blur/submit
    /// paths that validate immediately).
    pub fn cancel_pending(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

/// Suppresses calls landing inside a minimum spacing window since the last
/// recorded success.
pub struct MinInterval {
    spacing: Duration,
    last: Mutex<Option<Instant>>,
}

impl MinInterval {
    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            last: Mutex::new(None),
        }
    }

    /// True when enough time has passed since the last `mark`.
    pub fn check(&self) -> bool {
        match *self.last.lock().unwrap() {
            Some(last) => last.elapsed() >= self.spacing,
            None => true,
        }
    }

    /// Record a successful call.
    pub fn mark(&self) {
        *self.last.lock().unwrap() = Some(Instant::now());
    }
}
