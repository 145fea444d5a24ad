//! Background status polling with per-order write-through to the store.
//!
//! Several surfaces can ask about the same order (a watch loop, the bulk
//! cycle, a manual refresh); a per-id spacing gate keeps them from hammering
//! the exchange. A failed poll changes nothing locally: the last known
//! status stands until a successful fetch replaces it.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use super::{MinInterval, TaskHandle};
use crate::config::PollerConfig;
use crate::domain::OrderStatus;
use crate::error::Result;
use crate::exchange::ExchangeApi;
use crate::persistence::OrderStore;

/// What one poll attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollResult {
    /// Skipped: a successful poll for this id landed inside the spacing
    /// window.
    Suppressed,
    /// Fetched; the status matches what the store already has.
    Unchanged(OrderStatus),
    /// Fetched and written through to the store.
    Updated(OrderStatus),
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PollerStats {
    pub polls: u64,
    pub updates: u64,
    pub suppressed: u64,
    pub errors: u64,
}

pub struct StatusPoller {
    api: Arc<dyn ExchangeApi>,
    store: Arc<OrderStore>,
    config: PollerConfig,
    /// Per-id spacing guard over the last successful fetch.
    gates: Mutex<HashMap<String, MinInterval>>,
    stats: Mutex<PollerStats>,
}

impl StatusPoller {
    pub fn new(api: Arc<dyn ExchangeApi>, store: Arc<OrderStore>, config: PollerConfig) -> Self {
        Self {
            api,
            store,
            config,
            gates: Mutex::new(HashMap::new()),
            stats: Mutex::new(PollerStats::default()),
        }
    }

    pub fn stats(&self) -> PollerStats {
        *self.stats.lock().unwrap()
    }

    /// Poll one order once. Respects the per-id spacing gate; on success
    /// the fetched status is written through only when it differs from the
    /// stored one.
    pub async fn poll_once(&self, id: &str) -> Result<PollResult> {
        if !self.gate_open(id) {
            self.stats.lock().unwrap().suppressed += 1;
            debug!("poll for {} suppressed by spacing gate", id);
            return Ok(PollResult::Suppressed);
        }

        self.stats.lock().unwrap().polls += 1;
        let status = match self.api.get_status(id).await {
            Ok(status) => status,
            Err(e) => {
                self.stats.lock().unwrap().errors += 1;
                return Err(e);
            }
        };
        self.mark_gate(id);

        let stored = self.store.find_by_id(id).await?;
        match stored {
            Some(order) if order.status == status => Ok(PollResult::Unchanged(status)),
            Some(_) => {
                self.store.update_status(id, &status).await?;
                self.stats.lock().unwrap().updates += 1;
                info!("order {} moved to {}", id, status.as_str());
                Ok(PollResult::Updated(status))
            }
            // not tracked locally; report what the exchange said
            None => Ok(PollResult::Unchanged(status)),
        }
    }

    /// Poll `id` on the configured interval until its status is terminal or
    /// the handle is stopped.
    pub fn watch(self: &Arc<Self>, id: String) -> TaskHandle {
        let handle = TaskHandle::new();
        let poller = self.clone();
        let task = handle.clone();

        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_secs(poller.config.interval_secs));

            while task.is_running() {
                ticker.tick().await;
                if !task.is_running() {
                    break;
                }
                match poller.poll_once(&id).await {
                    Ok(PollResult::Unchanged(status) | PollResult::Updated(status))
                        if status.is_terminal() =>
                    {
                        info!("order {} reached terminal status {}", id, status.as_str());
                        task.stop();
                    }
                    Ok(_) => {}
                    Err(e) => warn!("poll for {} failed: {}", id, e),
                }
            }
        });

        handle
    }

    /// Poll every recent non-terminal order in the store, oldest window
    /// bound by the recency config.
    pub async fn run_cycle(&self) -> Result<usize> {
        let window = chrono::Duration::hours(self.config.recency_window_hours as i64);
        let orders = self.store.list_recent(window).await?;

        let mut polled = 0;
        for order in orders
            .iter()
            .filter(|o| !o.status.is_terminal())
            .take(self.config.max_orders_per_cycle)
        {
            match self.poll_once(&order.id).await {
                Ok(_) => polled += 1,
                Err(e) => warn!("poll for {} failed: {}", order.id, e),
            }
        }
        Ok(polled)
    }

    /// Run `run_cycle` on the configured interval until stopped.
    pub fn start_background(self: &Arc<Self>) -> TaskHandle {
        let handle = TaskHandle::new();
        let poller = self.clone();
        let task = handle.clone();

        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_secs(poller.config.interval_secs));
            info!(
                "status poller started (interval {}s, window {}h)",
                poller.config.interval_secs, poller.config.recency_window_hours
            );

            while task.is_running() {
                ticker.tick().await;
                if !task.is_running() {
                    break;
                }
                if let Err(e) = poller.run_cycle().await {
                    warn!("poll cycle failed: {}", e);
                }
            }
            info!("status poller stopped");
        });

        handle
    }

    fn gate_open(&self, id: &str) -> bool {
        let spacing = Duration::from_secs(self.config.min_spacing_secs);
        self.gates
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_insert_with(|| MinInterval::new(spacing))
            .check()
    }

    fn mark_gate(&self, id: &str) {
        if let Some(gate) = self.gates.lock().unwrap().get(id) {
            gate.mark();
        }
    }
}
