use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ControllerMetrics {
    // Location stream
    pub samples_received: AtomicU64,
    pub samples_accepted: AtomicU64,
    pub samples_rejected: AtomicU64,
    pub samples_invalid: AtomicU64,

    // Renderer
    pub recenters_dispatched: AtomicU64,
    pub route_draws_scheduled: AtomicU64,
    pub route_draws_retargeted: AtomicU64,
    pub route_draws_dispatched: AtomicU64,
    pub commands_suppressed: AtomicU64,

    // One-shot fetches
    pub fetches_completed: AtomicU64,
    pub fetches_failed: AtomicU64,
    pub fetches_discarded: AtomicU64,
}

impl ControllerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            samples_received: self.samples_received.load(Ordering::Relaxed),
            samples_accepted: self.samples_accepted.load(Ordering::Relaxed),
            samples_rejected: self.samples_rejected.load(Ordering::Relaxed),
            samples_invalid: self.samples_invalid.load(Ordering::Relaxed),
            recenters_dispatched: self.recenters_dispatched.load(Ordering::Relaxed),
            route_draws_scheduled: self.route_draws_scheduled.load(Ordering::Relaxed),
            route_draws_retargeted: self.route_draws_retargeted.load(Ordering::Relaxed),
            route_draws_dispatched: self.route_draws_dispatched.load(Ordering::Relaxed),
            commands_suppressed: self.commands_suppressed.load(Ordering::Relaxed),
            fetches_completed: self.fetches_completed.load(Ordering::Relaxed),
            fetches_failed: self.fetches_failed.load(Ordering::Relaxed),
            fetches_discarded: self.fetches_discarded.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub samples_received: u64,
    pub samples_accepted: u64,
    pub samples_rejected: u64,
    pub samples_invalid: u64,
    pub recenters_dispatched: u64,
    pub route_draws_scheduled: u64,
    pub route_draws_retargeted: u64,
    pub route_draws_dispatched: u64,
    pub commands_suppressed: u64,
    pub fetches_completed: u64,
    pub fetches_failed: u64,
    pub fetches_discarded: u64,
}
