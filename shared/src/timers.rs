use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::lock_unpoisoned;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// Delayed tasks owned by one controller. Cancelling an id that already
/// fired or was already cancelled is a no-op.
pub struct TimerSet {
    runtime: Handle,
    next_id: AtomicU64,
    pending: Mutex<HashMap<TimerId, JoinHandle<()>>>,
    closed: AtomicBool,
}

impl TimerSet {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Runs `task` after `delay`. Returns `None` once the set is closed.
    pub fn schedule<F>(&self, delay: Duration, task: F) -> Option<TimerId>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut pending = lock_unpoisoned(&self.pending);
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        pending.retain(|_, handle| !handle.is_finished());

        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        pending.insert(id, handle);
        Some(id)
    }

    pub fn cancel(&self, id: TimerId) -> bool {
        match lock_unpoisoned(&self.pending).remove(&id) {
            Some(handle) => {
                let was_pending = !handle.is_finished();
                handle.abort();
                was_pending
            }
            None => false,
        }
    }

    /// Cancels everything and refuses new timers. Returns how many timers
    /// were still pending.
    pub fn close(&self) -> usize {
        let mut pending = lock_unpoisoned(&self.pending);
        self.closed.store(true, Ordering::Release);
        let mut cancelled = 0;
        for (_, handle) in pending.drain() {
            if !handle.is_finished() {
                cancelled += 1;
            }
            handle.abort();
        }
        if cancelled > 0 {
            debug!(cancelled, "cancelled pending timers");
        }
        cancelled
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        let mut pending = lock_unpoisoned(&self.pending);
        pending.retain(|_, handle| !handle.is_finished());
        pending.len()
    }
}

impl Drop for TimerSet {
    fn drop(&mut self) {
        self.close();
    }
}
