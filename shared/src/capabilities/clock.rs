use tokio::time::Instant;

use crate::geo::UnixTimeMs;

pub trait Clock: Send + Sync {
    fn now(&self) -> UnixTimeMs;
}

/// Wall time captured once at construction, advanced by the runtime's
/// monotonic clock. Follows tokio's paused clock in tests.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
    origin_wall: UnixTimeMs,
}

impl MonotonicClock {
    #[must_use]
    pub fn new() -> Self {
        Self::anchored_at(UnixTimeMs::now())
    }

    #[must_use]
    pub fn anchored_at(origin_wall: UnixTimeMs) -> Self {
        Self {
            origin: Instant::now(),
            origin_wall,
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> UnixTimeMs {
        let elapsed = u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.origin_wall.add_millis(elapsed)
    }
}
