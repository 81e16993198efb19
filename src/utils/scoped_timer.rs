use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

/// Measures one operation and logs its latency on target `timing` when dropped
pub(crate) struct ScopedTimer {
    start: Instant,
    name: &'static str,
}

impl ScopedTimer {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
        }
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        trace!(target: "timing", "[TIMING] {} took {} ms", self.name, self.elapsed().as_millis());
    }
}
