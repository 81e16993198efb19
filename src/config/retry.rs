use std::time::Duration;

use config::ConfigError;
use rand::Rng;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Retry delay bounds applied after a failed poll
///
/// Every retry draws a delay uniformly from `[min_delay_ms, max_delay_ms]`,
/// so concurrent caches that failed together do not retry in lockstep.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Lower bound of the retry delay (unit: milliseconds)
    #[serde(default = "default_backoff_delay_ms")]
    pub min_delay_ms: u64,

    /// Upper bound of the retry delay (unit: milliseconds)
    #[serde(default = "default_backoff_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            min_delay_ms: default_backoff_delay_ms(),
            max_delay_ms: default_backoff_delay_ms(),
        }
    }
}

impl BackoffPolicy {
    pub fn new(
        min_delay: Duration,
        max_delay: Duration,
    ) -> Self {
        Self {
            min_delay_ms: min_delay.as_millis() as u64,
            max_delay_ms: max_delay.as_millis() as u64,
        }
    }

    /// Fixed delay, no jitter
    pub fn fixed(delay: Duration) -> Self {
        Self::new(delay, delay)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_delay_ms < self.min_delay_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "backoff max_delay_ms ({}) must be >= min_delay_ms ({})",
                self.max_delay_ms, self.min_delay_ms
            ))));
        }
        Ok(())
    }

    /// Draws the next retry delay from `rng`
    pub fn next_delay<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Duration {
        if self.max_delay_ms <= self.min_delay_ms {
            return Duration::from_millis(self.min_delay_ms);
        }
        Duration::from_millis(rng.gen_range(self.min_delay_ms..=self.max_delay_ms))
    }
}

fn default_backoff_delay_ms() -> u64 {
    10_000
}
