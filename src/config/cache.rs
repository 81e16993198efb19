use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::BackoffPolicy;
use crate::CacheIdentity;
use crate::Error;
use crate::Result;

/// Longest blocking wait the backend honours
const MAX_WATCH_DURATION_MS: u64 = 600_000;

/// Tuning for one watch cache
///
/// Immutable once handed to a cache. Durations are kept in milliseconds so
/// the struct maps one-to-one onto the `[cache]` configuration section.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CacheConfig {
    /// Blocking-query wait window sent as `wait=` on every poll
    /// Default: 10 seconds
    #[serde(default = "default_watch_duration_ms")]
    pub watch_duration_ms: u64,

    /// Lower bound between the start of two consecutive polls
    /// Default: 0 (poll again as soon as the previous one returns)
    #[serde(default)]
    pub min_delay_between_requests_ms: u64,

    /// Lower bound between polls when the last result was empty
    /// Default: 0
    #[serde(default)]
    pub min_delay_on_empty_result_ms: u64,

    /// Retry delay bounds after a failed poll
    #[serde(default)]
    pub backoff: BackoffPolicy,

    /// Derive the read timeout from the `wait=` parameter
    /// Default: true
    #[serde(default = "default_timeout_auto_adjustment_enabled")]
    pub timeout_auto_adjustment_enabled: bool,

    /// Extra slack added on top of wait + wait/16
    /// Default: 2 seconds
    #[serde(default = "default_timeout_auto_adjustment_margin_ms")]
    pub timeout_auto_adjustment_margin_ms: u64,

    /// Severity used when a poll fails
    #[serde(default)]
    pub refresh_error_log_level: ErrorLogLevel,

    /// Replaces level-based logging of poll failures when set
    #[serde(skip)]
    pub refresh_error_consumer: Option<RefreshErrorConsumer>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            watch_duration_ms: default_watch_duration_ms(),
            min_delay_between_requests_ms: 0,
            min_delay_on_empty_result_ms: 0,
            backoff: BackoffPolicy::default(),
            timeout_auto_adjustment_enabled: default_timeout_auto_adjustment_enabled(),
            timeout_auto_adjustment_margin_ms: default_timeout_auto_adjustment_margin_ms(),
            refresh_error_log_level: ErrorLogLevel::default(),
            refresh_error_consumer: None,
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<()> {
        if self.watch_duration_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "watch_duration_ms must be greater than 0".into(),
            )));
        }

        if self.watch_duration_ms > MAX_WATCH_DURATION_MS {
            warn!(
                "watch_duration_ms ({}) exceeds the backend maximum of {}ms and will be capped server side",
                self.watch_duration_ms, MAX_WATCH_DURATION_MS
            );
        }

        self.backoff.validate()?;

        Ok(())
    }

    pub fn watch_duration(&self) -> Duration {
        Duration::from_millis(self.watch_duration_ms)
    }

    pub fn min_delay_between_requests(&self) -> Duration {
        Duration::from_millis(self.min_delay_between_requests_ms)
    }

    pub fn min_delay_on_empty_result(&self) -> Duration {
        Duration::from_millis(self.min_delay_on_empty_result_ms)
    }

    pub fn timeout_auto_adjustment_margin(&self) -> Duration {
        Duration::from_millis(self.timeout_auto_adjustment_margin_ms)
    }

    pub fn with_refresh_error_consumer<F>(
        mut self,
        consumer: F,
    ) -> Self
    where
        F: Fn(&CacheIdentity, &str, &Error) + Send + Sync + 'static,
    {
        self.refresh_error_consumer = Some(RefreshErrorConsumer(Arc::new(consumer)));
        self
    }

    /// Reports a failed poll through the configured policy
    pub(crate) fn log_refresh_error(
        &self,
        identity: &CacheIdentity,
        message: &str,
        err: &Error,
    ) {
        if let Some(consumer) = &self.refresh_error_consumer {
            (consumer.0)(identity, message, err);
            return;
        }

        match self.refresh_error_log_level {
            ErrorLogLevel::Error => error!(cache = %identity, error = %err, "{}", message),
            ErrorLogLevel::Warn => warn!(cache = %identity, error = %err, "{}", message),
            ErrorLogLevel::Info => info!(cache = %identity, error = %err, "{}", message),
            ErrorLogLevel::Debug => debug!(cache = %identity, error = %err, "{}", message),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorLogLevel {
    #[default]
    Error,
    Warn,
    Info,
    Debug,
}

/// Custom sink for poll failures
#[derive(Clone)]
pub struct RefreshErrorConsumer(Arc<dyn Fn(&CacheIdentity, &str, &Error) + Send + Sync>);

impl Debug for RefreshErrorConsumer {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.write_str("RefreshErrorConsumer")
    }
}

fn default_watch_duration_ms() -> u64 {
    10_000
}
fn default_timeout_auto_adjustment_enabled() -> bool {
    true
}
fn default_timeout_auto_adjustment_margin_ms() -> u64 {
    2_000
}
