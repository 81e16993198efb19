use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::HostAndPort;
use crate::Result;

/// Host pool and retry bounds for the failover router
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FailoverConfig {
    /// Candidate backends as `host:port`. May stay empty when no router is
    /// built; `FailoverRouter::from_config` requires at least one.
    #[serde(default)]
    pub hosts: Vec<String>,

    /// How the next host is picked after a failure
    #[serde(default)]
    pub strategy: FailoverStrategyKind,

    /// Transport failures tolerated before giving up on one call
    /// Default: 10
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// How long a failed host stays out of rotation (blacklisting only)
    /// Default: 60 seconds
    #[serde(default = "default_blacklist_timeout_ms")]
    pub blacklist_timeout_ms: u64,

    /// Pause before moving to the next host (round robin only)
    /// Default: 0
    #[serde(default)]
    pub round_robin_delay_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailoverStrategyKind {
    #[default]
    Blacklisting,
    RoundRobin,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            strategy: FailoverStrategyKind::default(),
            max_attempts: default_max_attempts(),
            blacklist_timeout_ms: default_blacklist_timeout_ms(),
            round_robin_delay_ms: 0,
        }
    }
}

impl FailoverConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::Config(ConfigError::Message(
                "failover max_attempts must be greater than 0".into(),
            )));
        }

        self.candidates()?;

        Ok(())
    }

    /// Parses the configured pool
    pub fn candidates(&self) -> Result<Vec<HostAndPort>> {
        self.hosts.iter().map(|h| h.parse()).collect()
    }

    pub fn blacklist_timeout(&self) -> Duration {
        Duration::from_millis(self.blacklist_timeout_ms)
    }

    pub fn round_robin_delay(&self) -> Duration {
        Duration::from_millis(self.round_robin_delay_ms)
    }
}

fn default_max_attempts() -> usize {
    10
}
fn default_blacklist_timeout_ms() -> u64 {
    60_000
}
