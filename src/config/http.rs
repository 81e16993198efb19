use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Transport-level timeouts
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HttpConfig {
    /// Read timeout for requests that carry no `wait=` parameter
    /// Default: 10 seconds
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl HttpConfig {
    pub fn validate(&self) -> Result<()> {
        if self.read_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "http read_timeout_ms must be at least 1ms".into(),
            )));
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

fn default_read_timeout_ms() -> u64 {
    10_000
}
