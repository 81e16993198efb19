//! Configuration management for watch caches and failover routing.
//!
//! Settings are merged from the following sources, later ones winning:
//! 1. Default values (hardcoded)
//! 2. Explicit config file passed to [`Settings::load`]
//! 3. File named by the `CONFIG_PATH` environment variable
//! 4. Environment variables prefixed `KVWATCH__` (highest priority)
//!

mod cache;
mod failover;
mod http;
mod retry;
pub use cache::*;
pub use failover::*;
pub use http::*;
pub use retry::*;


//---
use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::ENV_PREFIX;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Settings {
    /// Blocking-query cadence and backoff
    #[serde(default)]
    pub cache: CacheConfig,
    /// Host pool and failover policy
    #[serde(default)]
    pub failover: FailoverConfig,
    /// Transport timeouts
    #[serde(default)]
    pub http: HttpConfig,
}

impl Settings {
    /// Load configuration from multiple sources with priority:
    /// 1. Defaults
    /// 2. `config_path` (required when given)
    /// 3. `CONFIG_PATH` file
    /// 4. Environment variables
    ///
    /// The merged result is validated before it is returned.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Config::builder();

        if let Some(path) = config_path {
            config = config.add_source(File::with_name(path).required(true));
        }

        if let Ok(path) = env::var("CONFIG_PATH") {
            config = config.add_source(File::with_name(&path));
        }

        config = config.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("failover.hosts")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let settings: Settings = config.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.cache.validate()?;
        self.failover.validate()?;
        self.http.validate()?;
        Ok(())
    }
}
