//! # kvwatch
//!
//! Client-side resilience core for HTTP coordination stores that publish
//! changes through long-polling ("blocking") queries.
//!
//! ## What this crate provides
//!
//! - **Watch caches** - [`WatchCache`] keeps an immutable [`Snapshot`] of a
//!   remote collection current by re-issuing blocking queries, and pushes
//!   every changed snapshot to its listeners
//! - **Host failover** - [`FailoverRouter`] retries a request across a host
//!   pool, either blacklisting failed hosts or walking the pool round robin
//! - **Read timeouts** - [`TimeoutTransport`] derives each request's read
//!   timeout from its `wait=` parameter
//!
//! The HTTP client itself is yours: implement [`Transport`] over it and
//! stack the decorators on top.
//!
//! ```ignore
//! let settings = Settings::load(None)?;
//! let transport = TimeoutTransport::new(
//!     FailoverRouter::from_config(my_client, &settings.failover)?,
//!     ReadTimeoutAdjuster::from_config(&settings.cache, &settings.http),
//! );
//! let poller = HttpPoller::<ServiceEntry>::new(transport, "http://127.0.0.1:8500", "/v1/health/service/web")?;
//! let cache = WatchCache::builder(CacheIdentity::new("health.service", "web"), poller, |e| Some(e.node.clone()))
//!     .config(settings.cache)
//!     .build()?;
//! cache.start()?;
//! ```

mod config;
mod constants;
mod errors;
mod failover;
mod metrics;
mod network;
mod utils;
mod watch;

pub use config::*;
pub use errors::*;
pub use failover::*;
pub use metrics::*;
pub use network::*;
pub use watch::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
