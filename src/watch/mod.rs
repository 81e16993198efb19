//! Blocking-query watch caches.
//!
//! A [`WatchCache`] turns a stream of long-poll answers into immutable
//! [`Snapshot`]s and pushes each changed one to its listeners.

mod cache;
mod envelope;
mod http_poller;
mod identity;
mod listener;
mod options;
mod poller;
mod scheduler;
mod snapshot;
mod state;

pub use cache::*;
pub use envelope::*;
pub use http_poller::*;
pub use identity::*;
pub use listener::*;
pub use options::ConsistencyMode;
pub use options::QueryOptions;
pub use options::format_wait;
pub(crate) use options::decode_query_component;
pub(crate) use options::parse_wait;
pub use poller::*;
pub use scheduler::*;
pub use snapshot::*;
pub use state::*;

#[cfg(test)]
mod snapshot_test;
