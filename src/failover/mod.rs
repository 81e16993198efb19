//! Host failover for outbound requests.
//!
//! [`FailoverRouter`] wraps a [`Transport`](crate::Transport) and asks a
//! [`FailoverStrategy`] where each attempt goes.

mod blacklisting;
mod round_robin;
mod router;
mod strategy;

pub use blacklisting::*;
pub use round_robin::*;
pub use router::*;
pub use strategy::*;

#[cfg(test)]
mod router_test;
