//! Outbound HTTP seam.
//!
//! [`Transport`] is the single call everything else decorates: the failover
//! router and [`TimeoutTransport`] both wrap a transport and are transports
//! themselves, so they compose in either order.

mod timeout;
mod transport;

pub use timeout::*;
pub use transport::*;
