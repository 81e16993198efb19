//! Prometheus metrics and the cache event hook.
//!
//! Watch caches report through [`CacheEventHandler`]. [`PrometheusEventHandler`]
//! records those events into [`REGISTRY`]; the failover layer records its
//! counters directly.

use std::sync::Once;
use std::time::Duration;

use lazy_static::lazy_static;
#[cfg(test)]
use mockall::automock;
use prometheus::exponential_buckets;
use prometheus::Encoder;
use prometheus::HistogramOpts;
use prometheus::HistogramVec;
use prometheus::IntCounterVec;
use prometheus::Opts;
use prometheus::Registry;
use prometheus::TextEncoder;
use tracing::error;
use tracing::warn;

use crate::CacheIdentity;
use crate::Error;


lazy_static! {
    pub static ref POLL_SUCCESS_COUNTER: IntCounterVec = IntCounterVec::new(
        Opts::new("watch_poll_success_total", "Successful blocking queries"),
        &["endpoint", "key"]
    )
    .expect("metric can not be created");

    pub static ref POLL_FAILURE_COUNTER: IntCounterVec = IntCounterVec::new(
        Opts::new("watch_poll_failure_total", "Failed blocking queries"),
        &["endpoint", "key"]
    )
    .expect("metric can not be created");

    pub static ref SNAPSHOT_CHANGE_COUNTER: IntCounterVec = IntCounterVec::new(
        Opts::new("watch_snapshot_change_total", "Polls that replaced the snapshot"),
        &["endpoint", "key"]
    )
    .expect("metric can not be created");

    pub static ref POLL_DURATION_METRIC: HistogramVec = HistogramVec::new(
        HistogramOpts::new("watch_poll_duration_ms", "Blocking query latency in ms")
            .buckets(exponential_buckets(1.0, 2.0, 20).expect("valid buckets")),
        &["endpoint"]
    )
    .expect("metric can not be created");

    pub static ref FAILOVER_ATTEMPT_COUNTER: IntCounterVec = IntCounterVec::new(
        Opts::new("failover_attempt_total", "Requests sent per target host"),
        &["host"]
    )
    .expect("metric can not be created");

    pub static ref BLACKLISTED_HOST_COUNTER: IntCounterVec = IntCounterVec::new(
        Opts::new("failover_blacklisted_total", "Times a host was blacklisted"),
        &["host"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER: Once = Once::new();

fn register_custom_metrics(registry: &Registry) {
    let collectors: [Box<dyn prometheus::core::Collector>; 6] = [
        Box::new(POLL_SUCCESS_COUNTER.clone()),
        Box::new(POLL_FAILURE_COUNTER.clone()),
        Box::new(SNAPSHOT_CHANGE_COUNTER.clone()),
        Box::new(POLL_DURATION_METRIC.clone()),
        Box::new(FAILOVER_ATTEMPT_COUNTER.clone()),
        Box::new(BLACKLISTED_HOST_COUNTER.clone()),
    ];
    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            warn!("collector can not be registered: {:?}", e);
        }
    }
}

/// Registers the crate metrics with [`REGISTRY`]. Safe to call repeatedly.
pub fn register_metrics() {
    REGISTER.call_once(|| register_custom_metrics(&REGISTRY));
}

/// Text exposition of everything in [`REGISTRY`]
pub fn gather() -> String {
    register_metrics();

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    }
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            error!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}

/// Lifecycle and poll events of a single watch cache.
///
/// Called on the poll task; implementations must not block.
#[cfg_attr(test, automock)]
pub trait CacheEventHandler: Send + Sync + 'static {
    fn on_start(
        &self,
        _identity: &CacheIdentity,
    ) {
    }

    fn on_stop(
        &self,
        _identity: &CacheIdentity,
    ) {
    }

    fn on_poll_success(
        &self,
        _identity: &CacheIdentity,
        _changed: bool,
        _elapsed: Duration,
    ) {
    }

    fn on_poll_failure(
        &self,
        _identity: &CacheIdentity,
        _error: &Error,
    ) {
    }
}

/// Ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventHandler;

impl CacheEventHandler for NoopEventHandler {}

#[derive(Debug, Clone, Copy)]
pub struct PrometheusEventHandler;

impl PrometheusEventHandler {
    pub fn new() -> Self {
        register_metrics();
        Self
    }
}

impl Default for PrometheusEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheEventHandler for PrometheusEventHandler {
    fn on_poll_success(
        &self,
        identity: &CacheIdentity,
        changed: bool,
        elapsed: Duration,
    ) {
        let labels = [identity.endpoint(), identity.key()];
        POLL_SUCCESS_COUNTER.with_label_values(&labels).inc();
        if changed {
            SNAPSHOT_CHANGE_COUNTER.with_label_values(&labels).inc();
        }
        POLL_DURATION_METRIC
            .with_label_values(&[identity.endpoint()])
            .observe(elapsed.as_secs_f64() * 1000.0);
    }

    fn on_poll_failure(
        &self,
        identity: &CacheIdentity,
        _error: &Error,
    ) {
        POLL_FAILURE_COUNTER
            .with_label_values(&[identity.endpoint(), identity.key()])
            .inc();
    }
}
