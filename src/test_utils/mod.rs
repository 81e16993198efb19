//! Shared fixtures for unit tests
mod poller;

pub use poller::*;

use bytes::Bytes;
use http::StatusCode;
use tracing_subscriber::EnvFilter;

use crate::HttpResponse;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for unit test.");
}

/// Value type used by cache tests, keyed by `name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub name: String,
    pub value: u32,
}

pub fn item(
    name: &str,
    value: u32,
) -> Item {
    Item {
        name: name.to_string(),
        value,
    }
}

pub fn item_key(item: &Item) -> Option<String> {
    Some(item.name.clone())
}

/// Backend-shaped response carrying `X-Consul-Index`
pub fn http_response(
    status: StatusCode,
    index: u64,
    body: &'static str,
) -> HttpResponse {
    http::Response::builder()
        .status(status)
        .header("X-Consul-Index", index.to_string())
        .header("X-Consul-KnownLeader", "true")
        .header("X-Consul-LastContact", "0")
        .body(Bytes::from_static(body.as_bytes()))
        .unwrap()
}
