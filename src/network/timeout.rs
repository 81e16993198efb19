use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

use super::target_address;
use super::HttpRequest;
use super::HttpResponse;
use super::Transport;
use crate::constants::LARGE_RESPONSE_PATH_PREFIX;
use crate::constants::LARGE_RESPONSE_READ_TIMEOUT_MS;
use crate::constants::WAIT_JITTER_DIVISOR;
use crate::constants::WAIT_PARAM;
use crate::watch::decode_query_component;
use crate::watch::parse_wait;
use crate::CacheConfig;
use crate::HttpConfig;
use crate::TransportError;

/// Derives a per-request read timeout.
///
/// A blocking query is held open server side for `wait` plus up to `wait/16`
/// of jitter, so a read timeout at or below `wait` would fire before the
/// backend ever answers.
#[derive(Debug, Clone)]
pub struct ReadTimeoutAdjuster {
    enabled: bool,
    margin: Duration,
    base_read_timeout: Duration,
}

impl ReadTimeoutAdjuster {
    pub fn new(
        enabled: bool,
        margin: Duration,
        base_read_timeout: Duration,
    ) -> Self {
        Self {
            enabled,
            margin,
            base_read_timeout,
        }
    }

    pub fn from_config(
        cache: &CacheConfig,
        http: &HttpConfig,
    ) -> Self {
        Self::new(
            cache.timeout_auto_adjustment_enabled,
            cache.timeout_auto_adjustment_margin(),
            http.read_timeout(),
        )
    }

    /// Effective read timeout for `request`
    pub fn read_timeout(
        &self,
        request: &HttpRequest,
    ) -> Duration {
        if !self.enabled {
            return self.base_read_timeout;
        }

        if let Some(wait) = wait_param(request) {
            return blocking_read_timeout(wait, self.margin);
        }

        if request.uri().path().starts_with(LARGE_RESPONSE_PATH_PREFIX) {
            return Duration::from_millis(LARGE_RESPONSE_READ_TIMEOUT_MS);
        }

        self.base_read_timeout
    }
}

/// `wait + ceil(wait / 16) + margin`
pub fn blocking_read_timeout(
    wait: Duration,
    margin: Duration,
) -> Duration {
    let wait_ms = wait.as_millis() as u64;
    let jitter_ms = wait_ms.div_ceil(WAIT_JITTER_DIVISOR);
    Duration::from_millis(wait_ms + jitter_ms) + margin
}

fn wait_param(request: &HttpRequest) -> Option<Duration> {
    request.uri().query()?.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if decode_query_component(key)? != WAIT_PARAM {
            return None;
        }
        parse_wait(&decode_query_component(value)?)
    })
}

/// Enforces [`ReadTimeoutAdjuster`] timeouts around an inner transport
pub struct TimeoutTransport<T> {
    inner: T,
    adjuster: ReadTimeoutAdjuster,
}

impl<T: Transport> TimeoutTransport<T> {
    pub fn new(
        inner: T,
        adjuster: ReadTimeoutAdjuster,
    ) -> Self {
        Self { inner, adjuster }
    }
}

#[async_trait]
impl<T: Transport> Transport for TimeoutTransport<T> {
    async fn send(
        &self,
        request: HttpRequest,
    ) -> std::result::Result<HttpResponse, TransportError> {
        let duration = self.adjuster.read_timeout(&request);
        let address = target_address(&request);
        trace!(%address, ?duration, "Sending request with read timeout");

        match tokio::time::timeout(duration, self.inner.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout { address, duration }),
        }
    }
}
