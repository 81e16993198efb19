use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;
use tracing::warn;

use super::rewrite_target;
use super::FailoverStrategy;
use super::HostAndPort;
use super::NextStage;
use crate::metrics::BLACKLISTED_HOST_COUNTER;
use crate::Error;
use crate::HttpRequest;
use crate::HttpResponse;
use crate::Result;

/// Sticks to one host until it fails, then moves to the first pool member
/// that is not blacklisted.
///
/// A failed host stays out of rotation for `timeout`.
#[derive(Debug)]
pub struct BlacklistingStrategy {
    candidates: Vec<HostAndPort>,
    timeout: Duration,
    blacklist: DashMap<HostAndPort, Instant>,
}

impl BlacklistingStrategy {
    pub fn new(
        candidates: Vec<HostAndPort>,
        timeout: Duration,
    ) -> Result<Self> {
        if candidates.is_empty() {
            return Err(Error::InvalidArgument("failover pool must not be empty".into()));
        }
        Ok(Self {
            candidates,
            timeout,
            blacklist: DashMap::new(),
        })
    }

    pub fn candidates(&self) -> &[HostAndPort] {
        &self.candidates
    }

    /// Whether `host` may be tried at `now`. Expired entries are dropped.
    fn is_available(
        &self,
        host: &HostAndPort,
        now: Instant,
    ) -> bool {
        // Copy out so no shard lock is held across the remove below
        let Some(since) = self.blacklist.get(host).map(|entry| *entry.value()) else {
            return true;
        };

        if now.saturating_duration_since(since) >= self.timeout {
            self.blacklist.remove(host);
            debug!(%host, "Blacklist entry expired");
            return true;
        }
        false
    }

    fn blacklist(
        &self,
        host: HostAndPort,
    ) {
        warn!(%host, timeout = ?self.timeout, "Blacklisting host");
        BLACKLISTED_HOST_COUNTER
            .with_label_values(&[&host.to_string()])
            .inc();
        self.blacklist.insert(host, Instant::now());
    }

    pub fn is_blacklisted(
        &self,
        host: &HostAndPort,
    ) -> bool {
        !self.is_available(host, Instant::now())
    }
}

/// Anything but 2xx/3xx, except 404 which is a valid answer for missing keys
fn is_failure_status(response: &HttpResponse) -> bool {
    let status = response.status();
    !(status.is_success() || status.is_redirection()) && status != http::StatusCode::NOT_FOUND
}

impl FailoverStrategy for BlacklistingStrategy {
    fn compute_next_stage(
        &self,
        previous: &HttpRequest,
        previous_response: Option<&HttpResponse>,
    ) -> Option<NextStage> {
        let target = HostAndPort::from_uri(previous.uri());

        if let (Some(target), Some(response)) = (&target, previous_response) {
            if is_failure_status(response) {
                self.blacklist(target.clone());
            }
        }

        let now = Instant::now();
        let next = match target {
            Some(target) if self.is_available(&target, now) => target,
            _ => self
                .candidates
                .iter()
                .find(|c| self.is_available(c, now))?
                .clone(),
        };

        match rewrite_target(previous, &next) {
            Ok(request) => Some(NextStage::immediate(request)),
            Err(e) => {
                warn!(host = %next, error = %e, "Cannot retarget request");
                None
            }
        }
    }

    fn is_request_viable(
        &self,
        _request: &HttpRequest,
    ) -> bool {
        let now = Instant::now();
        self.candidates.iter().any(|c| self.is_available(c, now))
    }

    fn mark_request_failed(
        &self,
        request: &HttpRequest,
    ) {
        if let Some(target) = HostAndPort::from_uri(request.uri()) {
            self.blacklist(target);
        }
    }
}
