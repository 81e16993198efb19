use std::thread::ThreadId;
use std::time::Duration;

use dashmap::DashMap;
use tracing::trace;
use tracing::warn;

use super::rewrite_target;
use super::FailoverStrategy;
use super::HostAndPort;
use super::NextStage;
use crate::Error;
use crate::HttpRequest;
use crate::HttpResponse;
use crate::Result;

/// Whose failure sequence a cursor belongs to.
///
/// Tasks move between worker threads across `.await`, so inside a runtime
/// the task is the caller; elsewhere it is the OS thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Caller {
    Task(tokio::task::Id),
    Thread(ThreadId),
}

impl Caller {
    fn current() -> Self {
        match tokio::task::try_id() {
            Some(id) => Caller::Task(id),
            None => Caller::Thread(std::thread::current().id()),
        }
    }
}

/// Walks the pool in order, one host per attempt, never revisiting a host
/// within one logical request.
#[derive(Debug)]
pub struct RoundRobinStrategy {
    candidates: Vec<HostAndPort>,
    delay: Duration,
    cursors: DashMap<Caller, usize>,
}

impl RoundRobinStrategy {
    /// `delay` is paused before every attempt but the first
    pub fn new(
        candidates: Vec<HostAndPort>,
        delay: Duration,
    ) -> Result<Self> {
        if candidates.is_empty() {
            return Err(Error::InvalidArgument("failover pool must not be empty".into()));
        }
        Ok(Self {
            candidates,
            delay,
            cursors: DashMap::new(),
        })
    }

    pub fn candidates(&self) -> &[HostAndPort] {
        &self.candidates
    }

    /// Callers currently holding a cursor
    pub fn active_callers(&self) -> usize {
        self.cursors.len()
    }
}

impl FailoverStrategy for RoundRobinStrategy {
    fn compute_next_stage(
        &self,
        previous: &HttpRequest,
        _previous_response: Option<&HttpResponse>,
    ) -> Option<NextStage> {
        let caller = Caller::current();
        let next = match self.cursors.get(&caller).map(|c| *c) {
            Some(index) => index + 1,
            None => 0,
        };
        let target = self.candidates.get(next)?;
        self.cursors.insert(caller, next);

        let delay = if next == 0 { Duration::ZERO } else { self.delay };
        trace!(?caller, index = next, host = %target, "Round robin next host");

        match rewrite_target(previous, target) {
            Ok(request) => Some(NextStage { request, delay }),
            Err(e) => {
                warn!(host = %target, error = %e, "Cannot retarget request");
                None
            }
        }
    }

    fn is_request_viable(
        &self,
        _request: &HttpRequest,
    ) -> bool {
        true
    }

    fn mark_request_failed(
        &self,
        request: &HttpRequest,
    ) {
        let Some(target) = HostAndPort::from_uri(request.uri()) else {
            return;
        };
        if let Some(index) = self.candidates.iter().position(|c| *c == target) {
            self.cursors.insert(Caller::current(), index);
        }
    }

    fn reset(&self) {
        self.cursors.remove(&Caller::current());
    }
}
