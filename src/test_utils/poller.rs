use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::Poller;
use crate::QueryOptions;
use crate::ResponseEnvelope;
use crate::Result;

/// Answers polls from a script, then hangs like an idle blocking query.
///
/// Clones share the script, so a test keeps one handle after moving
/// another into the cache.
pub struct ScriptedPoller<V> {
    shared: Arc<Shared<V>>,
}

struct Shared<V> {
    script: Mutex<VecDeque<Result<ResponseEnvelope<Vec<V>>>>>,
    seen: Mutex<Vec<QueryOptions>>,
    polled: Notify,
}

impl<V> Clone for ScriptedPoller<V> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<V> Default for ScriptedPoller<V> {
    fn default() -> Self {
        Self {
            shared: Arc::new(Shared {
                script: Mutex::new(VecDeque::new()),
                seen: Mutex::new(Vec::new()),
                polled: Notify::new(),
            }),
        }
    }
}

impl<V> ScriptedPoller<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(
        &self,
        index: u64,
        values: Vec<V>,
    ) -> &Self {
        self.shared
            .script
            .lock()
            .push_back(Ok(ResponseEnvelope::new(values, index)));
        self
    }

    pub fn push_envelope(
        &self,
        envelope: ResponseEnvelope<Vec<V>>,
    ) -> &Self {
        self.shared.script.lock().push_back(Ok(envelope));
        self
    }

    pub fn push_err(
        &self,
        err: crate::Error,
    ) -> &Self {
        self.shared.script.lock().push_back(Err(err));
        self
    }

    /// Options of every poll issued so far
    pub fn seen(&self) -> Vec<QueryOptions> {
        self.shared.seen.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.shared.seen.lock().len()
    }

    /// Resolves once at least `n` polls were issued
    pub async fn wait_for_calls(
        &self,
        n: usize,
    ) {
        loop {
            let notified = self.shared.polled.notified();
            if self.calls() >= n {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl<V: Send + 'static> Poller<V> for ScriptedPoller<V> {
    async fn poll(
        &self,
        options: &QueryOptions,
    ) -> Result<ResponseEnvelope<Vec<V>>> {
        self.shared.seen.lock().push(options.clone());
        let next = self.shared.script.lock().pop_front();
        self.shared.polled.notify_waiters();

        match next {
            Some(outcome) => outcome,
            None => std::future::pending().await,
        }
    }
}
