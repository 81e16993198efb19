//! Long-poll cache engine.
//!
//! ```text
//! start() -> schedule(0) -> run_poll -> poller.poll(index, wait)
//!                 ^                         |
//!                 |      Ok: on_complete ---+--> snapshot changed? fan out
//!                 +----- Err: on_failure ---+--> backoff
//! ```
//!
//! Every scheduled poll runs under the cache's cancellation token, so after
//! `stop()` a pending delay is cut short and a poll that already fired never
//! touches the snapshot or the listeners.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use parking_lot::Condvar;
use parking_lot::Mutex;
use parking_lot::ReentrantMutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::convert;
use super::deliver;
use super::same_listener;
use super::CacheIdentity;
use super::CacheState;
use super::DelayScheduler;
use super::ListenerRef;
use super::Poller;
use super::QueryOptions;
use super::ResponseEnvelope;
use super::Snapshot;
use crate::utils::ScopedTimer;
use crate::CacheConfig;
use crate::CacheEventHandler;
use crate::Error;
use crate::NoopEventHandler;
use crate::Result;

type KeyFn<K, V> = Arc<dyn Fn(&V) -> Option<K> + Send + Sync>;

/// Keeps an up-to-date [`Snapshot`] of one remote collection.
///
/// Repeatedly issues blocking queries through its [`Poller`], each one
/// echoing the consistency index of the previous answer, and publishes a new
/// snapshot to every listener whenever the result set changes.
///
/// Dropping the cache stops it.
pub struct WatchCache<K, V> {
    inner: Arc<CacheInner<K, V>>,
}

struct CacheInner<K, V> {
    identity: CacheIdentity,
    config: CacheConfig,
    base_options: QueryOptions,
    poller: Box<dyn Poller<V>>,
    key_fn: KeyFn<K, V>,
    scheduler: DelayScheduler,
    event_handler: Arc<dyn CacheEventHandler>,
    rng: Mutex<StdRng>,
    cancel: CancellationToken,

    state: Mutex<CacheState>,
    /// Signalled on Starting -> Started and on stop
    state_changed: Condvar,
    initialized: watch::Sender<bool>,

    snapshot: ArcSwap<Snapshot<K, V>>,
    last_index: Mutex<Option<u64>>,
    last_contact_ms: AtomicI64,
    known_leader: AtomicBool,

    listeners: Mutex<Vec<ListenerRef<K, V>>>,
    /// Serializes fan-out against registration. Re-entrant so a listener can
    /// register another listener from inside its callback.
    delivery: ReentrantMutex<()>,
}

impl<K, V> Debug for WatchCache<K, V> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("WatchCache")
            .field("identity", &self.inner.identity)
            .field("state", &*self.inner.state.lock())
            .field("last_index", &*self.inner.last_index.lock())
            .finish()
    }
}

impl<K, V> WatchCache<K, V>
where
    K: Eq + Hash + Debug + Send + Sync + 'static,
    V: PartialEq + Send + Sync + 'static,
{
    pub fn builder<P, F>(
        identity: CacheIdentity,
        poller: P,
        key_fn: F,
    ) -> WatchCacheBuilder<K, V>
    where
        P: Poller<V>,
        F: Fn(&V) -> Option<K> + Send + Sync + 'static,
    {
        WatchCacheBuilder {
            identity,
            poller: Box::new(poller),
            key_fn: Arc::new(key_fn),
            config: CacheConfig::default(),
            query_options: QueryOptions::default(),
            scheduler: None,
            event_handler: None,
            rng: None,
        }
    }

    /// Begins polling. Legal exactly once, from `Latent`.
    pub fn start(&self) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            if *state != CacheState::Latent {
                return Err(Error::IllegalState {
                    current: *state,
                    target: CacheState::Starting,
                });
            }
            *state = CacheState::Starting;
        }

        info!(cache = %self.inner.identity, "Starting watch cache");
        self.inner.event_handler.on_start(&self.inner.identity);
        self.inner.schedule_poll(Duration::ZERO);
        Ok(())
    }

    /// Stops polling for good. Idempotent.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Registers `listener`; returns false if it was already registered.
    ///
    /// Once the cache has published its first snapshot, a new listener is
    /// handed the current snapshot before this returns.
    pub fn add_listener(
        &self,
        listener: ListenerRef<K, V>,
    ) -> bool {
        let inner = &self.inner;
        let _delivery = inner.delivery.lock();

        {
            let mut listeners = inner.listeners.lock();
            if listeners.iter().any(|l| same_listener(l, &listener)) {
                return false;
            }
            listeners.push(listener.clone());
        }

        if *inner.state.lock() == CacheState::Started {
            deliver(&inner.identity, &listener, inner.snapshot.load_full());
        }
        true
    }

    /// Unregisters `listener`; returns whether it was registered
    pub fn remove_listener(
        &self,
        listener: &ListenerRef<K, V>,
    ) -> bool {
        let mut listeners = self.inner.listeners.lock();
        match listeners.iter().position(|l| same_listener(l, listener)) {
            Some(pos) => {
                listeners.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    /// Latest published snapshot, empty before the first successful poll
    pub fn snapshot(&self) -> Arc<Snapshot<K, V>> {
        self.inner.snapshot.load_full()
    }

    /// Blocks the calling thread until the first successful poll.
    ///
    /// Returns false on timeout, or when the cache stops uninitialized.
    /// Must not be called from a runtime worker thread.
    pub fn await_initialized(
        &self,
        timeout: Duration,
    ) -> bool {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        let _ = inner.state_changed.wait_while_for(
            &mut state,
            |s| matches!(s, CacheState::Latent | CacheState::Starting),
            timeout,
        );
        drop(state);
        *inner.initialized.borrow()
    }

    /// Async variant of [`await_initialized`](Self::await_initialized)
    pub async fn initialized(
        &self,
        timeout: Duration,
    ) -> bool {
        let mut rx = self.inner.initialized.subscribe();
        let ready = async move { rx.wait_for(|ready| *ready).await.is_ok() };
        tokio::time::timeout(timeout, ready).await.unwrap_or(false)
    }

    pub fn state(&self) -> CacheState {
        *self.inner.state.lock()
    }

    pub fn identity(&self) -> &CacheIdentity {
        &self.inner.identity
    }

    /// Index of the last successful poll
    pub fn last_index(&self) -> Option<u64> {
        *self.inner.last_index.lock()
    }

    /// Time since the answering server heard from the leader, as of the last
    /// published snapshot
    pub fn last_contact(&self) -> Duration {
        let ms = self.inner.last_contact_ms.load(Ordering::Acquire);
        Duration::from_millis(ms.max(0) as u64)
    }

    pub fn is_known_leader(&self) -> bool {
        self.inner.known_leader.load(Ordering::Acquire)
    }
}

impl<K, V> Drop for WatchCache<K, V> {
    fn drop(&mut self) {
        self.inner.stop();
    }
}

impl<K, V> CacheInner<K, V> {
    fn stop(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), CacheState::Stopped);
        self.state_changed.notify_all();

        if previous == CacheState::Stopped {
            return;
        }

        self.cancel.cancel();
        if self.scheduler.is_owned() {
            self.scheduler.shutdown();
        }
        self.event_handler.on_stop(&self.identity);
        info!(cache = %self.identity, from = previous.as_str(), "Watch cache stopped");
    }

    fn is_running(&self) -> bool {
        self.state.lock().is_running() && !self.cancel.is_cancelled()
    }
}

impl<K, V> CacheInner<K, V>
where
    K: Eq + Hash + Debug + Send + Sync + 'static,
    V: PartialEq + Send + Sync + 'static,
{
    fn schedule_poll(
        self: &Arc<Self>,
        delay: Duration,
    ) {
        let weak = Arc::downgrade(self);
        let scheduled = self.scheduler.schedule(delay, self.cancel.clone(), async move {
            if let Some(inner) = weak.upgrade() {
                inner.run_poll().await;
            }
        });

        if scheduled.is_none() {
            debug!(cache = %self.identity, "Scheduler already shut down, poll dropped");
        }
    }

    async fn run_poll(self: Arc<Self>) {
        if !self.is_running() {
            return;
        }

        let index = *self.last_index.lock();
        let options = self.base_options.for_poll(index, self.config.watch_duration());
        trace!(cache = %self.identity, ?index, "Polling");

        let timer = ScopedTimer::new("watch_poll");
        let result = self.poller.poll(&options).await;
        let elapsed = timer.elapsed();

        if !self.is_running() {
            return;
        }

        match result {
            Ok(envelope) => self.on_complete(envelope, elapsed),
            Err(e) => self.on_failure(e),
        }
    }

    fn on_complete(
        self: &Arc<Self>,
        envelope: ResponseEnvelope<Vec<V>>,
        elapsed: Duration,
    ) {
        let index = envelope.index();
        let last_contact_ms = envelope.last_contact_ms();
        let known_leader = envelope.known_leader();
        let values = envelope.into_body();
        let empty = values.is_empty();

        let conversion = convert(&self.identity, values, &*self.key_fn);
        if conversion.duplicates > 0 || conversion.dropped > 0 {
            debug!(
                cache = %self.identity,
                duplicates = conversion.duplicates,
                dropped = conversion.dropped,
                "Poll result was not cleanly keyed"
            );
        }

        // The first success always publishes, even an empty result
        let first = *self.state.lock() == CacheState::Starting;
        let changed = first || **self.snapshot.load() != conversion.snapshot;

        if changed {
            let snapshot = Arc::new(conversion.snapshot);
            self.snapshot.store(snapshot.clone());
            self.last_contact_ms.store(last_contact_ms, Ordering::Release);
            self.known_leader.store(known_leader, Ordering::Release);
            self.fan_out(snapshot);
        }
        *self.last_index.lock() = Some(index);

        self.event_handler.on_poll_success(&self.identity, changed, elapsed);

        let config = &self.config;
        let mut delay = config.min_delay_between_requests();
        if empty && config.min_delay_on_empty_result() > delay {
            delay = config.min_delay_on_empty_result();
        }
        let delay = delay.saturating_sub(elapsed);

        trace!(cache = %self.identity, index, changed, ?delay, "Poll complete");
        self.schedule_poll(delay);
    }

    fn on_failure(
        self: &Arc<Self>,
        err: Error,
    ) {
        self.config.log_refresh_error(
            &self.identity,
            "Error getting response from backend, will retry",
            &err,
        );
        self.event_handler.on_poll_failure(&self.identity, &err);

        let delay = self.config.backoff.next_delay(&mut *self.rng.lock());
        debug!(cache = %self.identity, ?delay, "Backing off after failed poll");
        self.schedule_poll(delay);
    }

    fn fan_out(
        &self,
        snapshot: Arc<Snapshot<K, V>>,
    ) {
        let _delivery = self.delivery.lock();

        let first = {
            let mut state = self.state.lock();
            match *state {
                CacheState::Starting => {
                    *state = CacheState::Started;
                    // Set before waking blocked waiters, they read it on wake-up
                    self.initialized.send_replace(true);
                    self.state_changed.notify_all();
                    true
                }
                CacheState::Started => false,
                _ => return,
            }
        };
        if first {
            info!(cache = %self.identity, size = snapshot.len(), "Watch cache initialized");
        }

        // Cloned so callbacks may add or remove listeners
        let listeners = self.listeners.lock().clone();
        for listener in &listeners {
            if !self.is_running() {
                warn!(cache = %self.identity, "Cache stopped during fan-out, remaining listeners skipped");
                break;
            }
            deliver(&self.identity, listener, snapshot.clone());
        }
    }
}

/// Assembles a [`WatchCache`]
pub struct WatchCacheBuilder<K, V> {
    identity: CacheIdentity,
    poller: Box<dyn Poller<V>>,
    key_fn: KeyFn<K, V>,
    config: CacheConfig,
    query_options: QueryOptions,
    scheduler: Option<DelayScheduler>,
    event_handler: Option<Arc<dyn CacheEventHandler>>,
    rng: Option<StdRng>,
}

impl<K, V> WatchCacheBuilder<K, V>
where
    K: Eq + Hash + Debug + Send + Sync + 'static,
    V: PartialEq + Send + Sync + 'static,
{
    pub fn config(
        mut self,
        config: CacheConfig,
    ) -> Self {
        self.config = config;
        self
    }

    /// Base options sent with every poll; must not set `index` or `wait`
    pub fn query_options(
        mut self,
        options: QueryOptions,
    ) -> Self {
        self.query_options = options;
        self
    }

    /// Defaults to a private single-thread scheduler
    pub fn scheduler(
        mut self,
        scheduler: DelayScheduler,
    ) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn event_handler(
        mut self,
        handler: Arc<dyn CacheEventHandler>,
    ) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Random source for backoff jitter
    pub fn rng(
        mut self,
        rng: StdRng,
    ) -> Self {
        self.rng = Some(rng);
        self
    }

    pub fn build(self) -> Result<WatchCache<K, V>> {
        self.config.validate()?;

        if self.query_options.is_blocking() {
            return Err(Error::InvalidArgument(
                "index and wait are managed by the watch cache and must not be set on its query options".into(),
            ));
        }

        let scheduler = match self.scheduler {
            Some(scheduler) => scheduler,
            None => DelayScheduler::owned(&format!("kvwatch-{}", self.identity.endpoint()))?,
        };

        let (initialized, _) = watch::channel(false);

        let inner = CacheInner {
            identity: self.identity,
            config: self.config,
            base_options: self.query_options,
            poller: self.poller,
            key_fn: self.key_fn,
            scheduler,
            event_handler: self
                .event_handler
                .unwrap_or_else(|| Arc::new(NoopEventHandler)),
            rng: Mutex::new(self.rng.unwrap_or_else(StdRng::from_entropy)),
            cancel: CancellationToken::new(),
            state: Mutex::new(CacheState::Latent),
            state_changed: Condvar::new(),
            initialized,
            snapshot: ArcSwap::from_pointee(Snapshot::default()),
            last_index: Mutex::new(None),
            last_contact_ms: AtomicI64::new(0),
            known_leader: AtomicBool::new(false),
            listeners: Mutex::new(Vec::new()),
            delivery: ReentrantMutex::new(()),
        };

        Ok(WatchCache {
            inner: Arc::new(inner),
        })
    }
}
