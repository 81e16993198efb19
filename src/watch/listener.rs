use std::panic::catch_unwind;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use tracing::error;

use super::CacheIdentity;
use super::Snapshot;

/// Receives every snapshot a cache publishes.
///
/// Called on the cache's scheduling thread. A panic is caught and logged and
/// never reaches the cache or other listeners.
pub trait CacheListener<K, V>: Send + Sync + 'static {
    fn notify(
        &self,
        snapshot: Arc<Snapshot<K, V>>,
    );
}

impl<K, V, F> CacheListener<K, V> for F
where
    F: Fn(Arc<Snapshot<K, V>>) + Send + Sync + 'static,
{
    fn notify(
        &self,
        snapshot: Arc<Snapshot<K, V>>,
    ) {
        self(snapshot)
    }
}

/// Registered listener; add/remove match on the `Arc` allocation
pub type ListenerRef<K, V> = Arc<dyn CacheListener<K, V>>;

pub(crate) fn same_listener<K: 'static, V: 'static>(
    a: &ListenerRef<K, V>,
    b: &ListenerRef<K, V>,
) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Hands `snapshot` to one listener; returns false if it panicked
pub(crate) fn deliver<K: 'static, V: 'static>(
    identity: &CacheIdentity,
    listener: &ListenerRef<K, V>,
    snapshot: Arc<Snapshot<K, V>>,
) -> bool {
    match catch_unwind(AssertUnwindSafe(|| listener.notify(snapshot))) {
        Ok(()) => true,
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(cache = %identity, %reason, "Listener panicked while handling a snapshot");
            false
        }
    }
}
