use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Builder;
use tokio::runtime::Handle;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::Error;
use crate::Result;

/// "Run this after N milliseconds" for one watch cache.
///
/// Either owns a single-worker runtime, torn down by [`shutdown`](Self::shutdown),
/// or borrows a runtime handle supplied by the application, which is never shut
/// down from here.
pub struct DelayScheduler {
    kind: SchedulerKind,
}

enum SchedulerKind {
    Owned {
        runtime: Mutex<Option<Runtime>>,
        handle: Handle,
    },
    Shared(Handle),
}

impl Debug for DelayScheduler {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("DelayScheduler")
            .field("owned", &self.is_owned())
            .finish()
    }
}

impl DelayScheduler {
    /// Builds a private runtime with one worker thread named `thread_name`
    pub fn owned(thread_name: &str) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name(thread_name)
            .enable_time()
            .build()
            .map_err(|e| Error::Scheduler(format!("failed to build runtime: {e}")))?;
        let handle = runtime.handle().clone();

        debug!(thread_name, "Owned scheduler started");

        Ok(Self {
            kind: SchedulerKind::Owned {
                runtime: Mutex::new(Some(runtime)),
                handle,
            },
        })
    }

    /// Schedules onto an application-supplied runtime
    pub fn shared(handle: Handle) -> Self {
        Self {
            kind: SchedulerKind::Shared(handle),
        }
    }

    /// Shares the runtime the caller is running on
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::shared)
            .map_err(|e| Error::Scheduler(e.to_string()))
    }

    pub fn is_owned(&self) -> bool {
        matches!(self.kind, SchedulerKind::Owned { .. })
    }

    /// Runs `task` once `delay` has elapsed, unless `cancel` fires first.
    ///
    /// Cancellation also interrupts a task that is already running at its next
    /// await point. Returns `None` when an owned scheduler was already shut down.
    pub fn schedule<F>(
        &self,
        delay: Duration,
        cancel: CancellationToken,
        task: F,
    ) -> Option<JoinHandle<()>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = match &self.kind {
            SchedulerKind::Owned { runtime, handle } => {
                if runtime.lock().is_none() {
                    return None;
                }
                handle
            }
            SchedulerKind::Shared(handle) => handle,
        };

        Some(handle.spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                _ = async {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    task.await;
                } => {}
            }
        }))
    }

    /// Tears down an owned runtime; no-op for a shared one
    pub fn shutdown(&self) {
        if let SchedulerKind::Owned { runtime, .. } = &self.kind {
            if let Some(rt) = runtime.lock().take() {
                // Does not block; callable from inside the runtime itself.
                rt.shutdown_background();
                debug!("Owned scheduler shut down");
            }
        }
    }

    pub fn is_shutdown(&self) -> bool {
        match &self.kind {
            SchedulerKind::Owned { runtime, .. } => runtime.lock().is_none(),
            SchedulerKind::Shared(_) => false,
        }
    }
}

impl Drop for DelayScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
