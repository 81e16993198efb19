/// Lifecycle of a [`WatchCache`](crate::WatchCache)
///
/// ```text
/// Latent --start()--> Starting --first successful poll--> Started
///    \                    \                                  /
///     +--------------------+---------- stop() -------------+--> Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheState {
    /// Constructed, `start()` not called yet
    Latent,
    /// Polling loop live, no successful poll yet
    Starting,
    /// At least one poll succeeded
    Started,
    /// Terminal
    Stopped,
}

impl CacheState {
    /// Whether scheduled polls should still run
    #[inline]
    pub fn is_running(self) -> bool {
        matches!(self, CacheState::Starting | CacheState::Started)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CacheState::Latent => "latent",
            CacheState::Starting => "starting",
            CacheState::Started => "started",
            CacheState::Stopped => "stopped",
        }
    }
}
