// -
// Response metadata headers

/// Blocking-query cursor returned with every read
pub(crate) const INDEX_HEADER: &str = "X-Consul-Index";
/// Milliseconds since the answering server last heard from the leader
pub(crate) const LAST_CONTACT_HEADER: &str = "X-Consul-LastContact";
pub(crate) const KNOWN_LEADER_HEADER: &str = "X-Consul-KnownLeader";

/// Agent cache status, `HIT` or `MISS`
pub(crate) const CACHE_HEADER: &str = "X-Cache";
pub(crate) const AGE_HEADER: &str = "Age";

// -
// Query parameters owned by the watch engine

pub(crate) const WAIT_PARAM: &str = "wait";
pub(crate) const INDEX_PARAM: &str = "index";

/// The backend adds up to wait/16 of jitter before answering a blocking query
pub(crate) const WAIT_JITTER_DIVISOR: u64 = 16;

/// Endpoints whose responses can be arbitrarily large
pub(crate) const LARGE_RESPONSE_PATH_PREFIX: &str = "/v1/snapshot";
pub(crate) const LARGE_RESPONSE_READ_TIMEOUT_MS: u64 = 3_600_000;

// -
// Environment

pub(crate) const ENV_PREFIX: &str = "KVWATCH";
