use std::fmt;

/// Label naming one cache instance in logs and metrics
///
/// Renders as `endpoint "key"`, e.g. `health.service "web"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheIdentity {
    endpoint: String,
    key: String,
}

impl CacheIdentity {
    pub fn new(
        endpoint: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            key: key.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for CacheIdentity {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{} \"{}\"", self.endpoint, self.key)
    }
}
