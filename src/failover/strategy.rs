use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use http::uri::Authority;
use http::uri::Scheme;
use http::Uri;

use crate::Error;
use crate::HttpRequest;
use crate::HttpResponse;
use crate::TransportError;

/// One backend in a failover pool
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostAndPort {
    pub host: String,
    pub port: u16,
}

impl HostAndPort {
    pub fn new(
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Target of `uri`; the port falls back to the scheme default
    pub fn from_uri(uri: &Uri) -> Option<Self> {
        let host = uri.host()?;
        let port = uri.port_u16().or_else(|| match uri.scheme_str() {
            Some("https") => Some(443),
            Some("http") | None => Some(80),
            _ => None,
        })?;
        Some(Self::new(host, port))
    }
}

impl FromStr for HostAndPort {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidArgument(format!("expected host:port, got {s:?}"));

        let (host, port) = s.trim().rsplit_once(':').ok_or_else(invalid)?;
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        Ok(Self::new(host, port))
    }
}

impl fmt::Display for HostAndPort {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Where and when to send the next attempt
#[derive(Debug)]
pub struct NextStage {
    pub request: HttpRequest,
    /// Pause before sending
    pub delay: Duration,
}

impl NextStage {
    pub fn immediate(request: HttpRequest) -> Self {
        Self {
            request,
            delay: Duration::ZERO,
        }
    }
}

/// Picks targets for one logical request across a host pool.
///
/// The router calls [`reset`](Self::reset) at the beginning and end of every
/// logical request, so sticky state describes one failure sequence only.
pub trait FailoverStrategy: Send + Sync + 'static {
    /// The next attempt after `previous`, or `None` once no candidate is left
    fn compute_next_stage(
        &self,
        previous: &HttpRequest,
        previous_response: Option<&HttpResponse>,
    ) -> Option<NextStage>;

    /// Whether any attempt for `request` can be made at all
    fn is_request_viable(
        &self,
        request: &HttpRequest,
    ) -> bool;

    /// Records that the target of `request` did not answer
    fn mark_request_failed(
        &self,
        request: &HttpRequest,
    );

    fn reset(&self) {}
}

/// Copy of `request` aimed at `target`.
///
/// Only host and port change; method, scheme, path, query, version, headers
/// and body are kept.
pub fn rewrite_target(
    request: &HttpRequest,
    target: &HostAndPort,
) -> std::result::Result<HttpRequest, TransportError> {
    let mut parts = request.uri().clone().into_parts();
    let authority = Authority::from_str(&target.to_string())
        .map_err(|e| TransportError::InvalidRequest(format!("invalid target {target}: {e}")))?;
    parts.authority = Some(authority);
    if parts.scheme.is_none() {
        parts.scheme = Some(Scheme::HTTP);
    }
    if parts.path_and_query.is_none() {
        parts.path_and_query = Some(http::uri::PathAndQuery::from_static("/"));
    }
    let uri = Uri::from_parts(parts).map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

    let mut rewritten = clone_request(request);
    *rewritten.uri_mut() = uri;
    Ok(rewritten)
}

/// `http::Request` is not `Clone`; extensions are not carried over
pub(crate) fn clone_request(request: &HttpRequest) -> HttpRequest {
    let mut copy = http::Request::new(request.body().clone());
    *copy.method_mut() = request.method().clone();
    *copy.uri_mut() = request.uri().clone();
    *copy.version_mut() = request.version();
    *copy.headers_mut() = request.headers().clone();
    copy
}
