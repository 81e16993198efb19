use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::HeaderName;
use http::header::ACCEPT;
use http::HeaderMap;
use http::HeaderValue;
use http::Method;
use http::StatusCode;
use http::Uri;
use serde::de::DeserializeOwned;
use tracing::debug;
use tracing::trace;

use super::Poller;
use super::QueryOptions;
use super::ResponseEnvelope;
use crate::Error;
use crate::HttpRequest;
use crate::Result;
use crate::Transport;

/// Blocking `GET` against one backend endpoint, decoded as a JSON array.
///
/// Requests target `base_uri`; put a failover router in the transport chain
/// to spread them over a host pool.
pub struct HttpPoller<V> {
    transport: Arc<dyn Transport>,
    scheme: String,
    authority: String,
    path: String,
    not_found_as_empty: bool,
    headers: HeaderMap,
    _marker: PhantomData<fn() -> V>,
}

impl<V> Debug for HttpPoller<V> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("HttpPoller")
            .field("authority", &self.authority)
            .field("path", &self.path)
            .field("not_found_as_empty", &self.not_found_as_empty)
            .finish()
    }
}

impl<V> HttpPoller<V> {
    /// `base_uri` is `scheme://host:port`; `path` starts with `/`
    pub fn new<T: Transport>(
        transport: T,
        base_uri: &str,
        path: impl Into<String>,
    ) -> Result<Self> {
        let uri: Uri = base_uri
            .parse()
            .map_err(|e| Error::InvalidArgument(format!("invalid base uri {base_uri}: {e}")))?;
        let (Some(scheme), Some(authority)) = (uri.scheme_str(), uri.authority()) else {
            return Err(Error::InvalidArgument(format!(
                "base uri {base_uri} needs a scheme and an authority"
            )));
        };

        let path = path.into();
        if !path.starts_with('/') || path.contains('?') {
            return Err(Error::InvalidArgument(format!(
                "poll path {path} must start with '/' and carry no query"
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Ok(Self {
            transport: Arc::new(transport),
            scheme: scheme.to_string(),
            authority: authority.as_str().to_string(),
            path,
            not_found_as_empty: false,
            headers,
            _marker: PhantomData,
        })
    }

    /// Treat `404 Not Found` as an empty result, as key prefixes with no keys
    /// answer that way
    pub fn not_found_as_empty(
        mut self,
        enabled: bool,
    ) -> Self {
        self.not_found_as_empty = enabled;
        self
    }

    pub fn with_header(
        mut self,
        name: HeaderName,
        value: HeaderValue,
    ) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub(crate) fn build_request(
        &self,
        options: &QueryOptions,
    ) -> Result<HttpRequest> {
        let query = options.to_query_string();
        let uri = if query.is_empty() {
            format!("{}://{}{}", self.scheme, self.authority, self.path)
        } else {
            format!("{}://{}{}?{}", self.scheme, self.authority, self.path, query)
        };

        let mut request = http::Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Bytes::new())?;
        *request.headers_mut() = self.headers.clone();
        Ok(request)
    }
}

fn decode_list<V: DeserializeOwned>(body: &Bytes) -> Result<Vec<V>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    // `null` is how some endpoints spell an empty list
    let values: Option<Vec<V>> = serde_json::from_slice(body)?;
    Ok(values.unwrap_or_default())
}

#[async_trait]
impl<V> Poller<V> for HttpPoller<V>
where
    V: DeserializeOwned + Send + 'static,
{
    async fn poll(
        &self,
        options: &QueryOptions,
    ) -> Result<ResponseEnvelope<Vec<V>>> {
        let request = self.build_request(options)?;
        trace!(uri = %request.uri(), "Issuing blocking query");

        let response = self.transport.send(request).await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND && self.not_found_as_empty {
            debug!(path = %self.path, "Not found, treating as empty result");
            return ResponseEnvelope::from_headers(response.headers(), Vec::new());
        }

        if !status.is_success() {
            return Err(Error::UnexpectedStatus {
                status,
                body: String::from_utf8_lossy(response.body()).into_owned(),
            });
        }

        let values = decode_list(response.body())?;
        ResponseEnvelope::from_headers(response.headers(), values)
    }
}
