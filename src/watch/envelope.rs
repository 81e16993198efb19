use http::HeaderMap;

use crate::constants::AGE_HEADER;
use crate::constants::CACHE_HEADER;
use crate::constants::INDEX_HEADER;
use crate::constants::KNOWN_LEADER_HEADER;
use crate::constants::LAST_CONTACT_HEADER;
use crate::Error;
use crate::Result;

/// Agent-side cache status reported with a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheInfo {
    pub hit: bool,
    /// Seconds since the cached entry was fetched, when reported
    pub age_secs: Option<i64>,
}

/// One poll's result plus the consistency metadata the backend sent with it
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope<T> {
    body: T,
    index: u64,
    last_contact_ms: i64,
    known_leader: bool,
    cache_info: Option<CacheInfo>,
}

impl<T> ResponseEnvelope<T> {
    pub fn new(
        body: T,
        index: u64,
    ) -> Self {
        Self {
            body,
            index,
            last_contact_ms: 0,
            known_leader: true,
            cache_info: None,
        }
    }

    pub fn with_last_contact_ms(
        mut self,
        last_contact_ms: i64,
    ) -> Self {
        self.last_contact_ms = last_contact_ms;
        self
    }

    pub fn with_known_leader(
        mut self,
        known_leader: bool,
    ) -> Self {
        self.known_leader = known_leader;
        self
    }

    pub fn with_cache_info(
        mut self,
        cache_info: CacheInfo,
    ) -> Self {
        self.cache_info = Some(cache_info);
        self
    }

    /// Builds an envelope from the metadata headers of a backend response.
    ///
    /// The index header is mandatory; the others fall back to "no contact
    /// information", "no known leader" and "not served from cache".
    pub fn from_headers(
        headers: &HeaderMap,
        body: T,
    ) -> Result<Self> {
        let index = header_str(headers, INDEX_HEADER)
            .ok_or_else(|| Error::Decode(format!("missing {INDEX_HEADER} header")))?
            .parse::<u64>()
            .map_err(|e| Error::Decode(format!("invalid {INDEX_HEADER} header: {e}")))?;

        let last_contact_ms = match header_str(headers, LAST_CONTACT_HEADER) {
            Some(v) => v
                .parse::<i64>()
                .map_err(|e| Error::Decode(format!("invalid {LAST_CONTACT_HEADER} header: {e}")))?,
            None => 0,
        };

        let known_leader = header_str(headers, KNOWN_LEADER_HEADER)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let cache_info = header_str(headers, CACHE_HEADER).map(|v| CacheInfo {
            hit: v.eq_ignore_ascii_case("HIT"),
            age_secs: header_str(headers, AGE_HEADER).and_then(|age| age.parse().ok()),
        });

        Ok(Self {
            body,
            index,
            last_contact_ms,
            known_leader,
            cache_info,
        })
    }

    pub fn body(&self) -> &T {
        &self.body
    }

    pub fn into_body(self) -> T {
        self.body
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn last_contact_ms(&self) -> i64 {
        self.last_contact_ms
    }

    pub fn known_leader(&self) -> bool {
        self.known_leader
    }

    pub fn cache_info(&self) -> Option<CacheInfo> {
        self.cache_info
    }

    /// Transforms the body, keeping the metadata
    pub fn map<U, F>(
        self,
        f: F,
    ) -> ResponseEnvelope<U>
    where
        F: FnOnce(T) -> U,
    {
        ResponseEnvelope {
            body: f(self.body),
            index: self.index,
            last_contact_ms: self.last_contact_ms,
            known_leader: self.known_leader,
            cache_info: self.cache_info,
        }
    }
}

fn header_str<'a>(
    headers: &'a HeaderMap,
    name: &str,
) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}
