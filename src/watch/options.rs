use std::time::Duration;

use pct_str::PctStr;
use pct_str::PctString;
use pct_str::UriReserved;

use crate::constants::INDEX_PARAM;
use crate::constants::WAIT_PARAM;

/// Read consistency requested from the backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConsistencyMode {
    /// Leader-served read without a quorum round trip
    #[default]
    Default,
    /// Any server may answer, possibly stale
    Stale,
    /// Leader verifies leadership with a quorum first
    Consistent,
}

/// Query parameters sent with a read.
///
/// `index` and `wait` turn a read into a blocking query. A watch cache owns
/// both: base options handed to a cache must leave them unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub datacenter: Option<String>,
    pub consistency: ConsistencyMode,
    /// Sort results by round trip time from this node
    pub near: Option<String>,
    /// Server-side filter expression
    pub filter: Option<String>,
    index: Option<u64>,
    wait: Option<Duration>,
}

impl QueryOptions {
    pub fn with_datacenter(
        mut self,
        datacenter: impl Into<String>,
    ) -> Self {
        self.datacenter = Some(datacenter.into());
        self
    }

    pub fn with_consistency(
        mut self,
        consistency: ConsistencyMode,
    ) -> Self {
        self.consistency = consistency;
        self
    }

    pub fn with_near(
        mut self,
        near: impl Into<String>,
    ) -> Self {
        self.near = Some(near.into());
        self
    }

    pub fn with_filter(
        mut self,
        filter: impl Into<String>,
    ) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_index(
        mut self,
        index: u64,
    ) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_wait(
        mut self,
        wait: Duration,
    ) -> Self {
        self.wait = Some(wait);
        self
    }

    pub fn index(&self) -> Option<u64> {
        self.index
    }

    pub fn wait(&self) -> Option<Duration> {
        self.wait
    }

    /// Whether either blocking parameter is set
    pub fn is_blocking(&self) -> bool {
        self.index.is_some() || self.wait.is_some()
    }

    /// Copy of these options with the engine-owned blocking parameters
    pub(crate) fn for_poll(
        &self,
        index: Option<u64>,
        wait: Duration,
    ) -> Self {
        Self {
            index,
            wait: Some(wait),
            ..self.clone()
        }
    }

    /// Parameters in wire order; flags have an empty value
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(wait) = self.wait {
            pairs.push((WAIT_PARAM, format_wait(wait)));
        }
        if let Some(index) = self.index {
            pairs.push((INDEX_PARAM, index.to_string()));
        }
        if let Some(dc) = &self.datacenter {
            pairs.push(("dc", dc.clone()));
        }
        match self.consistency {
            ConsistencyMode::Default => {}
            ConsistencyMode::Stale => pairs.push(("stale", String::new())),
            ConsistencyMode::Consistent => pairs.push(("consistent", String::new())),
        }
        if let Some(near) = &self.near {
            pairs.push(("near", near.clone()));
        }
        if let Some(filter) = &self.filter {
            pairs.push(("filter", filter.clone()));
        }
        pairs
    }

    /// `a=1&b=2&flag` encoding of [`query_pairs`](Self::query_pairs)
    pub fn to_query_string(&self) -> String {
        let mut out = String::new();
        for (i, (key, value)) in self.query_pairs().into_iter().enumerate() {
            if i > 0 {
                out.push('&');
            }
            out.push_str(key);
            if !value.is_empty() {
                out.push('=');
                out.push_str(PctString::encode(value.chars(), UriReserved::Any).as_str());
            }
        }
        out
    }
}

/// Renders a wait window the way the backend parses it: `10s`, `5m`, `250ms`
pub fn format_wait(wait: Duration) -> String {
    let ms = wait.as_millis();
    if ms >= 60_000 && ms % 60_000 == 0 {
        format!("{}m", ms / 60_000)
    } else if ms % 1_000 == 0 {
        format!("{}s", ms / 1_000)
    } else {
        format!("{ms}ms")
    }
}

/// Parses `wait=` values; accepts `ms`, `s`, `m` and `h` suffixes
pub(crate) fn parse_wait(value: &str) -> Option<Duration> {
    let value = value.trim();
    let split = value.find(|c: char| !c.is_ascii_digit())?;
    let (amount, unit) = value.split_at(split);
    let amount: u64 = amount.parse().ok()?;
    match unit {
        "ms" => Some(Duration::from_millis(amount)),
        "s" => Some(Duration::from_secs(amount)),
        "m" => Some(Duration::from_secs(amount.checked_mul(60)?)),
        "h" => Some(Duration::from_secs(amount.checked_mul(3_600)?)),
        _ => None,
    }
}

/// Percent-decodes one query component; `None` if the escapes are malformed
/// or decode to invalid UTF-8
pub(crate) fn decode_query_component(raw: &str) -> Option<String> {
    let pct = PctStr::new(raw).ok()?;
    String::from_utf8(Vec::<u8>::from(pct.decode())).ok()
}
