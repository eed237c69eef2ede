//! Data models for the Radio Browser directory
//!
//! Raw directory records are loosely typed: snake_case or camelCase field
//! names, tags either as an array or as a comma-joined string, counters
//! sometimes missing. Everything goes through [`Station::from_raw`] (and the
//! `from_raw` helpers of [`Country`] and [`Tag`]) so the rest of the crate
//! only sees the canonical shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Country preselected by the front end when none is given
pub const DEFAULT_COUNTRY_CODE: &str = "ES";

/// Default page size for station queries
pub const DEFAULT_QUERY_LIMIT: u32 = 50;

// ============================================================================
// Station
// ============================================================================

/// A directory station in canonical form
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    /// Stable identifier (the directory's `stationuuid`)
    pub id: String,
    pub name: String,
    /// Icon URL
    pub favicon: String,
    /// Directly playable stream URL (may be empty for broken entries)
    pub url_resolved: String,
    pub tags: Vec<String>,
    pub country: String,
    /// Region inside the country
    pub state: String,
    pub votes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
}

impl Station {
    /// Create a minimal station (mostly useful in tests and demos)
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        url_resolved: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url_resolved: url_resolved.into(),
            ..Self::default()
        }
    }

    /// Normalize a raw directory record
    ///
    /// Precedence: `stationuuid` before `id`, `url_resolved` before
    /// `urlResolved`. Tags may be an array or a comma-separated string.
    /// Missing or invalid votes default to 0.
    pub fn from_raw(raw: &Value) -> Self {
        let homepage = str_field(raw, &["homepage"]);
        Self {
            id: str_field(raw, &["stationuuid", "id"]),
            name: str_field(raw, &["name"]),
            favicon: str_field(raw, &["favicon"]),
            url_resolved: str_field(raw, &["url_resolved", "urlResolved"]),
            tags: tags_field(raw.get("tags")),
            country: str_field(raw, &["country"]),
            state: str_field(raw, &["state"]),
            votes: count_field(raw, &["votes"]),
            homepage: (!homepage.is_empty()).then_some(homepage),
        }
    }

    /// Normalize a list of raw records, skipping non-object entries
    pub fn from_raw_list(raw: &[Value]) -> Vec<Self> {
        raw.iter()
            .filter(|v| v.is_object())
            .map(Self::from_raw)
            .collect()
    }

    /// Whether the station carries a stream URL the player can load
    pub fn is_playable(&self) -> bool {
        !self.url_resolved.trim().is_empty()
    }

    /// Stream URL compared without a single trailing slash
    pub fn normalized_stream_url(&self) -> &str {
        normalize_stream_url(&self.url_resolved)
    }

    /// "Country • Region" line, or just the country when no region is known
    pub fn location(&self) -> String {
        if self.state.is_empty() {
            self.country.clone()
        } else {
            format!("{} • {}", self.country, self.state)
        }
    }
}

/// Normalize a stream URL by stripping a single trailing `/`
pub fn normalize_stream_url(url: &str) -> &str {
    url.strip_suffix('/').unwrap_or(url)
}

// ============================================================================
// Countries and tags
// ============================================================================

/// A country entry from `/json/countries`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Country {
    pub name: String,
    /// ISO 3166-1 alpha-2 code
    pub code: String,
    pub station_count: u64,
}

impl Country {
    pub fn from_raw(raw: &Value) -> Self {
        Self {
            name: str_field(raw, &["name"]),
            code: str_field(raw, &["iso_3166_1", "countrycode", "code"]),
            station_count: count_field(raw, &["stationcount", "stationCount"]),
        }
    }
}

/// A tag entry from `/json/tags`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub name: String,
    pub station_count: u64,
}

impl Tag {
    pub fn from_raw(raw: &Value) -> Self {
        Self {
            name: str_field(raw, &["name"]),
            station_count: count_field(raw, &["stationcount", "stationCount"]),
        }
    }
}

// ============================================================================
// Queries
// ============================================================================

/// Sort key accepted by `/json/stations/search`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StationOrder {
    Name,
    #[default]
    Votes,
    ClickCount,
    Random,
}

impl StationOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            StationOrder::Name => "name",
            StationOrder::Votes => "votes",
            StationOrder::ClickCount => "clickcount",
            StationOrder::Random => "random",
        }
    }
}

/// Filter for station searches
///
/// Empty filters are left out of the query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationQuery {
    pub name: Option<String>,
    pub country_code: Option<String>,
    pub tag: Option<String>,
    pub limit: u32,
    pub offset: u32,
    pub order: StationOrder,
    pub reverse: bool,
    pub hide_broken: bool,
}

impl Default for StationQuery {
    fn default() -> Self {
        Self {
            name: None,
            country_code: None,
            tag: None,
            limit: DEFAULT_QUERY_LIMIT,
            offset: 0,
            order: StationOrder::default(),
            reverse: true,
            hide_broken: true,
        }
    }
}

impl StationQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = non_empty(name.into());
        self
    }

    pub fn country(mut self, code: impl Into<String>) -> Self {
        let code: String = code.into();
        self.country_code = non_empty(code.to_uppercase());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = non_empty(tag.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub fn order(mut self, order: StationOrder, reverse: bool) -> Self {
        self.order = order;
        self.reverse = reverse;
        self
    }

    /// Query string pairs for `/json/stations/search`
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(name) = &self.name {
            pairs.push(("name", name.clone()));
        }
        if let Some(code) = &self.country_code {
            pairs.push(("countrycode", code.clone()));
        }
        if let Some(tag) = &self.tag {
            pairs.push(("tag", tag.clone()));
            pairs.push(("tagExact", "true".to_string()));
        }
        pairs.push(("limit", self.limit.to_string()));
        if self.offset > 0 {
            pairs.push(("offset", self.offset.to_string()));
        }
        pairs.push(("order", self.order.as_str().to_string()));
        pairs.push(("reverse", self.reverse.to_string()));
        pairs.push(("hidebroken", self.hide_broken.to_string()));
        pairs
    }
}

// ============================================================================
// Raw field helpers
// ============================================================================

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// First non-empty string among `keys`
fn str_field(raw: &Value, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|k| raw.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// First non-negative integer among `keys`; numeric strings are accepted
fn count_field(raw: &Value, keys: &[&str]) -> u64 {
    keys.iter()
        .filter_map(|k| raw.get(*k))
        .find_map(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .unwrap_or(0)
}

fn tags_field(raw: Option<&Value>) -> Vec<String> {
    match raw {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Some(Value::String(joined)) => joined
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}
