//! HTTP client for the Radio Browser directory API
//!
//! The client is bound to one directory server (see
//! [`crate::resolver::DirectoryResolver`] for choosing it). Every query is
//! wrapped in [`with_retry`]; once the retry budget is spent the last error
//! is returned as [`Error::DirectoryQueryFailed`].
//!
//! # Example
//!
//! ```no_run
//! use pmoradiobrowser::{RadioBrowserClient, StationQuery};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RadioBrowserClient::builder()
//!         .base_url("https://fi1.api.radio-browser.info")
//!         .build()
//!         .await?;
//!
//!     let stations = client
//!         .search(&StationQuery::new().name("jazz").country("ES"))
//!         .await?;
//!     for station in stations {
//!         println!("{} - {}", station.name, station.url_resolved);
//!     }
//!     Ok(())
//! }
//! ```

use crate::error::{Error, Result};
use crate::models::{Country, Station, StationQuery, Tag};
use crate::retry::{with_retry, RetryPolicy};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Default timeout for directory requests (15 seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Default User-Agent (Radio Browser asks clients to identify themselves)
pub const DEFAULT_USER_AGENT: &str = "PMORadio/0.1 (pmoradiobrowser)";

/// Radio Browser HTTP client
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct RadioBrowserClient {
    pub(crate) client: Client,
    base_url: Url,
    timeout: Duration,
    retry: RetryPolicy,
}

impl RadioBrowserClient {
    /// Create a builder for configuring the client
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Base URL of the directory server this client talks to
    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Get the internal HTTP client
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    // ========================================================================
    // Station queries
    // ========================================================================

    /// Search stations by name, country and tag
    pub async fn search(&self, query: &StationQuery) -> Result<Vec<Station>> {
        let url = self.endpoint(&["json", "stations", "search"], &query.to_query_pairs())?;
        let raw = self.fetch_list("search", &url).await?;
        Ok(Station::from_raw_list(&raw))
    }

    /// Stations carrying exactly this tag, most voted first
    pub async fn stations_by_tag(&self, tag: &str, limit: u32) -> Result<Vec<Station>> {
        let url = self.endpoint(
            &["json", "stations", "bytagexact", tag],
            &browse_pairs(limit),
        )?;
        let raw = self.fetch_list("stations_by_tag", &url).await?;
        Ok(Station::from_raw_list(&raw))
    }

    /// Stations of a country (ISO 3166-1 code), most voted first
    pub async fn stations_by_country(&self, country_code: &str, limit: u32) -> Result<Vec<Station>> {
        let code = country_code.trim().to_uppercase();
        let url = self.endpoint(
            &["json", "stations", "bycountrycodeexact", &code],
            &browse_pairs(limit),
        )?;
        let raw = self.fetch_list("stations_by_country", &url).await?;
        Ok(Station::from_raw_list(&raw))
    }

    // ========================================================================
    // Selector data
    // ========================================================================

    /// All countries with at least one station, largest first
    pub async fn countries(&self) -> Result<Vec<Country>> {
        let url = self.endpoint(
            &["json", "countries"],
            &[
                ("order", "stationcount".to_string()),
                ("reverse", "true".to_string()),
                ("hidebroken", "true".to_string()),
            ],
        )?;
        let raw = self.fetch_list("countries", &url).await?;
        Ok(raw
            .iter()
            .map(Country::from_raw)
            .filter(|c| !c.code.is_empty())
            .collect())
    }

    /// Most used tags
    pub async fn tags(&self, limit: u32) -> Result<Vec<Tag>> {
        let url = self.endpoint(
            &["json", "tags"],
            &[
                ("order", "stationcount".to_string()),
                ("reverse", "true".to_string()),
                ("hidebroken", "true".to_string()),
                ("limit", limit.to_string()),
            ],
        )?;
        let raw = self.fetch_list("tags", &url).await?;
        Ok(raw
            .iter()
            .map(Tag::from_raw)
            .filter(|t| !t.name.is_empty())
            .collect())
    }

    /// Codec listing, the cheapest endpoint of the API
    pub async fn codecs(&self) -> Result<Vec<Value>> {
        let url = self.endpoint(&["json", "codecs"], &[])?;
        self.fetch_list("codecs", &url).await
    }

    // ========================================================================
    // Plumbing
    // ========================================================================

    fn endpoint(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::other(format!("Invalid base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    async fn fetch_list(&self, operation: &str, url: &Url) -> Result<Vec<Value>> {
        with_retry(self.retry, || self.get_list(url))
            .await
            .map_err(|e| {
                warn!(operation, error = %e, "Directory query failed after retries");
                Error::query_failed(operation, e)
            })
    }

    async fn get_list(&self, url: &Url) -> Result<Vec<Value>> {
        debug!("Fetching {}", url);

        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::api_error(format!(
                "API returned status: {}",
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        match body {
            Value::Array(items) => Ok(items),
            other => Err(Error::api_error(format!(
                "Expected a JSON array, got: {}",
                json_kind(&other)
            ))),
        }
    }
}

fn browse_pairs(limit: u32) -> Vec<(&'static str, String)> {
    vec![
        ("limit", limit.to_string()),
        ("order", "votes".to_string()),
        ("reverse", "true".to_string()),
        ("hidebroken", "true".to_string()),
    ]
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Builder for configuring a RadioBrowserClient
#[derive(Debug)]
pub struct ClientBuilder {
    client: Option<Client>,
    base_url: Option<String>,
    timeout: Duration,
    user_agent: String,
    retry: RetryPolicy,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            client: None,
            base_url: None,
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom HTTP client (shares its connection pool)
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the directory server base URL (e.g. `https://de1.api.radio-browser.info`)
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom User-Agent header (ignored with a custom client)
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the retry policy applied to every query
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Build the client
    pub async fn build(self) -> Result<RadioBrowserClient> {
        let base = self
            .base_url
            .ok_or_else(|| Error::other("A directory base URL is required"))?;
        let base_url = Url::parse(&base)?;
        if base_url.cannot_be_a_base() {
            return Err(Error::other(format!("Invalid base URL: {}", base)));
        }

        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .user_agent(&self.user_agent)
                .timeout(self.timeout)
                .build()?,
        };

        Ok(RadioBrowserClient {
            client,
            base_url,
            timeout: self.timeout,
            retry: self.retry,
        })
    }
}
