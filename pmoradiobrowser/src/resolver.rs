//! Selection of a live directory server
//!
//! [`DirectoryResolver`] discovers candidate servers, probes them in order
//! and binds a [`RadioBrowserClient`] to the first one that answers. The
//! client is memoized: concurrent callers share one resolution, and a
//! failed resolution is not cached so the next call starts over.
//!
//! ```no_run
//! use pmoradiobrowser::get_directory_client;
//!
//! # async fn demo() -> pmoradiobrowser::Result<()> {
//! let client = get_directory_client().await?;
//! println!("Using {}", client.base_url());
//! # Ok(())
//! # }
//! ```

use crate::client::{RadioBrowserClient, DEFAULT_USER_AGENT};
use crate::discovery::{
    candidate_servers, DnsDiscovery, ServerDiscovery, DEFAULT_DISCOVERY_HOST,
    DEFAULT_FALLBACK_SERVERS,
};
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use lazy_static::lazy_static;
use reqwest::Client;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Default liveness probe timeout (milliseconds)
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 3000;

/// Accepted probe timeout range (milliseconds)
pub const PROBE_TIMEOUT_RANGE_MS: (u64, u64) = (3000, 5000);

// ============================================================================
// Liveness probe
// ============================================================================

/// Liveness check for one candidate host
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// `Ok(())` when the host answered in time with a success status
    async fn check(&self, host: &str) -> Result<()>;
}

/// Probe issuing `GET <scheme>://<host>/json/codecs`
///
/// The request is dropped (and so aborted) when the timeout elapses.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    timeout: Duration,
    scheme: String,
}

impl HttpProbe {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            scheme: "https".to_string(),
        }
    }

    /// Use another URL scheme (plain `http` for local test servers)
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn probe_url(&self, host: &str) -> String {
        format!("{}://{}/json/codecs", self.scheme, host)
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn check(&self, host: &str) -> Result<()> {
        let url = self.probe_url(host);
        debug!("Probing {}", url);

        let response = tokio::time::timeout(self.timeout, self.client.get(&url).send())
            .await
            .map_err(|_| {
                Error::api_error(format!(
                    "{} did not answer within {} ms",
                    host,
                    self.timeout.as_millis()
                ))
            })??;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::api_error(format!(
                "{} answered with status {}",
                host,
                response.status()
            )))
        }
    }
}

// ============================================================================
// Settings
// ============================================================================

/// What to do when no candidate passes its probe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// Report [`Error::NoHealthyServer`]
    #[default]
    Fail,
    /// Use the first candidate anyway
    FirstCandidate,
}

impl FallbackPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fail => "fail",
            Self::FirstCandidate => "first_candidate",
        }
    }
}

impl fmt::Display for FallbackPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FallbackPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "fail" => Ok(Self::Fail),
            "first_candidate" | "first" => Ok(Self::FirstCandidate),
            other => Err(Error::other(format!("Unknown fallback policy: {}", other))),
        }
    }
}

/// Everything needed to build a [`DirectoryResolver`]
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverSettings {
    pub discovery_host: String,
    pub fallback_servers: Vec<String>,
    pub probe_timeout: Duration,
    pub fallback_policy: FallbackPolicy,
    pub user_agent: String,
    pub retry: RetryPolicy,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            discovery_host: DEFAULT_DISCOVERY_HOST.to_string(),
            fallback_servers: DEFAULT_FALLBACK_SERVERS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            probe_timeout: Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS),
            fallback_policy: FallbackPolicy::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Clamp a probe timeout into [`PROBE_TIMEOUT_RANGE_MS`]
pub fn clamp_probe_timeout(timeout_ms: u64) -> Duration {
    let (min, max) = PROBE_TIMEOUT_RANGE_MS;
    Duration::from_millis(timeout_ms.clamp(min, max))
}

// ============================================================================
// Resolver
// ============================================================================

/// The server a resolver settled on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEndpoint {
    pub host: String,
    pub base_url: String,
}

impl DirectoryEndpoint {
    pub fn new(scheme: &str, host: &str) -> Self {
        Self {
            host: host.to_string(),
            base_url: format!("{}://{}", scheme, host),
        }
    }
}

struct ResolvedDirectory {
    endpoint: DirectoryEndpoint,
    client: RadioBrowserClient,
}

/// Discovers, probes and memoizes the directory client
pub struct DirectoryResolver {
    discovery: Arc<dyn ServerDiscovery>,
    probe: Arc<dyn HealthProbe>,
    fallback_servers: Vec<String>,
    policy: FallbackPolicy,
    scheme: String,
    http: Client,
    retry: RetryPolicy,
    resolved: OnceCell<ResolvedDirectory>,
}

impl DirectoryResolver {
    /// Resolver with custom discovery and probe (HTTP client from defaults)
    pub fn new(discovery: Arc<dyn ServerDiscovery>, probe: Arc<dyn HealthProbe>) -> Self {
        let settings = ResolverSettings::default();
        Self {
            discovery,
            probe,
            fallback_servers: settings.fallback_servers,
            policy: settings.fallback_policy,
            scheme: "https".to_string(),
            http: Client::new(),
            retry: settings.retry,
            resolved: OnceCell::new(),
        }
    }

    /// DNS discovery and HTTP probing as described by `settings`
    pub fn from_settings(settings: ResolverSettings) -> Result<Self> {
        let http = Client::builder().user_agent(&settings.user_agent).build()?;
        let probe = HttpProbe::new(http.clone(), settings.probe_timeout);
        let discovery = DnsDiscovery::new(settings.discovery_host);

        Ok(Self {
            discovery: Arc::new(discovery),
            probe: Arc::new(probe),
            fallback_servers: settings.fallback_servers,
            policy: settings.fallback_policy,
            scheme: "https".to_string(),
            http,
            retry: settings.retry,
            resolved: OnceCell::new(),
        })
    }

    /// Settings read from the pmoconfig configuration
    #[cfg(feature = "pmoconfig")]
    pub fn from_config(config: &pmoconfig::Config) -> Result<Self> {
        use crate::config_ext::RadioBrowserConfigExt;
        Self::from_settings(config.get_radiobrowser_resolver_settings()?)
    }

    pub fn with_fallback_servers<I, S>(mut self, servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_servers = servers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_fallback_policy(mut self, policy: FallbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// URL scheme of the bound client (`https` unless testing locally)
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Endpoint chosen by the last successful resolution, if any
    pub fn endpoint(&self) -> Option<&DirectoryEndpoint> {
        self.resolved.get().map(|r| &r.endpoint)
    }

    /// Pick a directory server without touching the memoized client
    ///
    /// Candidates are probed sequentially; the first healthy one wins and
    /// the rest are not probed.
    pub async fn resolve(&self) -> Result<DirectoryEndpoint> {
        let candidates = candidate_servers(self.discovery.as_ref(), &self.fallback_servers).await;

        for host in &candidates {
            info!(host = %host, "Checking health for server");
            match self.probe.check(host).await {
                Ok(()) => {
                    info!(host = %host, "Server is healthy");
                    return Ok(DirectoryEndpoint::new(&self.scheme, host));
                }
                Err(e) => warn!(host = %host, error = %e, "Server is unhealthy"),
            }
        }

        match (self.policy, candidates.first()) {
            (FallbackPolicy::FirstCandidate, Some(first)) => {
                warn!(host = %first, "No healthy server found, using first candidate");
                Ok(DirectoryEndpoint::new(&self.scheme, first))
            }
            _ => {
                warn!(tried = candidates.len(), "No healthy Radio Browser server");
                Err(Error::NoHealthyServer { tried: candidates })
            }
        }
    }

    /// The memoized client, resolving on first use
    pub async fn directory_client(&self) -> Result<RadioBrowserClient> {
        let resolved = self
            .resolved
            .get_or_try_init(|| async {
                let endpoint = self.resolve().await?;
                let client = RadioBrowserClient::builder()
                    .client(self.http.clone())
                    .base_url(&endpoint.base_url)
                    .retry(self.retry)
                    .build()
                    .await?;
                info!(base_url = %endpoint.base_url, "Directory client ready");
                Ok::<_, Error>(ResolvedDirectory { endpoint, client })
            })
            .await?;

        Ok(resolved.client.clone())
    }
}

impl fmt::Debug for DirectoryResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryResolver")
            .field("fallback_servers", &self.fallback_servers)
            .field("policy", &self.policy)
            .field("endpoint", &self.endpoint())
            .finish()
    }
}

// ============================================================================
// Process-wide resolver
// ============================================================================

lazy_static! {
    static ref DIRECTORY: Option<DirectoryResolver> = {
        match DirectoryResolver::from_settings(global_settings()) {
            Ok(resolver) => Some(resolver),
            Err(e) => {
                warn!(error = %e, "Cannot build the directory resolver");
                None
            }
        }
    };
}

fn global_settings() -> ResolverSettings {
    #[cfg(feature = "pmoconfig")]
    {
        use crate::config_ext::RadioBrowserConfigExt;
        match pmoconfig::get_config().get_radiobrowser_resolver_settings() {
            Ok(settings) => return settings,
            Err(e) => warn!(error = %e, "Invalid Radio Browser configuration, using defaults"),
        }
    }
    ResolverSettings::default()
}

/// The process-wide directory client
///
/// Resolved once per process; every caller gets the same server.
pub async fn get_directory_client() -> Result<RadioBrowserClient> {
    client_from(DIRECTORY.as_ref()).await
}

async fn client_from(resolver: Option<&DirectoryResolver>) -> Result<RadioBrowserClient> {
    match resolver {
        Some(resolver) => resolver.directory_client().await,
        None => Err(Error::DirectoryUnavailable(
            "the directory resolver could not be built".to_string(),
        )),
    }
}
