//! DNS discovery of Radio Browser API servers
//!
//! Radio Browser publishes every API server behind one round-robin name
//! (`all.api.radio-browser.info`). Resolving its address records and then
//! reverse-resolving each address yields the per-server host names
//! (`de1.api.radio-browser.info`, ...) that TLS needs.
//!
//! Discovery never fails the caller: [`candidate_servers`] turns a failure
//! or an empty answer into the seed list.

use crate::error::{Error, Result};
use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Round-robin name advertising all directory servers
pub const DEFAULT_DISCOVERY_HOST: &str = "all.api.radio-browser.info";

/// Seed servers used when discovery is unavailable
pub const DEFAULT_FALLBACK_SERVERS: &[&str] = &["fi1.api.radio-browser.info"];

/// Source of candidate directory host names
#[async_trait]
pub trait ServerDiscovery: Send + Sync {
    /// Return candidate host names, in preference order
    async fn discover(&self) -> Result<Vec<String>>;
}

/// Address-record + reverse-lookup discovery
pub struct DnsDiscovery {
    host: String,
    resolver: TokioAsyncResolver,
}

impl DnsDiscovery {
    /// Discovery against `host`, using the system resolver configuration
    pub fn new(host: impl Into<String>) -> Self {
        let resolver = TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|e| {
            warn!(error = %e, "System DNS configuration unavailable, using defaults");
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
        });
        Self {
            host: host.into(),
            resolver,
        }
    }

    /// Discovery with an explicit resolver (custom nameservers, tests)
    pub fn with_resolver(host: impl Into<String>, resolver: TokioAsyncResolver) -> Self {
        Self {
            host: host.into(),
            resolver,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

impl Default for DnsDiscovery {
    fn default() -> Self {
        Self::new(DEFAULT_DISCOVERY_HOST)
    }
}

impl std::fmt::Debug for DnsDiscovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsDiscovery")
            .field("host", &self.host)
            .finish()
    }
}

#[async_trait]
impl ServerDiscovery for DnsDiscovery {
    async fn discover(&self) -> Result<Vec<String>> {
        info!(host = %self.host, "Resolving Radio Browser servers");

        let ips: Vec<_> = self
            .resolver
            .lookup_ip(self.host.as_str())
            .await
            .map_err(|e| Error::DiscoveryFailed(format!("{}: {}", self.host, e)))?
            .iter()
            .collect();

        if ips.is_empty() {
            return Err(Error::DiscoveryFailed(format!(
                "no address records for {}",
                self.host
            )));
        }

        let mut hostnames = Vec::with_capacity(ips.len());
        for ip in ips {
            match self.resolver.reverse_lookup(ip).await {
                Ok(names) => {
                    if let Some(name) = names.iter().next() {
                        let name = name.to_string();
                        let name = name.trim_end_matches('.').to_string();
                        debug!(%ip, host = %name, "Reverse lookup");
                        hostnames.push(name);
                    }
                }
                Err(e) => warn!(%ip, error = %e, "Failed to reverse lookup"),
            }
        }

        if hostnames.is_empty() {
            return Err(Error::DiscoveryFailed(format!(
                "no host names behind {}",
                self.host
            )));
        }

        info!(count = hostnames.len(), "Discovered Radio Browser servers");
        Ok(hostnames)
    }
}

/// Fixed candidate list
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    servers: Vec<String>,
}

impl StaticDiscovery {
    pub fn new<I, S>(servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            servers: servers.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl ServerDiscovery for StaticDiscovery {
    async fn discover(&self) -> Result<Vec<String>> {
        Ok(self.servers.clone())
    }
}

/// Discovered servers merged with the fallback seeds
///
/// Discovered hosts come first; seeds are appended; duplicates (case
/// insensitive) keep their first position. A discovery error only logs and
/// leaves the seeds.
pub async fn candidate_servers(
    discovery: &dyn ServerDiscovery,
    fallback: &[String],
) -> Vec<String> {
    let discovered = match discovery.discover().await {
        Ok(servers) => {
            if servers.is_empty() {
                warn!("No servers found via DNS, using fallbacks");
            }
            servers
        }
        Err(e) => {
            warn!(error = %e, "Server discovery failed, using fallbacks");
            Vec::new()
        }
    };

    merge_candidates(discovered, fallback)
}

fn merge_candidates(discovered: Vec<String>, fallback: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    discovered
        .into_iter()
        .chain(fallback.iter().cloned())
        .map(|s| s.trim().trim_end_matches('.').to_string())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_lowercase()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingDiscovery;

    #[async_trait]
    impl ServerDiscovery for FailingDiscovery {
        async fn discover(&self) -> Result<Vec<String>> {
            Err(Error::DiscoveryFailed("SERVFAIL".into()))
        }
    }

    fn seeds() -> Vec<String> {
        DEFAULT_FALLBACK_SERVERS
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_discovery_failure_uses_seeds() {
        let candidates = candidate_servers(&FailingDiscovery, &seeds()).await;
        assert_eq!(candidates, vec!["fi1.api.radio-browser.info"]);
    }

    #[tokio::test]
    async fn test_empty_discovery_uses_seeds() {
        let candidates = candidate_servers(&StaticDiscovery::default(), &seeds()).await;
        assert_eq!(candidates, vec!["fi1.api.radio-browser.info"]);
    }

    #[tokio::test]
    async fn test_discovered_servers_are_merged_and_deduplicated() {
        let discovery = StaticDiscovery::new([
            "de1.api.radio-browser.info.",
            "FI1.api.radio-browser.info",
            "de1.api.radio-browser.info",
        ]);
        let candidates = candidate_servers(&discovery, &seeds()).await;
        assert_eq!(
            candidates,
            vec!["de1.api.radio-browser.info", "FI1.api.radio-browser.info"]
        );
    }

    #[tokio::test]
    #[ignore = "Integration test - queries real DNS"]
    async fn test_dns_discovery() {
        let servers = DnsDiscovery::default().discover().await.unwrap();
        assert!(!servers.is_empty());
        for server in &servers {
            println!("  - {}", server);
            assert!(!server.ends_with('.'));
        }
    }
}
