//! pmoconfig integration for Radio Browser
//!
//! The `RadioBrowserConfigExt` trait adds the resolver, retry and player
//! settings to `pmoconfig::Config`. Getters persist their default when the
//! key is missing, so a fresh configuration file lists every knob.
//!
//! ```yaml
//! radiobrowser:
//!   discovery_host: all.api.radio-browser.info
//!   fallback_servers: [fi1.api.radio-browser.info]
//!   probe_timeout_ms: 3000
//!   fallback_policy: fail
//!   user_agent: PMORadio/0.1 (pmoradiobrowser)
//!   retry:
//!     max_retries: 2
//!     base_delay_ms: 500
//!   player:
//!     volume: 0.7
//! ```
//!
//! # Example
//!
//! ```no_run
//! use pmoconfig::get_config;
//! use pmoradiobrowser::RadioBrowserConfigExt;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = get_config();
//! println!("Probe timeout: {:?}", config.get_radiobrowser_probe_timeout()?);
//! config.set_radiobrowser_fallback_servers(&["de1.api.radio-browser.info".to_string()])?;
//! # Ok(())
//! # }
//! ```

use crate::discovery::{DEFAULT_DISCOVERY_HOST, DEFAULT_FALLBACK_SERVERS};
use crate::client::DEFAULT_USER_AGENT;
use crate::player::{PreferenceStore, DEFAULT_VOLUME};
use crate::resolver::{clamp_probe_timeout, FallbackPolicy, ResolverSettings, DEFAULT_PROBE_TIMEOUT_MS};
use crate::retry::{RetryPolicy, DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_RETRIES};
use anyhow::Result;
use pmoconfig::Config;
use serde_yaml::{Number, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const DISCOVERY_HOST_KEY: &[&str] = &["radiobrowser", "discovery_host"];
const FALLBACK_SERVERS_KEY: &[&str] = &["radiobrowser", "fallback_servers"];
const PROBE_TIMEOUT_KEY: &[&str] = &["radiobrowser", "probe_timeout_ms"];
const FALLBACK_POLICY_KEY: &[&str] = &["radiobrowser", "fallback_policy"];
const USER_AGENT_KEY: &[&str] = &["radiobrowser", "user_agent"];
const MAX_RETRIES_KEY: &[&str] = &["radiobrowser", "retry", "max_retries"];
const BASE_DELAY_KEY: &[&str] = &["radiobrowser", "retry", "base_delay_ms"];

/// Key of the persisted player volume
pub const VOLUME_KEY: &[&str] = &["radiobrowser", "player", "volume"];

/// Extension trait for the Radio Browser settings of `pmoconfig::Config`
pub trait RadioBrowserConfigExt {
    // ========================================================================
    // Discovery
    // ========================================================================

    /// Round-robin DNS name listing the directory servers
    fn get_radiobrowser_discovery_host(&self) -> Result<String>;
    fn set_radiobrowser_discovery_host(&self, host: &str) -> Result<()>;

    /// Seed servers tried after (or instead of) the discovered ones
    fn get_radiobrowser_fallback_servers(&self) -> Result<Vec<String>>;
    fn set_radiobrowser_fallback_servers(&self, servers: &[String]) -> Result<()>;

    // ========================================================================
    // Liveness probe
    // ========================================================================

    /// Probe timeout, clamped to 3..=5 seconds
    fn get_radiobrowser_probe_timeout(&self) -> Result<Duration>;
    fn set_radiobrowser_probe_timeout_ms(&self, timeout_ms: u64) -> Result<()>;

    /// Behavior when every candidate fails its probe
    ///
    /// Unknown values are reported and read as the default (`fail`).
    fn get_radiobrowser_fallback_policy(&self) -> Result<FallbackPolicy>;
    fn set_radiobrowser_fallback_policy(&self, policy: FallbackPolicy) -> Result<()>;

    fn get_radiobrowser_user_agent(&self) -> Result<String>;

    // ========================================================================
    // Retry
    // ========================================================================

    fn get_radiobrowser_retry_policy(&self) -> Result<RetryPolicy>;
    fn set_radiobrowser_retry_policy(&self, policy: RetryPolicy) -> Result<()>;

    // ========================================================================
    // Player
    // ========================================================================

    /// Persisted volume in `[0, 1]`
    fn get_radiobrowser_volume(&self) -> Result<f32>;
    fn set_radiobrowser_volume(&self, volume: f32) -> Result<()>;

    /// All resolver settings at once
    fn get_radiobrowser_resolver_settings(&self) -> Result<ResolverSettings>;
}

impl RadioBrowserConfigExt for Config {
    fn get_radiobrowser_discovery_host(&self) -> Result<String> {
        self.get_string_or(DISCOVERY_HOST_KEY, DEFAULT_DISCOVERY_HOST)
    }

    fn set_radiobrowser_discovery_host(&self, host: &str) -> Result<()> {
        self.set_value(DISCOVERY_HOST_KEY, Value::String(host.to_string()))
    }

    fn get_radiobrowser_fallback_servers(&self) -> Result<Vec<String>> {
        self.get_string_list_or(FALLBACK_SERVERS_KEY, DEFAULT_FALLBACK_SERVERS)
    }

    fn set_radiobrowser_fallback_servers(&self, servers: &[String]) -> Result<()> {
        let seq = servers.iter().map(|s| Value::String(s.clone())).collect();
        self.set_value(FALLBACK_SERVERS_KEY, Value::Sequence(seq))
    }

    fn get_radiobrowser_probe_timeout(&self) -> Result<Duration> {
        let ms = self.get_u64_or(PROBE_TIMEOUT_KEY, DEFAULT_PROBE_TIMEOUT_MS)?;
        Ok(clamp_probe_timeout(ms))
    }

    fn set_radiobrowser_probe_timeout_ms(&self, timeout_ms: u64) -> Result<()> {
        let ms = clamp_probe_timeout(timeout_ms).as_millis() as u64;
        self.set_value(PROBE_TIMEOUT_KEY, Value::Number(Number::from(ms)))
    }

    fn get_radiobrowser_fallback_policy(&self) -> Result<FallbackPolicy> {
        let raw = self.get_string_or(FALLBACK_POLICY_KEY, FallbackPolicy::default().as_str())?;
        Ok(raw.parse().unwrap_or_else(|e| {
            warn!(error = %e, "Using the default fallback policy");
            FallbackPolicy::default()
        }))
    }

    fn set_radiobrowser_fallback_policy(&self, policy: FallbackPolicy) -> Result<()> {
        self.set_value(FALLBACK_POLICY_KEY, Value::String(policy.as_str().to_string()))
    }

    fn get_radiobrowser_user_agent(&self) -> Result<String> {
        self.get_string_or(USER_AGENT_KEY, DEFAULT_USER_AGENT)
    }

    fn get_radiobrowser_retry_policy(&self) -> Result<RetryPolicy> {
        let max_retries = self.get_u64_or(MAX_RETRIES_KEY, DEFAULT_MAX_RETRIES as u64)?;
        let base_delay = self.get_u64_or(BASE_DELAY_KEY, DEFAULT_BASE_DELAY_MS)?;
        Ok(RetryPolicy::new(
            u32::try_from(max_retries).unwrap_or(u32::MAX),
            Duration::from_millis(base_delay),
        ))
    }

    fn set_radiobrowser_retry_policy(&self, policy: RetryPolicy) -> Result<()> {
        self.set_value(
            MAX_RETRIES_KEY,
            Value::Number(Number::from(policy.max_retries as u64)),
        )?;
        self.set_value(
            BASE_DELAY_KEY,
            Value::Number(Number::from(policy.base_delay.as_millis() as u64)),
        )
    }

    fn get_radiobrowser_volume(&self) -> Result<f32> {
        let volume = self.get_f64_or(VOLUME_KEY, DEFAULT_VOLUME as f64)? as f32;
        if volume.is_finite() {
            Ok(volume.clamp(0.0, 1.0))
        } else {
            Ok(DEFAULT_VOLUME)
        }
    }

    fn set_radiobrowser_volume(&self, volume: f32) -> Result<()> {
        let volume = volume.clamp(0.0, 1.0) as f64;
        self.set_value(VOLUME_KEY, Value::Number(Number::from(volume)))
    }

    fn get_radiobrowser_resolver_settings(&self) -> Result<ResolverSettings> {
        Ok(ResolverSettings {
            discovery_host: self.get_radiobrowser_discovery_host()?,
            fallback_servers: self.get_radiobrowser_fallback_servers()?,
            probe_timeout: self.get_radiobrowser_probe_timeout()?,
            fallback_policy: self.get_radiobrowser_fallback_policy()?,
            user_agent: self.get_radiobrowser_user_agent()?,
            retry: self.get_radiobrowser_retry_policy()?,
        })
    }
}

/// The configuration file stores the player volume
impl PreferenceStore for Arc<Config> {
    fn load_volume(&self) -> Option<f32> {
        match self.get_radiobrowser_volume() {
            Ok(volume) => Some(volume),
            Err(e) => {
                warn!(error = %e, "Cannot read the stored volume");
                None
            }
        }
    }

    fn save_volume(&self, volume: f32) -> crate::Result<()> {
        self.set_radiobrowser_volume(volume)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::in_memory().expect("in-memory config")
    }

    #[test]
    fn test_defaults() {
        let config = config();
        let settings = config.get_radiobrowser_resolver_settings().unwrap();
        assert_eq!(settings, ResolverSettings::default());
        assert_eq!(config.get_radiobrowser_volume().unwrap(), DEFAULT_VOLUME);
    }

    #[test]
    fn test_probe_timeout_is_clamped() {
        let config = config();
        config.set_radiobrowser_probe_timeout_ms(10_000).unwrap();
        assert_eq!(
            config.get_radiobrowser_probe_timeout().unwrap(),
            Duration::from_secs(5)
        );

        config
            .set_value(PROBE_TIMEOUT_KEY, Value::Number(Number::from(100u64)))
            .unwrap();
        assert_eq!(
            config.get_radiobrowser_probe_timeout().unwrap(),
            Duration::from_secs(3)
        );
    }

    #[test]
    fn test_fallback_policy_roundtrip_and_garbage() {
        let config = config();
        config
            .set_radiobrowser_fallback_policy(FallbackPolicy::FirstCandidate)
            .unwrap();
        assert_eq!(
            config.get_radiobrowser_fallback_policy().unwrap(),
            FallbackPolicy::FirstCandidate
        );

        config
            .set_value(FALLBACK_POLICY_KEY, Value::String("sometimes".into()))
            .unwrap();
        assert_eq!(
            config.get_radiobrowser_fallback_policy().unwrap(),
            FallbackPolicy::Fail
        );
    }

    #[test]
    fn test_fallback_servers_accept_csv() {
        let config = config();
        config
            .set_value(
                FALLBACK_SERVERS_KEY,
                Value::String("de1.api.radio-browser.info, nl1.api.radio-browser.info".into()),
            )
            .unwrap();
        assert_eq!(
            config.get_radiobrowser_fallback_servers().unwrap(),
            vec!["de1.api.radio-browser.info", "nl1.api.radio-browser.info"]
        );
    }

    #[test]
    fn test_retry_policy() {
        let config = config();
        config
            .set_radiobrowser_retry_policy(RetryPolicy::new(4, Duration::from_millis(250)))
            .unwrap();
        assert_eq!(
            config.get_radiobrowser_retry_policy().unwrap(),
            RetryPolicy::new(4, Duration::from_millis(250))
        );
    }

    #[test]
    fn test_config_as_preference_store() {
        let config = Arc::new(config());
        config.save_volume(0.35).unwrap();
        let restored = config.load_volume().unwrap();
        assert!((restored - 0.35).abs() < 1e-6);

        config.save_volume(2.0).unwrap();
        assert_eq!(config.load_volume(), Some(1.0));
    }
}
