//! Radio Browser client and playback session for PMORadio
//!
//! This crate finds a live server of the community
//! [Radio Browser](https://www.radio-browser.info) directory, queries it for
//! stations, and drives the single playback session of the application.
//!
//! # Features
//!
//! - **Server Discovery**: DNS lookup of the directory servers, with a seed
//!   list when DNS is unavailable
//! - **Liveness Probing**: sequential, time-bounded probes; the first healthy
//!   server is memoized for the whole process
//! - **Directory Queries**: search and browse by name, country and tag, with
//!   linear-backoff retries
//! - **Playback Session**: one audio output driven from the listener's
//!   intent, with stale output events filtered out
//! - **Configuration Extension**: resolver settings and the persisted volume
//!   live in pmoconfig
//!
//! # Example
//!
//! ```no_run
//! use pmoradiobrowser::{get_directory_client, StationQuery, DEFAULT_COUNTRY_CODE};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = get_directory_client().await?;
//!
//!     let stations = client
//!         .search(&StationQuery::new().country(DEFAULT_COUNTRY_CODE).tag("jazz"))
//!         .await?;
//!     for station in stations.iter().take(10) {
//!         println!("{} ({})", station.name, station.location());
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Playback
//!
//! See the [`player`] module: a [`SharedPlayer`] wraps the session and
//! consumes the events of its [`AudioOutput`](player::AudioOutput).

pub mod client;
pub mod discovery;
pub mod error;
pub mod models;
pub mod player;
pub mod resolver;
pub mod retry;

#[cfg(feature = "pmoconfig")]
pub mod config_ext;

pub use client::{ClientBuilder, RadioBrowserClient};
pub use discovery::{DnsDiscovery, ServerDiscovery, StaticDiscovery};
pub use error::{Error, Result};
pub use models::{Country, Station, StationOrder, StationQuery, Tag, DEFAULT_COUNTRY_CODE};
pub use player::{PlaybackPhase, PlayerSession, PlayerSnapshot, SharedPlayer};
pub use resolver::{
    get_directory_client, DirectoryEndpoint, DirectoryResolver, FallbackPolicy, HealthProbe,
    HttpProbe, ResolverSettings,
};
pub use retry::{with_retry, RetryPolicy};

#[cfg(feature = "pmoconfig")]
pub use config_ext::RadioBrowserConfigExt;
