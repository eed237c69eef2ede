//! Error types for the Radio Browser client and playback session

/// Result type alias for Radio Browser operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when discovering servers, querying the directory
/// or driving the playback session
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// DNS discovery of directory servers failed (recovered by the seed list)
    #[error("Server discovery failed: {0}")]
    DiscoveryFailed(String),

    /// Every candidate server failed its liveness probe
    #[error("No healthy Radio Browser server (tried: {})", .tried.join(", "))]
    NoHealthyServer {
        /// Hosts that were probed, in order
        tried: Vec<String>,
    },

    /// The process-wide resolver could not be built
    #[error("Radio Browser directory unavailable: {0}")]
    DirectoryUnavailable(String),

    /// A station without a playable stream URL was offered for playback
    #[error("Station \"{name}\" has no valid stream URL")]
    InvalidStation {
        /// Display name of the rejected station
        name: String,
    },

    /// The audio output refused to start playback
    #[error("Playback failed to start: {0}")]
    PlaybackStartFailed(String),

    /// A directory query still failed after the retry budget was spent
    #[error("Directory query '{operation}' failed: {source}")]
    DirectoryQueryFailed {
        /// Name of the failed operation (e.g. "search")
        operation: String,
        /// Last error returned by the query
        #[source]
        source: Box<Error>,
    },

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// API returned an error status
    #[error("API error: {0}")]
    ApiError(String),

    /// Configuration error (from pmoconfig/anyhow)
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a generic error from a string
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an API error
    pub fn api_error(msg: impl Into<String>) -> Self {
        Self::ApiError(msg.into())
    }

    /// Wrap the last error of an exhausted directory query
    pub fn query_failed(operation: impl Into<String>, source: Error) -> Self {
        Self::DirectoryQueryFailed {
            operation: operation.into(),
            source: Box::new(source),
        }
    }

    /// True when no directory server could be reached ("service unavailable")
    pub fn is_directory_unavailable(&self) -> bool {
        matches!(
            self,
            Self::NoHealthyServer { .. } | Self::DirectoryUnavailable(_)
        )
    }
}
