use thiserror::Error;

/// Result type for Obsidian operations
pub type Result<T> = std::result::Result<T, ObsidianError>;

/// Errors that can occur when talking to an Obsidian node
#[derive(Error, Debug)]
pub enum ObsidianError {
    /// WebSocket handshake failed for a reason other than credentials
    #[error("Node {identifier:?} failed to connect: {source}")]
    ConnectionFailure {
        identifier: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },

    /// WebSocket handshake was rejected because of bad credentials
    #[error("Node {identifier:?} failed authorization")]
    AuthorizationFailure { identifier: String },

    /// A command was sent while the node had no live socket
    #[error("Node {0:?} is not connected")]
    NotConnected(String),

    /// A connection attempt, possibly a reconnect, is still in flight
    #[error("Node {0:?} is already connecting")]
    AlreadyConnecting(String),

    /// A node with the same identifier is already registered
    #[error("Node identifier {0:?} already exists")]
    AlreadyExists(String),

    /// The backend reported a load failure
    #[error("Search failed: {message}")]
    SearchFailure {
        message: String,
        severity: Option<String>,
    },

    /// The backend found nothing for a query
    #[error("No matches found for {0:?}")]
    NoMatches(String),

    /// Backend REST call failed after every retry
    #[error("HTTP {status} while requesting {url}, retry limit exhausted")]
    Http {
        status: u16,
        url: String,
        body: String,
    },

    /// Spotify Web API call failed after every retry
    #[error("Spotify HTTP {status} while requesting {url}, retry limit exhausted")]
    SpotifyHttp {
        status: u16,
        url: String,
        body: String,
    },

    /// Spotify rejected the client credentials
    #[error("Failed to authorize to Spotify")]
    SpotifyAuthorization,

    /// A parameter was outside its allowed range
    #[error("Validation error: {0}")]
    Validation(String),

    /// Queue capacity exceeded
    #[error("Queue is full (max {max_size} tracks)")]
    QueueFull { max_size: usize },

    /// Queue index out of range
    #[error("Index {index} out of range for queue of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// A session of another kind already exists for the guild
    #[error("Guild {0} already has a session of a different kind")]
    SessionKindMismatch(u64),

    /// The voice gateway reported a failure
    #[error("Voice error: {0}")]
    Voice(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The event channel was closed because the node went away
    #[error("Event channel closed")]
    ChannelClosed,

    /// An event receiver fell behind and missed events
    #[error("Event receiver lagged by {0} events")]
    Lagged(u64),

    /// Transport-level HTTP error
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// WebSocket error on an established connection
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ObsidianError {
    /// Whether this error is a connection failure, including the
    /// authorization refinement
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            ObsidianError::ConnectionFailure { .. } | ObsidianError::AuthorizationFailure { .. }
        )
    }

    /// Whether this error is a search failure, including "no matches"
    pub fn is_search_failure(&self) -> bool {
        matches!(
            self,
            ObsidianError::SearchFailure { .. } | ObsidianError::NoMatches(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_is_a_connection_failure() {
        let err = ObsidianError::AuthorizationFailure {
            identifier: "MAIN".to_string(),
        };
        assert!(err.is_connection_failure());
        assert!(!ObsidianError::NotConnected("MAIN".to_string()).is_connection_failure());
    }

    #[test]
    fn no_matches_is_a_search_failure() {
        assert!(ObsidianError::NoMatches("q".to_string()).is_search_failure());
        assert!(!ObsidianError::Validation("x".to_string()).is_search_failure());
    }
}
