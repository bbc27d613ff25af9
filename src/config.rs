use crate::error::{ObsidianError, Result};
use serde::Deserialize;
use std::time::Duration;

/// Default node identifier
pub const DEFAULT_IDENTIFIER: &str = "MAIN";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3030;
const DEFAULT_CLIENT_NAME: &str = "Obsidian";

/// Configuration for one Obsidian node connection
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Unique name of the node inside a registry
    pub identifier: String,
    pub host: String,
    pub port: u16,
    /// Shared secret sent as the `Authorization` header
    pub password: String,
    /// Bot account id sent as the `User-Id` header
    pub user_id: u64,
    /// Voice region hint
    pub region: Option<String>,
    /// Use `wss`/`https` instead of `ws`/`http`
    pub secure: bool,
    /// Value of the `Client-Name` header
    pub client_name: String,

    /// Attempts per REST call before giving up
    pub http_max_retries: u32,
    #[serde(with = "duration_ms")]
    pub http_backoff_base: Duration,

    #[serde(with = "duration_ms")]
    pub reconnect_backoff_base: Duration,
    /// `None` retries the socket forever
    pub max_reconnect_attempts: Option<u32>,

    /// How long a preset session idles with an empty queue before destroying itself
    #[serde(with = "duration_ms")]
    pub idle_timeout: Duration,

    pub spotify: Option<SpotifyConfig>,
}

/// Spotify client credentials
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_spotify_retries")]
    pub max_retries: u32,
}

fn default_spotify_retries() -> u32 {
    5
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            identifier: DEFAULT_IDENTIFIER.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            password: String::new(),
            user_id: 0,
            region: None,
            secure: false,
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            http_max_retries: 3,
            http_backoff_base: Duration::from_secs(1),
            reconnect_backoff_base: Duration::from_secs(7),
            max_reconnect_attempts: None,
            idle_timeout: Duration::from_secs(180),
            spotify: None,
        }
    }
}

impl NodeConfig {
    /// Create a config for the given host and port with defaults elsewhere
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Build a config from `OBSIDIAN_*` environment variables
    ///
    /// Reads `OBSIDIAN_HOST`, `OBSIDIAN_PORT`, `OBSIDIAN_PASSWORD`,
    /// `OBSIDIAN_IDENTIFIER`, `OBSIDIAN_USER_ID` and `OBSIDIAN_SECURE`.
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("OBSIDIAN_HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("OBSIDIAN_PORT") {
            config.port = port
                .parse()
                .map_err(|_| ObsidianError::InvalidConfig(format!("OBSIDIAN_PORT {port:?} is not a port")))?;
        }
        if let Ok(password) = std::env::var("OBSIDIAN_PASSWORD") {
            config.password = password;
        }
        if let Ok(identifier) = std::env::var("OBSIDIAN_IDENTIFIER") {
            config.identifier = identifier;
        }
        if let Ok(user_id) = std::env::var("OBSIDIAN_USER_ID") {
            config.user_id = user_id
                .parse()
                .map_err(|_| ObsidianError::InvalidConfig(format!("OBSIDIAN_USER_ID {user_id:?} is not an id")))?;
        }
        if let Ok(secure) = std::env::var("OBSIDIAN_SECURE") {
            config.secure = matches!(secure.as_str(), "1" | "true" | "yes");
        }

        Ok(config)
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_user_id(mut self, user_id: u64) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_http_retries(mut self, max_retries: u32, backoff_base: Duration) -> Self {
        self.http_max_retries = max_retries;
        self.http_backoff_base = backoff_base;
        self
    }

    pub fn with_reconnect(mut self, backoff_base: Duration, max_attempts: Option<u32>) -> Self {
        self.reconnect_backoff_base = backoff_base;
        self.max_reconnect_attempts = max_attempts;
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_spotify(mut self, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        self.spotify = Some(SpotifyConfig {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            max_retries: default_spotify_retries(),
        });
        self
    }

    /// WebSocket endpoint of the node
    pub fn ws_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{}://{}:{}/magma", scheme, self.host, self.port)
    }

    /// Base URL of the node's REST API
    pub fn http_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}/", scheme, self.host, self.port)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.identifier.is_empty() {
            return Err(ObsidianError::InvalidConfig("identifier cannot be empty".to_string()));
        }
        if self.http_max_retries < 1 {
            return Err(ObsidianError::InvalidConfig("http_max_retries must be at least 1".to_string()));
        }
        Ok(())
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
