use crate::backoff::ExponentialBackoff;
use crate::config::SpotifyConfig;
use crate::error::{ObsidianError, Result};
use crate::track::{Playable, Playlist, Source, Track, TrackInfo, SPOTIFY_MARKER};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{header, Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;

const API_URL: &str = "https://api.spotify.com/v1/";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const USER_AGENT: &str = concat!("obsidian-client/", env!("CARGO_PKG_VERSION"));

/// Minimal Spotify Web API client using the client-credentials flow
///
/// Tracks fetched here carry the `"spotify"` id marker and are resolved
/// against a playable source when a session plays them.
pub struct SpotifyClient {
    client: Client,
    client_id: String,
    client_secret: String,
    max_retries: u32,
    backoff_base: Duration,
    api_url: String,
    token_url: String,
    token: Mutex<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyArtist {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpotifyExternalUrls {
    #[serde(default)]
    pub spotify: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyImage {
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpotifyAlbum {
    #[serde(default)]
    pub images: Vec<SpotifyImage>,
}

/// Track object of the Web API, reduced to what a session needs
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyTrack {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SpotifyArtist>,
    pub duration_ms: u64,
    #[serde(default)]
    pub external_urls: SpotifyExternalUrls,
    #[serde(default)]
    pub album: SpotifyAlbum,
}

impl SpotifyTrack {
    /// Convert into an unresolved [`Track`]
    pub fn into_track(self) -> Track {
        let author = self
            .artists
            .first()
            .map(|artist| artist.name.clone())
            .unwrap_or_default();
        let identifier = self.id.unwrap_or_default();
        let uri = self
            .external_urls
            .spotify
            .unwrap_or_else(|| format!("https://open.spotify.com/track/{identifier}"));

        Track::new(
            SPOTIFY_MARKER,
            TrackInfo {
                title: self.name,
                author,
                uri,
                identifier,
                length: self.duration_ms,
                position: 0,
                is_stream: false,
                is_seekable: true,
                source_name: Source::Spotify,
                thumbnail: self.album.images.into_iter().next().map(|image| image.url),
            },
        )
    }
}

/// Spotify resource referenced by a URL or URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpotifyLink {
    Track(String),
    Playlist(String),
}

impl SpotifyLink {
    /// Parse `https://open.spotify.com/<kind>/<id>` or `spotify:<kind>:<id>`
    pub fn parse(query: &str) -> Option<Self> {
        let query = query.trim();
        let (kind, id) = if let Some(uri) = query.strip_prefix("spotify:") {
            uri.split_once(':')?
        } else {
            let path = query
                .strip_prefix("https://")
                .or_else(|| query.strip_prefix("http://"))?
                .strip_prefix("open.spotify.com/")?;
            path.split_once('/')?
        };

        let id = id.split(['?', '#', '/']).next().unwrap_or_default();
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }

        match kind {
            "track" => Some(Self::Track(id.to_string())),
            "playlist" => Some(Self::Playlist(id.to_string())),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlaylistObject {
    name: String,
    #[serde(default)]
    tracks: PlaylistTracksPage,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    track: Option<SpotifyTrack>,
}

#[derive(Debug, Default, Deserialize)]
struct PlaylistTracksPage {
    #[serde(default)]
    items: Vec<PlaylistItem>,
}

impl SpotifyClient {
    pub fn new(config: &SpotifyConfig) -> Result<Self> {
        Self::with_urls(config, API_URL, TOKEN_URL)
    }

    /// Client talking to custom API and token endpoints
    pub fn with_urls(config: &SpotifyConfig, api_url: impl Into<String>, token_url: impl Into<String>) -> Result<Self> {
        if config.max_retries < 1 {
            return Err(ObsidianError::InvalidConfig(
                "spotify max_retries must be at least 1".to_string(),
            ));
        }

        let mut api_url = api_url.into();
        if !api_url.ends_with('/') {
            api_url.push('/');
        }

        Ok(Self {
            client: Client::builder().user_agent(USER_AGENT).build()?,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            max_retries: config.max_retries,
            backoff_base: Duration::from_secs(1),
            api_url,
            token_url: token_url.into(),
            token: Mutex::new(None),
        })
    }

    #[cfg(test)]
    fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    fn basic_credentials(&self) -> String {
        STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret))
    }

    async fn retrieve_token(&self) -> Result<String> {
        let response = self
            .client
            .post(&self.token_url)
            .header(header::AUTHORIZATION, format!("Basic {}", self.basic_credentials()))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let info: TokenResponse = response.json().await?;
        match info {
            TokenResponse {
                error: None,
                access_token: Some(token),
            } => Ok(token),
            _ => {
                tracing::error!("HTTP(SPOTIFY) | Authentication failed.");
                Err(ObsidianError::SpotifyAuthorization)
            }
        }
    }

    async fn token(&self, refresh: bool) -> Result<String> {
        let mut cached = self.token.lock().await;
        match cached.as_ref() {
            Some(token) if !refresh => Ok(token.clone()),
            _ => {
                let token = self.retrieve_token().await?;
                *cached = Some(token.clone());
                Ok(token)
            }
        }
    }

    /// Bearer request against the Web API
    ///
    /// 401 refreshes the token, 429 sleeps for `Retry-After` seconds and
    /// anything else non-2xx backs off. Every path counts toward the retry
    /// budget.
    pub async fn request<T: DeserializeOwned>(&self, method: Method, route: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}{}", self.api_url, route.trim_start_matches('/'));
        let mut backoff = ExponentialBackoff::new(self.backoff_base);
        let mut token = self.token(false).await?;
        let mut last = (0u16, String::new());

        for attempt in 1..=self.max_retries {
            let response = self
                .client
                .request(method.clone(), &url)
                .bearer_auth(&token)
                .query(query)
                .send()
                .await?;

            let status = response.status();
            if status.is_success() {
                return Ok(response.json().await?);
            }

            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<u64>().ok());
            last = (status.as_u16(), response.text().await.unwrap_or_default());

            if attempt == self.max_retries {
                break;
            }

            match status {
                StatusCode::UNAUTHORIZED => {
                    token = self.token(true).await?;
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    let amount = retry_after.unwrap_or(1);
                    tracing::warn!("HTTP(SPOTIFY) | Ratelimited, retrying in {} seconds...", amount);
                    tokio::time::sleep(Duration::from_secs(amount)).await;
                }
                _ => {
                    let delay = backoff.next_delay();
                    tracing::warn!(
                        "HTTP(SPOTIFY) | {} status code while requesting from {}, retrying in {:.2} seconds",
                        status.as_u16(),
                        url,
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        tracing::error!(
            "HTTP(SPOTIFY) | {} status code while requesting from {}, retry limit exhausted",
            last.0,
            url
        );
        Err(ObsidianError::SpotifyHttp {
            status: last.0,
            url,
            body: last.1,
        })
    }

    /// Fetch one track by Spotify id
    pub async fn track(&self, id: &str) -> Result<Track> {
        let track: SpotifyTrack = self.request(Method::GET, &format!("tracks/{id}"), &[]).await?;
        Ok(track.into_track())
    }

    /// Fetch the first page of a playlist's tracks
    pub async fn playlist_tracks(&self, id: &str) -> Result<Vec<Track>> {
        let page: PlaylistTracksPage = self
            .request(Method::GET, &format!("playlists/{id}/tracks"), &[])
            .await?;
        Ok(page
            .items
            .into_iter()
            .filter_map(|item| item.track)
            .map(SpotifyTrack::into_track)
            .collect())
    }

    /// Fetch a playlist with its first page of tracks
    pub async fn playlist(&self, id: &str) -> Result<Playlist> {
        let object: PlaylistObject = self
            .request(Method::GET, &format!("playlists/{id}"), &[])
            .await?;
        let tracks: Vec<Track> = object
            .tracks
            .items
            .into_iter()
            .filter_map(|item| item.track)
            .map(SpotifyTrack::into_track)
            .collect();

        tracing::info!("HTTP(SPOTIFY) | Playlist {:?} has {} tracks", object.name, tracks.len());
        Ok(Playlist::from_tracks(object.name, &tracks)
            .with_uri(format!("https://open.spotify.com/playlist/{id}")))
    }

    /// Resolve a parsed link into unresolved tracks
    pub async fn load(&self, link: &SpotifyLink) -> Result<Playable> {
        Ok(match link {
            SpotifyLink::Track(id) => self.track(id).await?.into(),
            SpotifyLink::Playlist(id) => self.playlist(id).await?.into(),
        })
    }
}

impl std::fmt::Debug for SpotifyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotifyClient")
            .field("client_id", &self.client_id)
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}
