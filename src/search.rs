use crate::error::{ObsidianError, Result};
use crate::http::HttpClient;
use crate::track::{Playable, Playlist, PlaylistInfo, RawTrack, Source, Track};
use regex::Regex;
use serde::Deserialize;
use std::borrow::Cow;

/// Queries matching this are passed through untouched
pub const DEFAULT_URL_PATTERN: &str = r"^https?://(?:www\.)?.+";

/// Backend classification of a `loadtracks` response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadType {
    NoMatches,
    LoadFailed,
    PlaylistLoaded,
    TrackLoaded,
    SearchResult,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadException {
    pub message: String,
    #[serde(default)]
    pub severity: Option<String>,
}

/// Body of `GET /loadtracks`
#[derive(Debug, Clone, Deserialize)]
pub struct LoadResponse {
    pub load_type: LoadType,
    #[serde(default)]
    pub tracks: Vec<RawTrack>,
    #[serde(default)]
    pub playlist_info: Option<PlaylistInfo>,
    #[serde(default)]
    pub exception: Option<LoadException>,
}

/// Options for a single search call
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Search provider for plain-text queries
    pub source: Option<Source>,
    /// Turn load failures and empty results into `Ok(None)`
    pub suppress: bool,
    /// Cap on the number of tracks returned by `search_tracks`
    pub limit: Option<usize>,
    /// Attached to every returned track
    pub requester: Option<u64>,
}

impl SearchOptions {
    pub fn source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    pub fn suppress(mut self, suppress: bool) -> Self {
        self.suppress = suppress;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn requester(mut self, requester: u64) -> Self {
        self.requester = Some(requester);
        self
    }
}

/// Result of `search_tracks`
#[derive(Debug, Clone)]
pub enum SearchResult {
    Tracks(Vec<Track>),
    Playlist(Playlist),
}

/// Resolves URLs and text queries into tracks through a node
#[derive(Debug, Clone)]
pub struct TrackSearcher {
    http: HttpClient,
    url_regex: Regex,
}

impl TrackSearcher {
    pub fn new(http: HttpClient) -> Result<Self> {
        Self::with_url_pattern(http, DEFAULT_URL_PATTERN)
    }

    pub fn with_url_pattern(http: HttpClient, pattern: &str) -> Result<Self> {
        let url_regex = Regex::new(pattern)
            .map_err(|e| ObsidianError::InvalidConfig(format!("invalid url pattern: {e}")))?;
        Ok(Self { http, url_regex })
    }

    /// Prefix plain-text queries with the provider's search scheme
    pub fn sanitize<'a>(&self, query: &'a str, source: Option<Source>) -> Cow<'a, str> {
        if self.url_regex.is_match(query) {
            return Cow::Borrowed(query);
        }
        match source {
            Some(Source::Youtube) => Cow::Owned(format!("ytsearch:{query}")),
            Some(Source::Soundcloud) => Cow::Owned(format!("scsearch:{query}")),
            Some(Source::YoutubeMusic) => Cow::Owned(format!("ytmsearch:{query}")),
            _ => Cow::Borrowed(query),
        }
    }

    async fn load(&self, query: &str, source: Option<Source>) -> Result<LoadResponse> {
        let response = self.http.load_tracks(&self.sanitize(query, source)).await?;

        if response.load_type == LoadType::LoadFailed {
            tracing::warn!("SEARCH | Query {:?} returned {:?}", query, response.load_type);
            let exception = response.exception.unwrap_or(LoadException {
                message: "load failed".to_string(),
                severity: None,
            });
            return Err(ObsidianError::SearchFailure {
                message: exception.message,
                severity: exception.severity,
            });
        }

        tracing::info!(
            "SEARCH | Query {:?} returned {:?} with {} tracks",
            query,
            response.load_type,
            response.tracks.len()
        );

        if response.load_type == LoadType::NoMatches || response.tracks.is_empty() {
            return Err(ObsidianError::NoMatches(query.to_string()));
        }

        Ok(response)
    }

    fn playlist(query: &str, response: LoadResponse, requester: Option<u64>) -> Playlist {
        let info = response.playlist_info.unwrap_or(PlaylistInfo {
            name: String::new(),
            selected_track: 0,
        });
        let playlist = Playlist::new(info, response.tracks).with_uri(query);
        match requester {
            Some(requester) => playlist.with_requester(requester),
            None => playlist,
        }
    }

    fn track(raw: RawTrack, requester: Option<u64>) -> Track {
        let track = Track::from_raw(raw);
        match requester {
            Some(requester) => track.with_requester(requester),
            None => track,
        }
    }

    /// First matching track, or the whole playlist for playlist URLs
    pub async fn search_track(&self, query: &str, options: &SearchOptions) -> Result<Option<Playable>> {
        let response = match suppressed(self.load(query, options.source).await, options.suppress)? {
            Some(response) => response,
            None => return Ok(None),
        };

        if response.load_type == LoadType::PlaylistLoaded {
            return Ok(Some(Self::playlist(query, response, options.requester).into()));
        }

        Ok(response
            .tracks
            .into_iter()
            .next()
            .map(|raw| Self::track(raw, options.requester).into()))
    }

    /// Every matching track (up to `limit`), or the whole playlist
    pub async fn search_tracks(&self, query: &str, options: &SearchOptions) -> Result<Option<SearchResult>> {
        let response = match suppressed(self.load(query, options.source).await, options.suppress)? {
            Some(response) => response,
            None => return Ok(None),
        };

        if response.load_type == LoadType::PlaylistLoaded {
            return Ok(Some(SearchResult::Playlist(Self::playlist(
                query,
                response,
                options.requester,
            ))));
        }

        let limit = options.limit.unwrap_or(usize::MAX);
        let tracks = response
            .tracks
            .into_iter()
            .take(limit)
            .map(|raw| Self::track(raw, options.requester))
            .collect();
        Ok(Some(SearchResult::Tracks(tracks)))
    }
}

fn suppressed<T>(result: Result<T>, suppress: bool) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if suppress && e.is_search_failure() => {
            tracing::debug!("SEARCH | Suppressed {}", e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
