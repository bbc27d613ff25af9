use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Id marker carried by Spotify-sourced tracks until they are resolved
/// against a playable source
pub const SPOTIFY_MARKER: &str = "spotify";

/// Where a track comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Youtube,
    YoutubeMusic,
    Soundcloud,
    Spotify,
    Yarn,
    Bandcamp,
    Twitch,
    Vimeo,
    Nico,
    Local,
    Http,
    #[serde(other)]
    Unknown,
}

/// Raw track info as returned by the node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackInfo {
    pub title: String,
    pub author: String,
    pub uri: String,
    pub identifier: String,
    /// Duration in milliseconds
    pub length: u64,
    #[serde(default)]
    pub position: u64,
    pub is_stream: bool,
    pub is_seekable: bool,
    pub source_name: Source,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

/// Track descriptor as it appears in `loadtracks` responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTrack {
    pub track: String,
    pub info: TrackInfo,
}

/// A playable track
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    id: String,
    title: String,
    author: String,
    uri: String,
    identifier: String,
    length: u64,
    is_stream: bool,
    is_seekable: bool,
    source: Source,
    thumbnail: Option<String>,
    requester: Option<u64>,
}

impl Track {
    /// Create a track from its backend id and info block
    pub fn new(id: impl Into<String>, info: TrackInfo) -> Self {
        Self {
            id: id.into(),
            title: info.title,
            author: info.author,
            uri: info.uri,
            identifier: info.identifier,
            length: info.length,
            is_stream: info.is_stream,
            is_seekable: info.is_seekable,
            source: info.source_name,
            thumbnail: info.thumbnail,
            requester: None,
        }
    }

    /// Create a track from a `loadtracks` entry
    pub fn from_raw(raw: RawTrack) -> Self {
        Self::new(raw.track, raw.info)
    }

    /// Descriptor of this track as the node would return it
    pub fn to_raw(&self) -> RawTrack {
        RawTrack {
            track: self.id.clone(),
            info: TrackInfo {
                title: self.title.clone(),
                author: self.author.clone(),
                uri: self.uri.clone(),
                identifier: self.identifier.clone(),
                length: self.length,
                position: 0,
                is_stream: self.is_stream,
                is_seekable: self.is_seekable,
                source_name: self.source,
                thumbnail: self.thumbnail.clone(),
            },
        }
    }

    /// Tag the track with the user who asked for it
    pub fn with_requester(mut self, requester: u64) -> Self {
        self.requester = Some(requester);
        self
    }

    /// Same track with a different backend id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Backend-issued base64 id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the track title
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Get the track author or uploader
    pub fn author(&self) -> &str {
        &self.author
    }

    /// Get the track URL
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Get the source-specific identifier, such as a YouTube video id
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Duration in milliseconds
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Whether this is a live stream without a fixed length
    pub fn is_stream(&self) -> bool {
        self.is_stream
    }

    /// Whether the node can seek within this track
    pub fn is_seekable(&self) -> bool {
        self.is_seekable
    }

    /// Get the source this track was loaded from
    pub fn source(&self) -> Source {
        self.source
    }

    /// Get the user who asked for this track
    pub fn requester(&self) -> Option<u64> {
        self.requester
    }

    /// Whether the id still has to be resolved before the node can play it
    pub fn is_unresolved(&self) -> bool {
        self.id.is_empty() || self.id == SPOTIFY_MARKER
    }

    /// Thumbnail URL, empty when the source has none
    pub fn thumbnail(&self) -> String {
        if self.source == Source::Youtube {
            return format!("https://img.youtube.com/vi/{}/hqdefault.jpg", self.identifier);
        }
        self.thumbnail.clone().unwrap_or_default()
    }
}

/// Playlist info block of a `PLAYLIST_LOADED` response
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistInfo {
    pub name: String,
    #[serde(default)]
    pub selected_track: i64,
}

/// A playlist of tracks, materialized on first access
#[derive(Debug, Clone)]
pub struct Playlist {
    name: String,
    uri: Option<String>,
    selected: i64,
    raw: Vec<RawTrack>,
    requester: Option<u64>,
    tracks: OnceLock<Vec<Track>>,
}

impl Playlist {
    /// Create a playlist from a `PLAYLIST_LOADED` response
    ///
    /// Tracks are built lazily on the first call to [`tracks`](Self::tracks).
    pub fn new(info: PlaylistInfo, raw: Vec<RawTrack>) -> Self {
        Self {
            name: info.name,
            uri: None,
            selected: info.selected_track,
            raw,
            requester: None,
            tracks: OnceLock::new(),
        }
    }

    /// Playlist over tracks that did not come from a `loadtracks` response
    pub fn from_tracks(name: impl Into<String>, tracks: &[Track]) -> Self {
        let info = PlaylistInfo {
            name: name.into(),
            selected_track: 0,
        };
        Self::new(info, tracks.iter().map(Track::to_raw).collect())
    }

    /// Set the link the playlist was loaded from
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Tag every track with the user who asked for the playlist
    pub fn with_requester(mut self, requester: u64) -> Self {
        self.requester = Some(requester);
        self.tracks = OnceLock::new();
        self
    }

    /// Get the playlist name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the link the playlist was loaded from
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    /// Get the user who asked for the playlist
    pub fn requester(&self) -> Option<u64> {
        self.requester
    }

    /// Get the number of tracks
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Get the tracks, building them on first access
    pub fn tracks(&self) -> &[Track] {
        self.tracks.get_or_init(|| {
            self.raw
                .iter()
                .cloned()
                .map(|raw| {
                    let track = Track::from_raw(raw);
                    match self.requester {
                        Some(requester) => track.with_requester(requester),
                        None => track,
                    }
                })
                .collect()
        })
    }

    /// Track selected by the node, falling back to the first track when the
    /// index is invalid
    pub fn selected_track(&self) -> Option<&Track> {
        let tracks = self.tracks();
        usize::try_from(self.selected)
            .ok()
            .and_then(|index| tracks.get(index))
            .or_else(|| tracks.first())
    }

    /// Source of the first track, YouTube for an empty playlist
    pub fn source(&self) -> Source {
        self.tracks().first().map_or(Source::Youtube, Track::source)
    }
}

/// Anything a session can play
#[derive(Debug, Clone)]
pub enum Playable {
    Track(Track),
    Playlist(Playlist),
}

impl From<Track> for Playable {
    fn from(track: Track) -> Self {
        Playable::Track(track)
    }
}

impl From<Playlist> for Playable {
    fn from(playlist: Playlist) -> Self {
        Playable::Playlist(playlist)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn info(title: &str, length: u64) -> TrackInfo {
        TrackInfo {
            title: title.to_string(),
            author: "artist".to_string(),
            uri: format!("https://example.com/{title}"),
            identifier: title.to_string(),
            length,
            position: 0,
            is_stream: false,
            is_seekable: true,
            source_name: Source::Soundcloud,
            thumbnail: None,
        }
    }

    pub fn track(title: &str) -> Track {
        Track::new(format!("id-{title}"), info(title, 10_000))
    }

    pub fn raw(title: &str) -> RawTrack {
        RawTrack {
            track: format!("id-{title}"),
            info: info(title, 10_000),
        }
    }
}
