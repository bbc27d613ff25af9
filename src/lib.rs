//! Rust client library for the Obsidian audio node
//!
//! This library provides an async API for driving one or more Obsidian
//! nodes from a chat bot. It supports:
//!
//! - Authenticated WebSocket connections with automatic reconnect
//! - Per-guild playback sessions (play, stop, pause, seek, volume)
//! - Audio filters (equalizer, timescale, karaoke, vibrato and more)
//! - Track search and decoding over the node's REST API
//! - Spotify track and playlist lookup
//! - Loopable pointer-based queues and self-advancing preset sessions
//! - Typed player events through listeners or a broadcast channel
//!
//! # Quick Start
//!
//! ```no_run
//! use async_trait::async_trait;
//! use obsidian_client::{
//!     ConnectOptions, NodeConfig, NodeRegistry, PlayOptions, Result, SearchOptions,
//!     VoiceGateway,
//! };
//! use std::sync::Arc;
//!
//! struct Gateway;
//!
//! #[async_trait]
//! impl VoiceGateway for Gateway {
//!     async fn join(&self, _guild_id: u64, _channel_id: u64, _options: ConnectOptions) -> Result<()> {
//!         // send a voice state update through the chat gateway
//!         Ok(())
//!     }
//!
//!     async fn leave(&self, _guild_id: u64) -> Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let registry = NodeRegistry::new(Arc::new(Gateway));
//!     let node = registry
//!         .initiate(NodeConfig::new("127.0.0.1", 3030).with_password("youshallnotpass"))
//!         .await?;
//!
//!     let session = node.get_or_create_session(1234);
//!     session.connect(5678, ConnectOptions::default()).await?;
//!
//!     if let Some(found) = node.search_track("never gonna give you up", &SearchOptions::default()).await? {
//!         session.play(found, PlayOptions::default()).await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Voice
//!
//! The library does not talk to the chat platform itself. Joining and
//! leaving channels goes through a [`VoiceGateway`], and the resulting
//! voice-state and voice-server updates are handed back with
//! [`Session::on_voice_state_update`] and [`Session::on_voice_server_update`].
//! Once both halves are present the credentials are forwarded to the node.
//!
//! # Architecture
//!
//! - **Registry**: identifier-keyed set of nodes owned by the application
//! - **Node**: socket lifecycle, inbound routing, REST and search access
//! - **Session**: per-guild playback state and commands
//! - **Connection**: low-level WebSocket handshake and writer task
//! - **Protocol**: `{op, d}` envelopes and payloads

mod backoff;
mod config;
mod connection;
mod error;
mod events;
mod filters;
mod http;
mod node;
mod protocol;
mod queue;
mod registry;
mod search;
mod session;
mod spotify;
mod stats;
mod subscription;
mod track;
mod voice;

// Public exports
pub use backoff::ExponentialBackoff;
pub use config::{NodeConfig, SpotifyConfig, DEFAULT_IDENTIFIER};
pub use error::{ObsidianError, Result};
pub use events::{
    EventKind, EventListeners, ExceptionSeverity, ListenerId, PlayerEvent, TrackEndEvent,
    TrackEndReason, TrackException, TrackExceptionEvent, TrackStartEvent, TrackStuckEvent,
    WebsocketClosedEvent, WebsocketOpenEvent,
};
pub use filters::{
    ChannelMixFilter, DistortionFilter, Equalizer, Filter, FilterKind, FilterSink,
    FiltersPayload, KaraokeFilter, LowPassFilter, RotationFilter, TimescaleFilter,
    TremoloFilter, VibratoFilter, VolumeFilter, EQ_BANDS,
};
pub use http::HttpClient;
pub use node::{Node, NodeState};
pub use protocol::{CurrentTrack, FrameStats, OpCode, PlayerUpdate};
pub use queue::{LoopType, PointerBasedQueue, Queue};
pub use registry::NodeRegistry;
pub use search::{LoadException, LoadResponse, LoadType, SearchOptions, SearchResult, TrackSearcher};
pub use session::{PlayOptions, PresetSession, Session, SessionKind, SessionSnapshot};
pub use spotify::{
    SpotifyAlbum, SpotifyArtist, SpotifyClient, SpotifyExternalUrls, SpotifyImage, SpotifyLink,
    SpotifyTrack,
};
pub use stats::{CpuStats, MemoryStats, MemoryUsage, PlayerStats, Stats, ThreadStats};
pub use subscription::{EventReceiver, NodeEvent};
pub use track::{Playable, Playlist, PlaylistInfo, RawTrack, Source, Track, TrackInfo, SPOTIFY_MARKER};
pub use voice::{ConnectOptions, VoiceGateway, VoiceStateUpdate};
