//! Per-guild playback sessions
//!
//! A [`Session`] tracks voice credentials, the current track, a local
//! position estimate and the filter sink for one guild. Inbound pushes from
//! the node (`PLAYER_UPDATE`, `PLAYER_EVENT`) go through a per-session
//! mailbox drained by a single task, so updates for one guild apply in the
//! order they arrived on the socket.

use crate::error::{ObsidianError, Result};
use crate::events::PlayerEvent;
use crate::filters::{Equalizer, Filter, FilterKind, FilterSink, VolumeFilter};
use crate::node::{Node, NodeInner};
use crate::protocol::{
    FrameStats, GuildPayload, OpCode, PausePayload, PlayTrackPayload, PlayerUpdate, SeekPayload,
    VoiceUpdatePayload,
};
use crate::queue::{LoopType, PointerBasedQueue};
use crate::search::SearchOptions;
use crate::track::{Playable, Source, Track};
use crate::voice::{ConnectOptions, VoiceStateUpdate};
use serde_json::Value;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Which flavour of session a guild runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// Bare player, the caller drives playback
    Standard,
    /// Player with a built-in pointer queue that advances on its own
    Preset,
}

/// Inbound node push queued for a session
pub(crate) enum Inbound {
    Update(Value),
    Event(Value),
}

/// Overrides for [`Session::play`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayOptions {
    /// Start offset in milliseconds, ignored unless inside the track
    pub start_time: u64,
    /// End offset in milliseconds, ignored unless inside the track
    pub end_time: u64,
    /// Do nothing if a track is already playing
    pub no_replace: bool,
}

#[derive(Debug, Default)]
struct SessionState {
    channel_id: Option<u64>,
    connect_options: ConnectOptions,
    session_id: Option<String>,
    server_update: Option<Value>,
    current: Option<Track>,
    current_track_id: Option<String>,
    paused: bool,
    last_position: f64,
    last_update: Option<Instant>,
    frames: FrameStats,
}

impl SessionState {
    fn is_connected(&self) -> bool {
        self.channel_id.is_some()
    }

    fn is_playing(&self) -> bool {
        self.is_connected() && self.current.is_some()
    }

    fn clear_voice(&mut self) {
        self.channel_id = None;
        self.session_id = None;
        self.server_update = None;
    }

    fn position(&self, now: Instant) -> f64 {
        let Some(track) = self.current.as_ref().filter(|_| self.is_connected()) else {
            return 0.0;
        };
        let length = track.length() as f64;

        if self.paused {
            return self.last_position.clamp(0.0, length);
        }

        let elapsed = self
            .last_update
            .map_or(0.0, |at| now.saturating_duration_since(at).as_secs_f64() * 1000.0);
        let position = self.last_position.max(0.0) + elapsed;
        if position >= length {
            return 0.0;
        }
        position
    }
}

/// Point-in-time copy of a session's state
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub guild_id: u64,
    pub kind: SessionKind,
    pub channel_id: Option<u64>,
    pub session_id: Option<String>,
    pub has_server_update: bool,
    pub current: Option<Track>,
    pub current_track_id: Option<String>,
    pub paused: bool,
    pub connected: bool,
    pub playing: bool,
    /// Estimated position in milliseconds
    pub position: f64,
    pub frames: FrameStats,
}

struct PresetState {
    queue: Mutex<PointerBasedQueue>,
    idle_timeout: Duration,
    idle_task: Mutex<Option<JoinHandle<()>>>,
}

/// Playback state for one guild on one node
pub struct Session {
    guild_id: u64,
    kind: SessionKind,
    identifier: String,
    node: Weak<NodeInner>,
    state: Mutex<SessionState>,
    filters: tokio::sync::Mutex<FilterSink>,
    mailbox: mpsc::UnboundedSender<Inbound>,
    preset: Option<PresetState>,
}

impl Session {
    /// Create a session and start its inbound task
    ///
    /// Must be called from within a Tokio runtime.
    pub(crate) fn spawn(
        node: Weak<NodeInner>,
        identifier: String,
        guild_id: u64,
        kind: SessionKind,
        idle_timeout: Duration,
    ) -> Arc<Self> {
        let (mailbox, rx) = mpsc::unbounded_channel();
        let preset = (kind == SessionKind::Preset).then(|| PresetState {
            queue: Mutex::new(PointerBasedQueue::new(None)),
            idle_timeout,
            idle_task: Mutex::new(None),
        });

        let session = Arc::new(Self {
            guild_id,
            kind,
            identifier,
            node,
            state: Mutex::new(SessionState::default()),
            filters: tokio::sync::Mutex::new(FilterSink::new()),
            mailbox,
            preset,
        });

        tokio::spawn(run_inbound(Arc::downgrade(&session), rx));
        session
    }

    pub fn guild_id(&self) -> u64 {
        self.guild_id
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    /// Owning node, `None` once it has been dropped
    pub fn node(&self) -> Option<Node> {
        self.node.upgrade().map(Node::from_inner)
    }

    fn require_node(&self) -> Result<Node> {
        self.node()
            .ok_or_else(|| ObsidianError::NotConnected(self.identifier.clone()))
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn is_playing(&self) -> bool {
        self.state().is_playing()
    }

    pub fn is_paused(&self) -> bool {
        self.state().paused
    }

    pub fn channel_id(&self) -> Option<u64> {
        self.state().channel_id
    }

    /// Track last passed to [`play`](Self::play)
    pub fn current(&self) -> Option<Track> {
        self.state().current.clone()
    }

    /// Track id last reported by the node
    pub fn current_track_id(&self) -> Option<String> {
        self.state().current_track_id.clone()
    }

    pub fn frames(&self) -> FrameStats {
        self.state().frames
    }

    /// Estimated position of the current track in milliseconds
    ///
    /// Zero when nothing plays or when the estimate ran past the end of the
    /// track.
    pub fn position(&self) -> f64 {
        self.state().position(Instant::now())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state();
        SessionSnapshot {
            guild_id: self.guild_id,
            kind: self.kind,
            channel_id: state.channel_id,
            session_id: state.session_id.clone(),
            has_server_update: state.server_update.is_some(),
            current: state.current.clone(),
            current_track_id: state.current_track_id.clone(),
            paused: state.paused,
            connected: state.is_connected(),
            playing: state.is_playing(),
            position: state.position(Instant::now()),
            frames: state.frames,
        }
    }

    pub async fn filters(&self) -> FilterSink {
        self.filters.lock().await.clone()
    }

    /// Volume in percent, 100 when no volume filter is set
    pub async fn volume(&self) -> u32 {
        self.filters
            .lock()
            .await
            .volume()
            .map_or(100, VolumeFilter::percent)
    }

    pub async fn equalizer(&self) -> Option<Equalizer> {
        self.filters.lock().await.equalizer().cloned()
    }

    pub(crate) fn push_inbound(&self, inbound: Inbound) {
        if self.mailbox.send(inbound).is_err() {
            tracing::warn!("PLAYER | {} inbound task is gone, dropping payload", self.guild_id);
        }
    }

    /// Join a voice channel through the node's voice gateway
    pub async fn connect(&self, channel_id: u64, options: ConnectOptions) -> Result<()> {
        let node = self.require_node()?;
        {
            let mut state = self.state();
            state.channel_id = Some(channel_id);
            state.connect_options = options;
        }

        if let Err(e) = node.gateway().join(self.guild_id, channel_id, options).await {
            tracing::error!("PLAYER | {} failed to join {}: {}", self.guild_id, channel_id, e);
            self.state().clear_voice();
            return Err(voice_error(e));
        }

        tracing::info!("PLAYER | {} connected to {}", self.guild_id, channel_id);
        Ok(())
    }

    /// Feed a `VOICE_SERVER_UPDATE` payload from the chat gateway
    pub async fn on_voice_server_update(&self, data: Value) -> Result<()> {
        tracing::debug!("PLAYER | {} received VOICE_SERVER_UPDATE: {}", self.guild_id, data);
        self.state().server_update = Some(data);
        self.dispatch_voice_update().await
    }

    /// Feed a `VOICE_STATE_UPDATE` for the bot user from the chat gateway
    ///
    /// A cleared channel drops the channel, the session id and the server
    /// payload together.
    pub async fn on_voice_state_update(&self, update: VoiceStateUpdate) -> Result<()> {
        tracing::debug!("PLAYER | {} received VOICE_STATE_UPDATE: {:?}", self.guild_id, update);
        {
            let mut state = self.state();
            match update.channel_id {
                None => {
                    state.clear_voice();
                    return Ok(());
                }
                Some(channel_id) => {
                    state.channel_id = Some(channel_id);
                    state.session_id = update.session_id;
                }
            }
        }
        self.dispatch_voice_update().await
    }

    async fn dispatch_voice_update(&self) -> Result<()> {
        let payload = {
            let state = self.state();
            match (&state.session_id, &state.server_update) {
                (Some(session_id), Some(event)) => VoiceUpdatePayload {
                    session_id: session_id.clone(),
                    event: event.clone(),
                },
                _ => return Ok(()),
            }
        };
        self.require_node()?
            .send(OpCode::SubmitVoiceUpdate, &payload)
    }

    async fn resolve(&self, track: Track) -> Result<Track> {
        let node = self.require_node()?;
        let query = format!("{} {} audio", track.title(), track.author());
        let options = SearchOptions::default().source(Source::Youtube).suppress(true);

        let found = match node.search_track(&query, &options).await? {
            Some(Playable::Track(found)) => Some(found.id().to_string()),
            Some(Playable::Playlist(playlist)) => playlist.selected_track().map(|t| t.id().to_string()),
            None => None,
        };

        match found {
            Some(id) => Ok(track.with_id(id)),
            None => {
                tracing::warn!("PLAYER | {} could not resolve {:?}", self.guild_id, track.title());
                Err(ObsidianError::NoMatches(query))
            }
        }
    }

    /// Play a track, or the selected track of a playlist
    ///
    /// Unresolved tracks are looked up on YouTube first; if nothing matches
    /// the call fails with [`ObsidianError::NoMatches`] and nothing is sent.
    pub async fn play(&self, item: impl Into<Playable>, options: PlayOptions) -> Result<Track> {
        let track = match item.into() {
            Playable::Track(track) => track,
            Playable::Playlist(playlist) => playlist
                .selected_track()
                .cloned()
                .ok_or_else(|| ObsidianError::NoMatches(playlist.name().to_string()))?,
        };

        let track = if track.is_unresolved() {
            self.resolve(track).await?
        } else {
            track
        };

        let node = self.require_node()?;
        {
            let mut state = self.state();
            state.last_position = 0.0;
            state.last_update = None;
        }

        let length = track.length();
        let within = |value: u64| (value > 0 && value < length).then_some(value);
        let payload = PlayTrackPayload {
            guild_id: self.guild_id.to_string(),
            track: track.id().to_string(),
            start_time: within(options.start_time),
            end_time: within(options.end_time),
            no_replace: options.no_replace,
        };
        node.send(OpCode::PlayTrack, &payload)?;
        tracing::info!("PLAYER | {} is now playing {:?}", self.guild_id, track.title());

        self.state().current = Some(track.clone());
        Ok(track)
    }

    /// Stop the current track; a no-op when nothing plays unless forced
    pub async fn stop(&self, force: bool) -> Result<()> {
        if self.state().current.is_none() && !force {
            return Ok(());
        }

        self.require_node()?.send(
            OpCode::StopTrack,
            &GuildPayload {
                guild_id: self.guild_id.to_string(),
            },
        )?;
        tracing::info!("PLAYER | {} stopped the current track", self.guild_id);

        self.state().current = None;
        Ok(())
    }

    /// Set the paused state, toggling it when `pause` is `None`
    pub async fn set_pause(&self, pause: Option<bool>) -> Result<bool> {
        let pause = pause.unwrap_or_else(|| !self.state().paused);

        self.require_node()?.send(
            OpCode::PlayerPause,
            &PausePayload {
                guild_id: self.guild_id.to_string(),
                state: pause,
            },
        )?;
        tracing::info!("PLAYER | {} set its paused state to {}", self.guild_id, pause);

        self.state().paused = pause;
        Ok(pause)
    }

    /// Seek to `position` milliseconds; ignored outside the current track
    pub async fn set_position(&self, position: f64) -> Result<()> {
        let Some(length) = self.state().current.as_ref().map(Track::length) else {
            return Ok(());
        };
        if !(0.0..=length as f64).contains(&position) {
            return Ok(());
        }

        self.require_node()?.send(
            OpCode::PlayerSeek,
            &SeekPayload {
                guild_id: self.guild_id.to_string(),
                position: position.round() as u64,
            },
        )?;
        tracing::info!("PLAYER | {} set position to {}", self.guild_id, position);

        let mut state = self.state();
        state.last_position = position;
        state.last_update = Some(Instant::now());
        Ok(())
    }

    /// Apply an edit to a copy of the sink, send it, then commit
    ///
    /// The sink lock is held across the send so concurrent edits serialize.
    async fn edit_filters<F>(&self, edit: F) -> Result<()>
    where
        F: FnOnce(&mut FilterSink) -> Result<()>,
    {
        let mut sink = self.filters.lock().await;
        let mut next = sink.clone();
        edit(&mut next)?;

        self.require_node()?
            .send(OpCode::PlayerFilters, &next.to_payload(self.guild_id))?;
        tracing::info!("PLAYER | {} updated filters", self.guild_id);

        *sink = next;
        Ok(())
    }

    /// Set the volume in percent, 0 to 500
    pub async fn set_volume(&self, percent: u32) -> Result<()> {
        let volume = VolumeFilter::from_percent(percent)?;
        self.edit_filters(|sink| {
            sink.add(volume);
            Ok(())
        })
        .await
    }

    pub async fn set_equalizer(&self, equalizer: Equalizer) -> Result<()> {
        self.edit_filters(|sink| {
            sink.add(equalizer);
            Ok(())
        })
        .await
    }

    pub async fn add_filter(&self, filter: impl Into<Filter>) -> Result<()> {
        let filter = filter.into();
        self.edit_filters(|sink| {
            sink.add(filter);
            Ok(())
        })
        .await
    }

    pub async fn remove_filter(&self, kind: FilterKind) -> Result<()> {
        self.edit_filters(|sink| {
            sink.remove(kind);
            Ok(())
        })
        .await
    }

    pub async fn reset_filters(&self) -> Result<()> {
        self.edit_filters(|sink| {
            sink.reset();
            Ok(())
        })
        .await
    }

    /// Replace the whole sink
    pub async fn set_filters(&self, filters: FilterSink) -> Result<()> {
        self.edit_filters(|sink| {
            *sink = filters;
            Ok(())
        })
        .await
    }

    /// Apply an authoritative `PLAYER_UPDATE`, overwriting local estimates
    pub fn update_state(&self, update: &PlayerUpdate) {
        tracing::debug!("PLAYER | {} updating state: {:?}", self.guild_id, update);

        let mut state = self.state();
        state.last_update = Some(Instant::now());
        state.frames = update.frames;
        state.current_track_id = update.current_track.track.clone();
        state.last_position = update.current_track.position;
        state.paused = update.current_track.paused;
    }

    /// Parse a `PLAYER_EVENT` and fan it out to node subscribers
    ///
    /// Unknown event types are logged and dropped. Preset sessions advance
    /// their queue on track end and track stuck.
    pub async fn dispatch_event(self: &Arc<Self>, data: &Value) {
        let event = match PlayerEvent::parse(data) {
            Ok(Some(event)) => event,
            Ok(None) => {
                tracing::warn!("PLAYER | {} received unknown event type: {}", self.guild_id, data);
                return;
            }
            Err(e) => {
                tracing::warn!("PLAYER | {} received malformed event {}: {}", self.guild_id, data, e);
                return;
            }
        };

        tracing::info!("PLAYER | {} dispatching {}", self.guild_id, event.kind().as_str());
        if let Some(node) = self.node() {
            node.dispatch_player_event(self, &event);
        }

        if self.preset.is_none() {
            return;
        }
        let advance = match &event {
            PlayerEvent::TrackEnd(end) => end.reason.may_start_next(),
            PlayerEvent::TrackStuck(_) => true,
            _ => false,
        };
        if advance {
            if let Err(e) = self.advance(false).await {
                tracing::error!("PLAYER | {} failed to play the next track: {}", self.guild_id, e);
            }
        }
    }

    /// Leave voice, tell the node to stop and destroy the player, then
    /// unregister the session
    ///
    /// The session is unregistered and its voice state cleared even when a
    /// step fails; the first failure is returned afterwards.
    pub async fn disconnect(&self, force: bool) -> Result<()> {
        if !self.is_connected() && !force {
            return Ok(());
        }

        let mut result = Ok(());

        if let Some(node) = self.node() {
            if let Err(e) = node.gateway().leave(self.guild_id).await {
                tracing::warn!("PLAYER | {} failed to leave voice: {}", self.guild_id, e);
                result = Err(voice_error(e));
            }

            let destroyed = self.stop(force).await.and_then(|()| {
                node.send(
                    OpCode::PlayerDestroy,
                    &GuildPayload {
                        guild_id: self.guild_id.to_string(),
                    },
                )
            });
            if let Err(e) = destroyed {
                tracing::warn!("PLAYER | {} failed to destroy the remote player: {}", self.guild_id, e);
                result = result.and(Err(e));
            }

            node.remove_session(self.guild_id);
        }

        self.state().clear_voice();
        tracing::info!("PLAYER | {} was disconnected", self.guild_id);
        result
    }

    /// Disconnect and unregister; safe to call more than once
    pub async fn destroy(&self, force: bool) -> Result<()> {
        self.cancel_idle_destroy();
        let result = self.disconnect(force).await;
        if let Some(node) = self.node() {
            node.remove_session(self.guild_id);
        }
        tracing::info!("PLAYER | {} has been destroyed", self.guild_id);
        result
    }

    /// Move to another voice channel, pausing during the move
    pub async fn move_to(&self, channel_id: u64) -> Result<()> {
        let options = {
            let state = self.state();
            if !state.is_connected() {
                return Err(ObsidianError::Voice("No connection to move".to_string()));
            }
            state.connect_options
        };
        let node = self.require_node()?;

        self.set_pause(Some(true)).await?;
        node.gateway()
            .join(self.guild_id, channel_id, options)
            .await
            .map_err(voice_error)?;
        tracing::info!("PLAYER | {} moved to {}", self.guild_id, channel_id);

        self.state().channel_id = Some(channel_id);
        self.set_pause(Some(false)).await?;
        Ok(())
    }

    fn preset_state(&self) -> Result<&PresetState> {
        self.preset
            .as_ref()
            .ok_or(ObsidianError::SessionKindMismatch(self.guild_id))
    }

    fn queue(&self) -> Result<MutexGuard<'_, PointerBasedQueue>> {
        Ok(self
            .preset_state()?
            .queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    async fn advance(self: &Arc<Self>, skip: bool) -> Result<Option<Track>> {
        let next = {
            let mut queue = self.queue()?;
            if skip {
                queue.skip()
            } else {
                queue.get()
            }
        };

        match next {
            Some(track) => {
                self.cancel_idle_destroy();
                self.play(track.clone(), PlayOptions::default()).await?;
                Ok(Some(track))
            }
            None => {
                self.schedule_idle_destroy();
                Ok(None)
            }
        }
    }

    fn schedule_idle_destroy(self: &Arc<Self>) {
        let Some(preset) = &self.preset else {
            return;
        };
        let mut idle = preset
            .idle_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if idle.is_some() {
            return;
        }

        let timeout = preset.idle_timeout;
        let session = Arc::downgrade(self);
        tracing::debug!("PLAYER | {} queue ran dry, destroying in {:?}", self.guild_id, timeout);

        *idle = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let Some(session) = session.upgrade() else {
                return;
            };
            // detach before destroy() so it does not abort this task
            if let Some(preset) = &session.preset {
                preset
                    .idle_task
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .take();
            }
            tracing::info!("PLAYER | {} idled out", session.guild_id);
            if let Err(e) = session.destroy(false).await {
                tracing::warn!("PLAYER | {} idle destroy failed: {}", session.guild_id, e);
            }
        }));
    }

    fn cancel_idle_destroy(&self) {
        if let Some(preset) = &self.preset {
            let task = preset
                .idle_task
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .take();
            if let Some(task) = task {
                task.abort();
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("guild_id", &self.guild_id)
            .field("kind", &self.kind)
            .field("node", &self.identifier)
            .finish_non_exhaustive()
    }
}

fn voice_error(error: ObsidianError) -> ObsidianError {
    match error {
        ObsidianError::Voice(_) => error,
        other => ObsidianError::Voice(other.to_string()),
    }
}

async fn run_inbound(session: Weak<Session>, mut rx: mpsc::UnboundedReceiver<Inbound>) {
    while let Some(inbound) = rx.recv().await {
        let Some(session) = session.upgrade() else {
            break;
        };
        match inbound {
            Inbound::Update(data) => match serde_json::from_value::<PlayerUpdate>(data) {
                Ok(update) => session.update_state(&update),
                Err(e) => tracing::warn!("PLAYER | {} received malformed update: {}", session.guild_id, e),
            },
            Inbound::Event(data) => session.dispatch_event(&data).await,
        }
    }
}

/// Session with a built-in queue
///
/// Dereferences to [`Session`]. Track end and track stuck events play the
/// next queued track; when the queue runs dry the session destroys itself
/// after the node's idle timeout unless something is enqueued first.
#[derive(Debug, Clone)]
pub struct PresetSession {
    session: Arc<Session>,
}

impl PresetSession {
    pub(crate) fn new(session: Arc<Session>) -> Result<Self> {
        session.preset_state()?;
        Ok(Self { session })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Run `f` against the queue
    pub fn with_queue<R>(&self, f: impl FnOnce(&mut PointerBasedQueue) -> R) -> Result<R> {
        let mut queue = self.session.queue()?;
        Ok(f(&mut queue))
    }

    /// Add a track or a whole playlist, cancelling a pending idle destroy
    pub fn enqueue(&self, item: impl Into<Playable>) -> Result<()> {
        self.session.cancel_idle_destroy();
        self.session.queue()?.enqueue(item)
    }

    pub fn set_loop_type(&self, loop_type: LoopType) -> Result<()> {
        self.session.queue()?.set_loop_type(loop_type);
        Ok(())
    }

    pub fn loop_type(&self) -> Result<LoopType> {
        Ok(self.session.queue()?.loop_type())
    }

    /// Track under the queue pointer
    pub fn now_playing(&self) -> Result<Option<Track>> {
        Ok(self.session.queue()?.current().cloned())
    }

    pub fn index(&self) -> Result<Option<usize>> {
        Ok(self.session.queue()?.pointer())
    }

    pub fn tracks(&self) -> Result<Vec<Track>> {
        Ok(self.session.queue()?.tracks().iter().cloned().collect())
    }

    pub fn upcoming(&self) -> Result<Vec<Track>> {
        Ok(self.session.queue()?.upcoming().cloned().collect())
    }

    pub fn remove(&self, index: usize) -> Result<Track> {
        self.session.queue()?.remove(index)
    }

    /// Drop every queued track and reset the pointer
    pub fn clear_queue(&self) -> Result<()> {
        self.session.queue()?.clear();
        Ok(())
    }

    /// Play the next track according to the loop type
    pub async fn do_next(&self) -> Result<Option<Track>> {
        self.session.advance(false).await
    }

    /// Play the next track regardless of the loop type
    pub async fn skip(&self) -> Result<Option<Track>> {
        self.session.advance(true).await
    }

    /// Move the pointer to `index` and play that track
    pub async fn jump(&self, index: usize) -> Result<Track> {
        let track = self.session.queue()?.jump(index)?.clone();
        self.session.cancel_idle_destroy();
        self.session.play(track, PlayOptions::default()).await
    }

    /// Whether an idle destroy is scheduled
    pub fn is_idle(&self) -> bool {
        self.session.preset.as_ref().is_some_and(|preset| {
            preset
                .idle_task
                .lock()
                .map(|task| task.is_some())
                .unwrap_or_default()
        })
    }
}

impl Deref for PresetSession {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.session
    }
}
