use crate::backoff::ExponentialBackoff;
use crate::config::NodeConfig;
use crate::connection::{Connection, Inbound as SocketInbound};
use crate::error::{ObsidianError, Result};
use crate::events::{EventKind, EventListeners, ListenerId, PlayerEvent};
use crate::http::HttpClient;
use crate::protocol::{payload_guild_id, Envelope, OpCode, RawEnvelope};
use crate::registry::RegistryInner;
use crate::search::{SearchOptions, SearchResult, TrackSearcher};
use crate::session::{Inbound, PresetSession, Session, SessionKind};
use crate::spotify::{SpotifyClient, SpotifyLink};
use crate::stats::Stats;
use crate::subscription::{EventReceiver, NodeEvent};
use crate::track::{Playable, RawTrack, TrackInfo};
use crate::voice::VoiceGateway;
use futures_util::StreamExt;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

const EVENT_CAPACITY: usize = 100;

/// Lifecycle of a node connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Disconnected,
    Connecting,
    Connected,
    /// Terminal; the node has been removed from its registry
    Destroyed,
}

pub(crate) struct NodeInner {
    config: NodeConfig,
    http: HttpClient,
    searcher: TrackSearcher,
    spotify: Option<SpotifyClient>,
    gateway: Arc<dyn VoiceGateway>,
    connection: Mutex<Option<Connection>>,
    state: Mutex<NodeState>,
    stats: Mutex<Option<Stats>>,
    sessions: Mutex<HashMap<u64, Arc<Session>>>,
    receive_task: Mutex<Option<JoinHandle<()>>>,
    events_tx: broadcast::Sender<NodeEvent>,
    listeners: EventListeners<Arc<Session>>,
    registry: Mutex<Weak<RegistryInner>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Connection to one Obsidian node
///
/// Cloning is cheap; every clone refers to the same socket, session map and
/// event channel.
///
/// # Example
///
/// ```no_run
/// use obsidian_client::{ConnectOptions, Node, NodeConfig, Result, VoiceGateway};
/// use std::sync::Arc;
///
/// # async fn run(gateway: Arc<dyn VoiceGateway>) -> Result<()> {
/// let node = Node::new(NodeConfig::new("127.0.0.1", 3030).with_password("secret"), gateway)?;
/// node.connect().await?;
///
/// let session = node.get_or_create_session(1234);
/// session.connect(5678, ConnectOptions::default()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

impl Node {
    /// Build a node from its configuration; nothing is connected yet
    pub fn new(config: NodeConfig, gateway: Arc<dyn VoiceGateway>) -> Result<Self> {
        let http = HttpClient::new(&config)?;
        Self::with_http(config, gateway, http)
    }

    /// Build a node whose REST calls go to `http` instead of the configured host
    pub fn with_http(config: NodeConfig, gateway: Arc<dyn VoiceGateway>, http: HttpClient) -> Result<Self> {
        config.validate()?;
        let searcher = TrackSearcher::new(http.clone())?;
        let spotify = config.spotify.as_ref().map(SpotifyClient::new).transpose()?;
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            inner: Arc::new(NodeInner {
                config,
                http,
                searcher,
                spotify,
                gateway,
                connection: Mutex::new(None),
                state: Mutex::new(NodeState::Disconnected),
                stats: Mutex::new(None),
                sessions: Mutex::new(HashMap::new()),
                receive_task: Mutex::new(None),
                events_tx,
                listeners: EventListeners::new(),
                registry: Mutex::new(Weak::new()),
            }),
        })
    }

    pub(crate) fn from_inner(inner: Arc<NodeInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn attach_registry(&self, registry: Weak<RegistryInner>) {
        *lock(&self.inner.registry) = registry;
    }

    /// Whether both handles refer to the same node
    pub fn same_node(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn identifier(&self) -> &str {
        &self.inner.config.identifier
    }

    pub fn config(&self) -> &NodeConfig {
        &self.inner.config
    }

    pub fn state(&self) -> NodeState {
        *lock(&self.inner.state)
    }

    /// Whether the socket is up and the node is usable
    pub fn is_connected(&self) -> bool {
        self.state() == NodeState::Connected
            && lock(&self.inner.connection)
                .as_ref()
                .is_some_and(Connection::is_open)
    }

    pub(crate) fn gateway(&self) -> &Arc<dyn VoiceGateway> {
        &self.inner.gateway
    }

    /// REST client for the node's HTTP API
    pub fn http(&self) -> &HttpClient {
        &self.inner.http
    }

    /// Spotify client, when credentials were configured
    pub fn spotify(&self) -> Option<&SpotifyClient> {
        self.inner.spotify.as_ref()
    }

    /// Last `STATS` snapshot pushed by the node
    pub fn stats(&self) -> Option<Stats> {
        lock(&self.inner.stats).clone()
    }

    /// Open the socket and start the receive loop
    ///
    /// Calling this on a connected node does nothing. While another attempt
    /// (including a background reconnect) is in flight this fails with
    /// [`ObsidianError::AlreadyConnecting`]; watch for
    /// [`NodeEvent::Ready`] instead. A destroyed node cannot be reconnected.
    pub async fn connect(&self) -> Result<()> {
        {
            let mut state = lock(&self.inner.state);
            match *state {
                NodeState::Destroyed => {
                    return Err(ObsidianError::NotConnected(self.identifier().to_string()))
                }
                NodeState::Connected => return Ok(()),
                NodeState::Connecting => {
                    return Err(ObsidianError::AlreadyConnecting(self.identifier().to_string()))
                }
                NodeState::Disconnected => *state = NodeState::Connecting,
            }
        }

        let (connection, inbound) = match Connection::connect(&self.inner.config).await {
            Ok(pair) => pair,
            Err(e) => {
                let mut state = lock(&self.inner.state);
                if *state == NodeState::Connecting {
                    *state = NodeState::Disconnected;
                }
                return Err(e);
            }
        };

        if !self.inner.install(connection) {
            return Err(ObsidianError::NotConnected(self.identifier().to_string()));
        }

        let handle = tokio::spawn(run_receive_loop(Arc::downgrade(&self.inner), inbound));
        if let Some(old) = lock(&self.inner.receive_task).replace(handle) {
            old.abort();
        }
        Ok(())
    }

    /// Send one `{op, d}` frame
    pub fn send<T: Serialize>(&self, op: OpCode, payload: &T) -> Result<()> {
        let text = serde_json::to_string(&Envelope { op, d: payload })?;
        let sent = lock(&self.inner.connection)
            .as_ref()
            .is_some_and(|connection| connection.send(text.clone()));

        if !sent {
            tracing::warn!("NODE {:?} | Dropping {:?}, not connected", self.identifier(), op);
            return Err(ObsidianError::NotConnected(self.identifier().to_string()));
        }

        tracing::debug!("NODE {:?} | Sent {}", self.identifier(), text);
        Ok(())
    }

    /// Stop the receive loop, tear down every session and close the socket
    ///
    /// Safe to call more than once.
    pub async fn disconnect(&self, force: bool) -> Result<()> {
        if let Some(task) = lock(&self.inner.receive_task).take() {
            task.abort();
        }

        let sessions: Vec<Arc<Session>> = lock(&self.inner.sessions).values().cloned().collect();
        for session in sessions {
            if let Err(e) = session.destroy(force).await {
                tracing::warn!(
                    "NODE {:?} | Failed to destroy session {}: {}",
                    self.identifier(),
                    session.guild_id(),
                    e
                );
            }
        }

        let connection = lock(&self.inner.connection).take();
        let was_connected = {
            let mut state = lock(&self.inner.state);
            let was = *state == NodeState::Connected;
            if *state != NodeState::Destroyed {
                *state = NodeState::Disconnected;
            }
            was
        };

        if let Some(connection) = connection {
            connection.close();
        }

        if was_connected {
            tracing::info!("NODE {:?} | Disconnected", self.identifier());
            self.inner.emit(NodeEvent::Disconnected {
                identifier: self.identifier().to_string(),
            });
        }
        Ok(())
    }

    /// Disconnect and drop out of the registry for good
    pub async fn destroy(&self, force: bool) -> Result<()> {
        self.disconnect(force).await?;
        *lock(&self.inner.state) = NodeState::Destroyed;

        let registry = lock(&self.inner.registry).upgrade();
        if let Some(registry) = registry {
            registry.remove_node(self);
        }
        tracing::info!("NODE {:?} | Destroyed", self.identifier());
        Ok(())
    }

    pub fn get_session(&self, guild_id: u64) -> Option<Arc<Session>> {
        lock(&self.inner.sessions).get(&guild_id).cloned()
    }

    /// Session for `guild_id`, created as a standard session if missing
    ///
    /// An existing session is returned as is, whatever its kind. Must be
    /// called from within a Tokio runtime.
    pub fn get_or_create_session(&self, guild_id: u64) -> Arc<Session> {
        self.inner.session(guild_id, SessionKind::Standard)
    }

    /// Preset session for `guild_id`, created if missing
    ///
    /// Fails with [`ObsidianError::SessionKindMismatch`] if the guild
    /// already runs a standard session.
    pub fn get_or_create_preset(&self, guild_id: u64) -> Result<PresetSession> {
        PresetSession::new(self.inner.session(guild_id, SessionKind::Preset))
    }

    /// Unregister a session without tearing it down
    pub fn remove_session(&self, guild_id: u64) -> Option<Arc<Session>> {
        lock(&self.inner.sessions).remove(&guild_id)
    }

    /// Destroy the session for `guild_id`, returning whether one existed
    pub async fn destroy_session(&self, guild_id: u64, force: bool) -> Result<bool> {
        match self.get_session(guild_id) {
            Some(session) => {
                session.destroy(force).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn sessions(&self) -> Vec<Arc<Session>> {
        lock(&self.inner.sessions).values().cloned().collect()
    }

    async fn load_spotify(&self, query: &str, options: &SearchOptions) -> Result<Option<Playable>> {
        let (Some(spotify), Some(link)) = (&self.inner.spotify, SpotifyLink::parse(query)) else {
            return Ok(None);
        };
        tracing::info!("SEARCH | Loading {:?} from Spotify", link);

        Ok(Some(match (spotify.load(&link).await?, options.requester) {
            (Playable::Track(track), Some(requester)) => track.with_requester(requester).into(),
            (Playable::Playlist(playlist), Some(requester)) => playlist.with_requester(requester).into(),
            (playable, None) => playable,
        }))
    }

    /// First match for `query`, or a whole playlist for playlist links
    ///
    /// Spotify links are looked up through the Spotify client when one is
    /// configured; everything else goes to the node's `loadtracks`.
    pub async fn search_track(&self, query: &str, options: &SearchOptions) -> Result<Option<Playable>> {
        if let Some(found) = self.load_spotify(query, options).await? {
            return Ok(Some(found));
        }
        self.inner.searcher.search_track(query, options).await
    }

    pub async fn search_tracks(&self, query: &str, options: &SearchOptions) -> Result<Option<SearchResult>> {
        match self.load_spotify(query, options).await? {
            Some(Playable::Track(track)) => Ok(Some(SearchResult::Tracks(vec![track]))),
            Some(Playable::Playlist(playlist)) => Ok(Some(SearchResult::Playlist(playlist))),
            None => self.inner.searcher.search_tracks(query, options).await,
        }
    }

    pub async fn decode_track(&self, track: &str) -> Result<TrackInfo> {
        self.inner.http.decode_track(track).await
    }

    pub async fn decode_tracks(&self, tracks: &[String]) -> Result<Vec<RawTrack>> {
        self.inner.http.decode_tracks(tracks).await
    }

    /// Receive lifecycle and player notifications
    pub fn subscribe_events(&self) -> EventReceiver {
        EventReceiver::new(self.inner.events_tx.subscribe())
    }

    /// Register a callback for one kind of player event on any session
    pub fn subscribe<F, Fut>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(Arc<Session>, PlayerEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.listeners.subscribe(kind, callback)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.listeners.unsubscribe(id)
    }

    pub(crate) fn dispatch_player_event(&self, session: &Arc<Session>, event: &PlayerEvent) {
        self.inner.emit(NodeEvent::Player {
            guild_id: session.guild_id(),
            event: event.clone(),
        });
        let scheduled = self.inner.listeners.dispatch(session, event);
        tracing::debug!(
            "NODE {:?} | {} scheduled for {} listeners",
            self.identifier(),
            event.kind().as_str(),
            scheduled
        );
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("identifier", &self.identifier())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl NodeInner {
    fn emit(&self, event: NodeEvent) {
        // no receivers is fine
        let _ = self.events_tx.send(event);
    }

    /// Store a fresh socket and mark the node connected
    ///
    /// Returns `false` (and closes the socket) if the node was disconnected
    /// or destroyed while the handshake was in flight.
    fn install(&self, connection: Connection) -> bool {
        let mut state = lock(&self.state);
        if *state != NodeState::Connecting {
            connection.close();
            return false;
        }
        *lock(&self.connection) = Some(connection);
        *state = NodeState::Connected;
        drop(state);

        tracing::info!("NODE {:?} | Connected", self.config.identifier);
        self.emit(NodeEvent::Ready {
            identifier: self.config.identifier.clone(),
        });
        true
    }

    fn session(self: &Arc<Self>, guild_id: u64, kind: SessionKind) -> Arc<Session> {
        lock(&self.sessions)
            .entry(guild_id)
            .or_insert_with(|| {
                tracing::info!("NODE {:?} | Creating {:?} session for {}", self.config.identifier, kind, guild_id);
                Session::spawn(
                    Arc::downgrade(self),
                    self.config.identifier.clone(),
                    guild_id,
                    kind,
                    self.config.idle_timeout,
                )
            })
            .clone()
    }

    fn handle_message(&self, text: &str) {
        tracing::debug!("NODE {:?} | Received {}", self.config.identifier, text);

        let envelope: RawEnvelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!("NODE {:?} | Unparseable message: {}", self.config.identifier, e);
                return;
            }
        };

        let Some(op) = OpCode::from_code(envelope.op) else {
            tracing::warn!("NODE {:?} | Unknown op code {}", self.config.identifier, envelope.op);
            return;
        };

        match op {
            OpCode::Stats => match serde_json::from_value::<Stats>(envelope.d) {
                Ok(stats) => *lock(&self.stats) = Some(stats),
                Err(e) => tracing::warn!("NODE {:?} | Malformed stats: {}", self.config.identifier, e),
            },
            OpCode::PlayerUpdate | OpCode::PlayerEvent => {
                let Some(guild_id) = payload_guild_id(&envelope.d) else {
                    tracing::warn!("NODE {:?} | {:?} without guild_id", self.config.identifier, op);
                    return;
                };
                let session = lock(&self.sessions).get(&guild_id).cloned();
                let Some(session) = session else {
                    tracing::debug!("NODE {:?} | No session for {}, dropping {:?}", self.config.identifier, guild_id, op);
                    return;
                };
                session.push_inbound(if op == OpCode::PlayerUpdate {
                    Inbound::Update(envelope.d)
                } else {
                    Inbound::Event(envelope.d)
                });
            }
            other => {
                tracing::debug!("NODE {:?} | Ignoring inbound {:?}", self.config.identifier, other);
            }
        }
    }

    /// Forget the dead socket; returns whether a reconnect should follow
    fn on_socket_closed(&self) -> bool {
        lock(&self.connection).take();
        let mut state = lock(&self.state);
        if *state == NodeState::Connected {
            *state = NodeState::Disconnected;
            return true;
        }
        false
    }
}

async fn run_receive_loop(node: Weak<NodeInner>, mut inbound: SocketInbound) {
    loop {
        read_until_closed(&node, &mut inbound).await;

        let reconnect = match node.upgrade() {
            Some(inner) => inner.on_socket_closed(),
            None => false,
        };
        if !reconnect {
            return;
        }

        match reconnect_with_backoff(&node).await {
            Some(next) => inbound = next,
            None => return,
        }
    }
}

async fn read_until_closed(node: &Weak<NodeInner>, inbound: &mut SocketInbound) {
    while let Some(message) = inbound.next().await {
        let Some(inner) = node.upgrade() else {
            return;
        };
        match message {
            Ok(Message::Text(text)) => inner.handle_message(&text),
            Ok(Message::Close(frame)) => {
                tracing::warn!("NODE {:?} | Socket closed: {:?}", inner.config.identifier, frame);
                return;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!("NODE {:?} | Socket error: {}", inner.config.identifier, e);
                return;
            }
        }
    }
}

async fn reconnect_with_backoff(node: &Weak<NodeInner>) -> Option<SocketInbound> {
    let (base, max_attempts) = {
        let inner = node.upgrade()?;
        (inner.config.reconnect_backoff_base, inner.config.max_reconnect_attempts)
    };
    let mut backoff = ExponentialBackoff::new(base);
    let mut attempt = 0;

    loop {
        let inner = node.upgrade()?;
        if max_attempts.is_some_and(|max| attempt >= max) {
            tracing::error!("NODE {:?} | Giving up after {} reconnect attempts", inner.config.identifier, attempt);
            inner.emit(NodeEvent::ReconnectFailed { attempts: attempt });
            return None;
        }
        attempt += 1;

        let delay = backoff.next_delay();
        tracing::info!(
            "NODE {:?} | Reconnecting in {:?} (attempt {})",
            inner.config.identifier,
            delay,
            attempt
        );
        inner.emit(NodeEvent::Reconnecting { attempt, delay });
        drop(inner);

        tokio::time::sleep(delay).await;

        let inner = node.upgrade()?;
        {
            let mut state = lock(&inner.state);
            if *state != NodeState::Disconnected {
                return None;
            }
            *state = NodeState::Connecting;
        }

        match Connection::connect(&inner.config).await {
            Ok((connection, inbound)) => {
                if inner.install(connection) {
                    return Some(inbound);
                }
                return None;
            }
            Err(e) => {
                tracing::warn!("NODE {:?} | Reconnect attempt {} failed: {}", inner.config.identifier, attempt, e);
                let mut state = lock(&inner.state);
                if *state == NodeState::Connecting {
                    *state = NodeState::Disconnected;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::testing::RecordingGateway;
    use serde_json::json;

    fn node() -> Node {
        Node::new(NodeConfig::default(), Arc::new(RecordingGateway::default())).unwrap()
    }

    #[tokio::test]
    async fn send_without_socket_is_not_connected() {
        let node = node();
        let err = node
            .send(OpCode::StopTrack, &json!({"guild_id": "1"}))
            .unwrap_err();
        assert!(matches!(err, ObsidianError::NotConnected(id) if id == "MAIN"));
        assert!(!node.is_connected());
    }

    #[tokio::test]
    async fn stats_are_replaced_wholesale() {
        let node = node();
        node.inner
            .handle_message(r#"{"op":1,"d":{"players":{"active":2,"total":3}}}"#);
        assert_eq!(node.stats().unwrap().players.active, 2);

        node.inner
            .handle_message(r#"{"op":1,"d":{"cpu":{"cores":8}}}"#);
        let stats = node.stats().unwrap();
        assert_eq!(stats.players.active, 0);
        assert_eq!(stats.cpu.cores, 8);
    }

    #[tokio::test]
    async fn unknown_ops_and_garbage_are_skipped() {
        let node = node();
        node.inner.handle_message(r#"{"op":99,"d":{}}"#);
        node.inner.handle_message("not json");
        node.inner
            .handle_message(r#"{"op":5,"d":{"guild_id":"42","current_track":{"track":"x"}}}"#);
        assert!(node.stats().is_none());
        assert!(node.sessions().is_empty());
    }

    #[tokio::test]
    async fn player_update_is_routed_to_session() {
        let node = node();
        let session = node.get_or_create_session(42);
        node.inner.handle_message(
            r#"{"op":5,"d":{"guild_id":"42","current_track":{"track":"abc","position":1500,"paused":true}}}"#,
        );

        for _ in 0..100 {
            if session.current_track_id().is_some() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(session.current_track_id().as_deref(), Some("abc"));
        assert!(session.is_paused());
    }

    #[tokio::test]
    async fn session_kind_cannot_change() {
        let node = node();
        let standard = node.get_or_create_session(1);
        assert!(Arc::ptr_eq(&standard, &node.get_or_create_session(1)));
        assert!(matches!(
            node.get_or_create_preset(1),
            Err(ObsidianError::SessionKindMismatch(1))
        ));

        let preset = node.get_or_create_preset(2).unwrap();
        assert_eq!(node.get_or_create_session(2).kind(), SessionKind::Preset);
        assert_eq!(preset.guild_id(), 2);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let node = node();
        node.get_or_create_session(7);
        node.disconnect(false).await.unwrap();
        node.disconnect(true).await.unwrap();
        assert!(node.get_session(7).is_none());
        assert_eq!(node.state(), NodeState::Disconnected);
    }

    #[tokio::test]
    async fn connect_during_attempt_is_refused() {
        let node = node();
        *lock(&node.inner.state) = NodeState::Connecting;
        assert!(matches!(
            node.connect().await,
            Err(ObsidianError::AlreadyConnecting(id)) if id == "MAIN"
        ));
        assert_eq!(node.state(), NodeState::Connecting);
    }

    #[tokio::test]
    async fn destroyed_node_refuses_to_connect() {
        let node = node();
        node.destroy(false).await.unwrap();
        assert_eq!(node.state(), NodeState::Destroyed);
        assert!(matches!(node.connect().await, Err(ObsidianError::NotConnected(_))));
    }

    #[tokio::test]
    async fn listeners_receive_events_with_session() {
        let node = node();
        let session = node.get_or_create_session(9);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        node.subscribe(EventKind::TrackStart, move |session, event| {
            let tx = tx.clone();
            async move {
                let _ = tx.send((session.guild_id(), event.kind()));
            }
        });
        let mut events = node.subscribe_events();

        session
            .dispatch_event(&json!({"type": "TRACK_START", "guild_id": "9", "track": "abc"}))
            .await;

        assert_eq!(rx.recv().await, Some((9, EventKind::TrackStart)));
        assert!(matches!(
            events.recv().await,
            Ok(NodeEvent::Player { guild_id: 9, .. })
        ));
    }
}
