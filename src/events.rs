//! Typed player events and the per-kind listener registry

use crate::protocol::guild_id;
use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// Player event kinds pushed by the node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    TrackStart,
    TrackEnd,
    TrackStuck,
    TrackException,
    WebsocketOpen,
    WebsocketClosed,
}

impl EventKind {
    /// Map a wire type string, case-insensitively
    ///
    /// `WEBSOCKET_READY` is an alias of `WEBSOCKET_OPEN`.
    pub fn from_type(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "TRACK_START" => Some(EventKind::TrackStart),
            "TRACK_END" => Some(EventKind::TrackEnd),
            "TRACK_STUCK" => Some(EventKind::TrackStuck),
            "TRACK_EXCEPTION" => Some(EventKind::TrackException),
            "WEBSOCKET_OPEN" | "WEBSOCKET_READY" => Some(EventKind::WebsocketOpen),
            "WEBSOCKET_CLOSED" => Some(EventKind::WebsocketClosed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::TrackStart => "TRACK_START",
            EventKind::TrackEnd => "TRACK_END",
            EventKind::TrackStuck => "TRACK_STUCK",
            EventKind::TrackException => "TRACK_EXCEPTION",
            EventKind::WebsocketOpen => "WEBSOCKET_OPEN",
            EventKind::WebsocketClosed => "WEBSOCKET_CLOSED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackEndReason {
    Stopped,
    Replaced,
    Cleanup,
    LoadFailed,
    Finished,
}

impl TrackEndReason {
    /// Whether the next queued track should start
    pub fn may_start_next(self) -> bool {
        matches!(self, TrackEndReason::Finished | TrackEndReason::LoadFailed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExceptionSeverity {
    Common,
    Suspicious,
    Fault,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrackStartEvent {
    #[serde(deserialize_with = "guild_id")]
    pub guild_id: u64,
    #[serde(rename = "track")]
    pub track_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrackEndEvent {
    #[serde(deserialize_with = "guild_id")]
    pub guild_id: u64,
    #[serde(rename = "track")]
    pub track_id: String,
    pub reason: TrackEndReason,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrackStuckEvent {
    #[serde(deserialize_with = "guild_id")]
    pub guild_id: u64,
    #[serde(rename = "track")]
    pub track_id: String,
    pub threshold_ms: u64,
}

impl TrackStuckEvent {
    pub fn threshold(&self) -> Duration {
        Duration::from_millis(self.threshold_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrackException {
    pub message: String,
    pub cause: String,
    pub severity: ExceptionSeverity,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrackExceptionEvent {
    #[serde(deserialize_with = "guild_id")]
    pub guild_id: u64,
    #[serde(rename = "track")]
    pub track_id: String,
    pub exception: TrackException,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebsocketOpenEvent {
    #[serde(deserialize_with = "guild_id")]
    pub guild_id: u64,
    pub target: String,
    pub ssrc: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebsocketClosedEvent {
    #[serde(deserialize_with = "guild_id")]
    pub guild_id: u64,
    pub code: i64,
    pub reason: String,
    pub by_remote: bool,
}

/// A parsed `PLAYER_EVENT` payload
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    TrackStart(TrackStartEvent),
    TrackEnd(TrackEndEvent),
    TrackStuck(TrackStuckEvent),
    TrackException(TrackExceptionEvent),
    WebsocketOpen(WebsocketOpenEvent),
    WebsocketClosed(WebsocketClosedEvent),
}

impl PlayerEvent {
    /// Parse a payload using its `type` (or `t`) discriminator
    ///
    /// Returns `Ok(None)` for unknown or missing type strings.
    pub fn parse(data: &Value) -> serde_json::Result<Option<Self>> {
        let name = data
            .get("type")
            .or_else(|| data.get("t"))
            .and_then(Value::as_str)
            .unwrap_or_default();

        let Some(kind) = EventKind::from_type(name) else {
            return Ok(None);
        };

        let data = data.clone();
        let event = match kind {
            EventKind::TrackStart => PlayerEvent::TrackStart(serde_json::from_value(data)?),
            EventKind::TrackEnd => PlayerEvent::TrackEnd(serde_json::from_value(data)?),
            EventKind::TrackStuck => PlayerEvent::TrackStuck(serde_json::from_value(data)?),
            EventKind::TrackException => PlayerEvent::TrackException(serde_json::from_value(data)?),
            EventKind::WebsocketOpen => PlayerEvent::WebsocketOpen(serde_json::from_value(data)?),
            EventKind::WebsocketClosed => PlayerEvent::WebsocketClosed(serde_json::from_value(data)?),
        };
        Ok(Some(event))
    }

    pub fn kind(&self) -> EventKind {
        match self {
            PlayerEvent::TrackStart(_) => EventKind::TrackStart,
            PlayerEvent::TrackEnd(_) => EventKind::TrackEnd,
            PlayerEvent::TrackStuck(_) => EventKind::TrackStuck,
            PlayerEvent::TrackException(_) => EventKind::TrackException,
            PlayerEvent::WebsocketOpen(_) => EventKind::WebsocketOpen,
            PlayerEvent::WebsocketClosed(_) => EventKind::WebsocketClosed,
        }
    }

    pub fn guild_id(&self) -> u64 {
        match self {
            PlayerEvent::TrackStart(e) => e.guild_id,
            PlayerEvent::TrackEnd(e) => e.guild_id,
            PlayerEvent::TrackStuck(e) => e.guild_id,
            PlayerEvent::TrackException(e) => e.guild_id,
            PlayerEvent::WebsocketOpen(e) => e.guild_id,
            PlayerEvent::WebsocketClosed(e) => e.guild_id,
        }
    }
}

/// Handle returned by [`EventListeners::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

type Callback<C> = Arc<dyn Fn(C, PlayerEvent) -> BoxFuture<'static, ()> + Send + Sync>;

struct Listener<C> {
    id: ListenerId,
    kind: EventKind,
    callback: Callback<C>,
}

/// Listener callbacks keyed by event kind, in registration order
///
/// `C` is the context handed to every callback, a session for node
/// listeners.
pub struct EventListeners<C> {
    listeners: Mutex<Vec<Listener<C>>>,
}

impl<C> Default for EventListeners<C> {
    fn default() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }
}

impl<C: Clone + Send + 'static> EventListeners<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F, Fut>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(C, PlayerEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = ListenerId(Uuid::new_v4());
        let callback: Callback<C> = Arc::new(move |ctx, event| Box::pin(callback(ctx, event)));
        self.lock().push(Listener { id, kind, callback });
        id
    }

    /// Remove a listener, returning whether it was registered
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|listener| listener.id != id);
        listeners.len() != before
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.lock().iter().filter(|l| l.kind == kind).count()
    }

    /// Spawn every listener for the event's kind
    ///
    /// Invocations run independently; a supervisor task logs panics.
    /// Returns the number of listeners scheduled.
    pub fn dispatch(&self, ctx: &C, event: &PlayerEvent) -> usize {
        let kind = event.kind();
        let callbacks: Vec<Callback<C>> = self
            .lock()
            .iter()
            .filter(|listener| listener.kind == kind)
            .map(|listener| listener.callback.clone())
            .collect();

        for callback in &callbacks {
            let handle = tokio::spawn(callback(ctx.clone(), event.clone()));
            tokio::spawn(async move {
                if let Err(e) = handle.await {
                    if e.is_panic() {
                        tracing::error!("Listener for {} panicked: {}", kind.as_str(), e);
                    }
                }
            });
        }

        callbacks.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Listener<C>>> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<C> std::fmt::Debug for EventListeners<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.listeners.lock().map(|l| l.len()).unwrap_or_default();
        f.debug_struct("EventListeners").field("count", &count).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    #[test]
    fn parses_every_event_shape() {
        let start = PlayerEvent::parse(&json!({"type": "TRACK_START", "guild_id": "1", "track": "a"}))
            .unwrap()
            .unwrap();
        assert_eq!(start.kind(), EventKind::TrackStart);
        assert_eq!(start.guild_id(), 1);

        let end = PlayerEvent::parse(&json!({"type": "TRACK_END", "guild_id": "1", "track": "a", "reason": "FINISHED"}))
            .unwrap()
            .unwrap();
        assert!(matches!(end, PlayerEvent::TrackEnd(TrackEndEvent { reason: TrackEndReason::Finished, .. })));

        let stuck = PlayerEvent::parse(&json!({"t": "TRACK_STUCK", "guild_id": 2, "track": "a", "threshold_ms": 1500}))
            .unwrap()
            .unwrap();
        match stuck {
            PlayerEvent::TrackStuck(e) => assert_eq!(e.threshold(), Duration::from_millis(1500)),
            other => panic!("unexpected event {other:?}"),
        }

        let exception = PlayerEvent::parse(&json!({
            "type": "TRACK_EXCEPTION", "guild_id": "3", "track": "a",
            "exception": {"message": "m", "cause": "c", "severity": "FAULT"}
        }))
        .unwrap()
        .unwrap();
        assert!(matches!(
            exception,
            PlayerEvent::TrackException(TrackExceptionEvent {
                exception: TrackException { severity: ExceptionSeverity::Fault, .. },
                ..
            })
        ));

        let closed = PlayerEvent::parse(&json!({
            "type": "WEBSOCKET_CLOSED", "guild_id": "4", "code": 4006, "reason": "session", "by_remote": true
        }))
        .unwrap()
        .unwrap();
        assert_eq!(closed.kind(), EventKind::WebsocketClosed);
    }

    #[test]
    fn websocket_ready_is_open() {
        let event = PlayerEvent::parse(&json!({"type": "websocket_ready", "guild_id": "5", "target": "t", "ssrc": 7}))
            .unwrap()
            .unwrap();
        assert_eq!(event.kind(), EventKind::WebsocketOpen);
    }

    #[test]
    fn unknown_types_are_skipped() {
        assert!(PlayerEvent::parse(&json!({"type": "SOMETHING", "guild_id": "1"})).unwrap().is_none());
        assert!(PlayerEvent::parse(&json!({"guild_id": "1"})).unwrap().is_none());
        assert!(PlayerEvent::parse(&json!({"type": "TRACK_END", "guild_id": "1"})).is_err());
    }

    #[test]
    fn end_reasons_that_advance() {
        assert!(TrackEndReason::Finished.may_start_next());
        assert!(TrackEndReason::LoadFailed.may_start_next());
        assert!(!TrackEndReason::Replaced.may_start_next());
        assert!(!TrackEndReason::Stopped.may_start_next());
    }

    fn start_event() -> PlayerEvent {
        PlayerEvent::TrackStart(TrackStartEvent {
            guild_id: 1,
            track_id: "a".to_string(),
        })
    }

    #[tokio::test]
    async fn dispatches_to_matching_listeners_only() {
        let listeners = EventListeners::<u64>::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let start_tx = tx.clone();
        listeners.subscribe(EventKind::TrackStart, move |ctx, event| {
            let tx = start_tx.clone();
            async move {
                let _ = tx.send((ctx, event.kind()));
            }
        });
        listeners.subscribe(EventKind::TrackEnd, move |ctx, event| {
            let tx = tx.clone();
            async move {
                let _ = tx.send((ctx, event.kind()));
            }
        });

        assert_eq!(listeners.dispatch(&42, &start_event()), 1);
        assert_eq!(rx.recv().await, Some((42, EventKind::TrackStart)));
    }

    #[tokio::test]
    async fn panicking_listener_does_not_block_others() {
        let listeners = EventListeners::<u64>::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        listeners.subscribe(EventKind::TrackStart, |ctx, _| async move {
            if ctx != 0 {
                panic!("listener failure");
            }
        });
        listeners.subscribe(EventKind::TrackStart, move |ctx, _| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(ctx);
            }
        });

        assert_eq!(listeners.dispatch(&7, &start_event()), 2);
        assert_eq!(rx.recv().await, Some(7));
    }

    #[tokio::test]
    async fn unsubscribe_removes_listener() {
        let listeners = EventListeners::<u64>::new();
        let id = listeners.subscribe(EventKind::TrackStart, |_, _| async {});
        assert_eq!(listeners.count(EventKind::TrackStart), 1);
        assert!(listeners.unsubscribe(id));
        assert!(!listeners.unsubscribe(id));
        assert_eq!(listeners.dispatch(&1, &start_event()), 0);
    }
}
