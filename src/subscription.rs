use crate::error::{ObsidianError, Result};
use crate::events::PlayerEvent;
use std::time::Duration;
use tokio::sync::broadcast;

/// Lifecycle and player notifications from a node
#[derive(Debug, Clone)]
pub enum NodeEvent {
    /// Handshake completed and the receive loop is running
    Ready { identifier: String },

    /// A player event was routed to a session
    Player { guild_id: u64, event: PlayerEvent },

    /// The socket dropped and a reconnect is scheduled after `delay`
    Reconnecting { attempt: u32, delay: Duration },

    /// Reconnecting gave up after the configured number of attempts
    ReconnectFailed { attempts: u32 },

    /// The node was disconnected on request
    Disconnected { identifier: String },
}

/// Receiver for node events
pub struct EventReceiver {
    rx: broadcast::Receiver<NodeEvent>,
}

impl EventReceiver {
    pub(crate) fn new(rx: broadcast::Receiver<NodeEvent>) -> Self {
        Self { rx }
    }

    /// Receive the next event
    ///
    /// Fails with [`ObsidianError::ChannelClosed`] once the node is dropped.
    pub async fn recv(&mut self) -> Result<NodeEvent> {
        self.rx.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => ObsidianError::ChannelClosed,
            broadcast::error::RecvError::Lagged(n) => ObsidianError::Lagged(n),
        })
    }

    /// Try to receive an event without blocking
    ///
    /// Returns `None` if no event is available.
    pub fn try_recv(&mut self) -> Result<Option<NodeEvent>> {
        match self.rx.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Closed) => Err(ObsidianError::ChannelClosed),
            Err(broadcast::error::TryRecvError::Lagged(n)) => Err(ObsidianError::Lagged(n)),
        }
    }
}
