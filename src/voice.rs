use crate::error::Result;
use async_trait::async_trait;
use serde::Deserialize;

/// Options passed to the gateway when joining a voice channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    pub self_deaf: bool,
    pub self_mute: bool,
}

/// Voice-state update for the bot user, as delivered by the chat gateway
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VoiceStateUpdate {
    #[serde(default, deserialize_with = "optional_id")]
    pub channel_id: Option<u64>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl VoiceStateUpdate {
    pub fn joined(channel_id: u64, session_id: impl Into<String>) -> Self {
        Self {
            channel_id: Some(channel_id),
            session_id: Some(session_id.into()),
        }
    }

    pub fn left() -> Self {
        Self::default()
    }
}

/// Bridge to the host framework's voice signaling
///
/// The library only asks the gateway to change the bot's voice state. The
/// resulting voice-state and voice-server updates are fed back through
/// [`Session::on_voice_state_update`](crate::Session::on_voice_state_update)
/// and [`Session::on_voice_server_update`](crate::Session::on_voice_server_update).
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    /// Join or move to `channel_id` in `guild_id`
    async fn join(&self, guild_id: u64, channel_id: u64, options: ConnectOptions) -> Result<()>;

    /// Leave voice in `guild_id`
    async fn leave(&self, guild_id: u64) -> Result<()>;
}

fn optional_id<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde_json::Value;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
        Some(Value::Number(n)) => Ok(n.as_u64()),
        Some(other) => Err(serde::de::Error::custom(format!("invalid channel_id {other}"))),
    }
}
