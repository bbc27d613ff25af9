use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// WebSocket operation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    SubmitVoiceUpdate = 0,
    Stats = 1,
    SetupResuming = 2,
    SetupDispatchBuffer = 3,
    PlayerEvent = 4,
    PlayerUpdate = 5,
    PlayTrack = 6,
    StopTrack = 7,
    PlayerPause = 8,
    PlayerFilters = 9,
    PlayerSeek = 10,
    PlayerDestroy = 11,
    PlayerConfigure = 12,
}

impl OpCode {
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => OpCode::SubmitVoiceUpdate,
            1 => OpCode::Stats,
            2 => OpCode::SetupResuming,
            3 => OpCode::SetupDispatchBuffer,
            4 => OpCode::PlayerEvent,
            5 => OpCode::PlayerUpdate,
            6 => OpCode::PlayTrack,
            7 => OpCode::StopTrack,
            8 => OpCode::PlayerPause,
            9 => OpCode::PlayerFilters,
            10 => OpCode::PlayerSeek,
            11 => OpCode::PlayerDestroy,
            12 => OpCode::PlayerConfigure,
            _ => return None,
        })
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

impl Serialize for OpCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// Outbound command envelope, `{"op": <int>, "d": <payload>}`
#[derive(Debug, Serialize)]
pub struct Envelope<'a, T: Serialize> {
    pub op: OpCode,
    pub d: &'a T,
}

/// Inbound frame before the op code is checked
#[derive(Debug, Deserialize)]
pub struct RawEnvelope {
    pub op: i64,
    #[serde(default)]
    pub d: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct GuildPayload {
    pub guild_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VoiceUpdatePayload {
    pub session_id: String,
    #[serde(flatten)]
    pub event: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayTrackPayload {
    pub guild_id: String,
    pub track: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<u64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub no_replace: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PausePayload {
    pub guild_id: String,
    pub state: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeekPayload {
    pub guild_id: String,
    pub position: u64,
}

/// `PLAYER_UPDATE` push
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerUpdate {
    #[serde(deserialize_with = "guild_id")]
    pub guild_id: u64,
    #[serde(default)]
    pub frames: FrameStats,
    #[serde(default)]
    pub current_track: CurrentTrack,
}

/// Voice frame counters reported by the node
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct FrameStats {
    pub sent: Option<u64>,
    pub lost: Option<u64>,
    #[serde(default)]
    pub usable: bool,
}

impl Default for FrameStats {
    fn default() -> Self {
        Self {
            sent: None,
            lost: None,
            usable: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CurrentTrack {
    pub track: Option<String>,
    #[serde(default)]
    pub position: f64,
    #[serde(default)]
    pub paused: bool,
}

/// Guild ids travel as strings but older nodes send numbers
pub(crate) fn guild_id<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => s.parse().map_err(serde::de::Error::custom),
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| serde::de::Error::custom("guild_id is not an unsigned integer")),
        other => Err(serde::de::Error::custom(format!("invalid guild_id {other}"))),
    }
}

/// Extract the guild id of an inbound player payload
pub(crate) fn payload_guild_id(data: &Value) -> Option<u64> {
    match data.get("guild_id")? {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}
