//! JSON envelope protocol spoken over the WebSocket.
//!
//! Every frame is `{ "type": string, "data": object, "timestamp": number }`.
//! Inbound frames are decoded in two steps (envelope, then payload by type)
//! so that the several names deployed clients use for the same intent all
//! land on one [`ClientMessage`] variant, and so that a missing `data` is
//! read as an empty object.

use crate::{Food, FoodId, LeaderboardEntry, PlayerId, PlayerView, Point};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds, as carried in envelopes.
pub fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

#[derive(Debug)]
pub enum ProtocolError {
    /// Not JSON, or no `type` field.
    Json(serde_json::Error),
    UnknownType(String),
    /// Known type whose `data` does not fit the expected payload.
    InvalidData {
        kind: String,
        source: serde_json::Error,
    },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Json(e) => write!(f, "malformed envelope: {}", e),
            ProtocolError::UnknownType(kind) => write!(f, "unknown message type '{}'", kind),
            ProtocolError::InvalidData { kind, source } => {
                write!(f, "invalid data for '{}': {}", kind, source)
            }
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProtocolError::Json(e) => Some(e),
            ProtocolError::InvalidData { source, .. } => Some(source),
            ProtocolError::UnknownType(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JoinRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, alias = "skin", skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Head icon index. Non-numeric values are treated as absent.
    #[serde(
        default,
        deserialize_with = "lenient_index",
        skip_serializing_if = "Option::is_none"
    )]
    pub head: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<Point>>,
}

fn lenient_index<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_u64().and_then(|v| u32::try_from(v).ok()))
}

/// Movement target and boost intent. A missing coordinate means "stop".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveRequest {
    #[serde(default)]
    pub x: Option<f32>,
    #[serde(default)]
    pub y: Option<f32>,
    #[serde(default)]
    pub boost: Option<bool>,
}

impl MoveRequest {
    pub fn target(&self) -> Option<Point> {
        match (self.x, self.y) {
            (Some(x), Some(y)) => Some(Point::new(x, y)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoostRequest {
    #[serde(default, alias = "boosting", alias = "active")]
    pub boost: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PongData {
    #[serde(default)]
    pub timestamp: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Join(JoinRequest),
    Move(MoveRequest),
    Boost(BoostRequest),
    Leave,
    GetLeaderboard,
    Pong(PongData),
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

fn payload<T: DeserializeOwned>(kind: &str, data: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|source| ProtocolError::InvalidData {
        kind: kind.to_string(),
        source,
    })
}

/// Decodes one inbound text frame.
pub fn decode_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    let raw: RawEnvelope = serde_json::from_str(text).map_err(ProtocolError::Json)?;
    let data = match raw.data {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };

    let message = match raw.kind.as_str() {
        "playerJoin" | "joinGame" => ClientMessage::Join(payload(&raw.kind, data)?),
        "playerMove" | "updatePosition" | "playerUpdate" => {
            ClientMessage::Move(payload(&raw.kind, data)?)
        }
        "playerBoost" => ClientMessage::Boost(payload(&raw.kind, data)?),
        "playerDisconnect" | "leaveGame" => ClientMessage::Leave,
        "getLeaderboard" => ClientMessage::GetLeaderboard,
        "pong" => ClientMessage::Pong(payload(&raw.kind, data)?),
        _ => return Err(ProtocolError::UnknownType(raw.kind)),
    };

    Ok(message)
}

impl ClientMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Join(_) => "playerJoin",
            ClientMessage::Move(_) => "playerMove",
            ClientMessage::Boost(_) => "playerBoost",
            ClientMessage::Leave => "playerDisconnect",
            ClientMessage::GetLeaderboard => "getLeaderboard",
            ClientMessage::Pong(_) => "pong",
        }
    }

    /// Wraps the message in an envelope, the way browser clients send it.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let data = match self {
            ClientMessage::Join(request) => serde_json::to_value(request)?,
            ClientMessage::Move(request) => serde_json::to_value(request)?,
            ClientMessage::Boost(request) => serde_json::to_value(request)?,
            ClientMessage::Pong(data) => serde_json::to_value(data)?,
            ClientMessage::Leave | ClientMessage::GetLeaderboard => Value::Object(Map::new()),
        };
        envelope(Value::String(self.kind().to_string()), data)
    }
}

fn envelope(kind: Value, data: Value) -> Result<String, serde_json::Error> {
    let mut map = Map::new();
    map.insert("type".to_string(), kind);
    map.insert("data".to_string(), data);
    map.insert("timestamp".to_string(), Value::from(get_timestamp()));
    serde_json::to_string(&Value::Object(map))
}

/// Full world snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub tick: u64,
    pub world_width: f32,
    pub world_height: f32,
    pub players: Vec<PlayerView>,
    pub foods: Vec<Food>,
    pub player_count: usize,
    /// Set only on the snapshot a joining connection receives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_id: Option<PlayerId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    GameState(Snapshot),
    PlayerJoined {
        id: PlayerId,
        name: String,
    },
    PlayerLeft {
        id: PlayerId,
        name: String,
    },
    FoodSpawned(Food),
    #[serde(rename_all = "camelCase")]
    FoodCollected {
        id: FoodId,
        player_id: PlayerId,
    },
    #[serde(rename_all = "camelCase")]
    PlayerDied {
        id: PlayerId,
        name: String,
        killer_id: PlayerId,
        killer_name: String,
        score: u64,
        length: usize,
        x: f32,
        y: f32,
    },
    #[serde(rename_all = "camelCase")]
    GameOver {
        killer_name: String,
        score: u64,
        length: usize,
    },
    Leaderboard {
        players: Vec<LeaderboardEntry>,
    },
    Error {
        message: String,
    },
    Ping {
        timestamp: u64,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    /// Serializes to an envelope stamped with the current time.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            map.insert("timestamp".to_string(), Value::from(get_timestamp()));
        }
        serde_json::to_string(&value)
    }

    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
