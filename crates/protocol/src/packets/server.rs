//! Server -> Client message building.

use crate::{
    Direction, FoodKind, PlayerId, Position, ProtocolError, SessionId, SessionStatus, Visibility,
};
use serde::{Deserialize, Serialize};

/// A player as seen by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    /// Head first.
    pub snake: Vec<Position>,
    pub direction: Direction,
    pub score: u32,
    pub speed_boost_percentage: f32,
    pub is_playing: bool,
    pub session_id: Option<SessionId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodSnapshot {
    pub position: Position,
    #[serde(rename = "type")]
    pub kind: FoodKind,
}

/// A yellow dot or a portal; both only carry a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupSnapshot {
    pub position: Position,
}

/// Full world state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub players: Vec<PlayerSnapshot>,
    pub foods: Vec<FoodSnapshot>,
    pub yellow_dots: Vec<PickupSnapshot>,
    pub portals: Vec<PickupSnapshot>,
}

/// One roster entry of a lobby.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMember {
    pub id: PlayerId,
    pub name: String,
    pub is_ready: bool,
}

/// A lobby as seen by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: SessionId,
    pub code: String,
    pub name: String,
    pub host_id: PlayerId,
    pub players: Vec<SessionMember>,
    pub status: SessionStatus,
    pub visibility: Visibility,
    /// Milliseconds since the unix epoch.
    pub created_at: u64,
}

/// Outbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Sent once after the connection is accepted.
    Init { player_id: PlayerId },
    GameState(GameSnapshot),
    PlayerDeath {
        message: String,
        player_id: PlayerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        killer_id: Option<PlayerId>,
    },
    /// Sent only to the player who died.
    GameOver { score: u32, message: String },
    /// Duration is in seconds.
    MinimapUpdate {
        visible: bool,
        duration: u64,
        reset: bool,
    },
    SessionCreated { session: SessionInfo },
    SessionJoined { session: SessionInfo },
    SessionUpdated { session: SessionInfo },
    SessionClosed { session_id: SessionId, message: String },
    SessionError { message: String },
    SessionsList { sessions: Vec<SessionInfo> },
    /// Reply to a frame that could not be understood.
    Error { message: String },
}

impl ServerMessage {
    /// Encode as a JSON text frame.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}
