//! Client -> Server message parsing.

use crate::{Direction, ProtocolError, SessionId, Visibility};
use serde::{Deserialize, Serialize};

/// Parsed client message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Enter the shared world with a fresh snake.
    Spawn {
        #[serde(default)]
        player_name: String,
    },
    /// Change heading.
    Direction { direction: Direction },
    /// Advance the sender's snake by one cell.
    Update,
    /// Burn boost while the client holds the boost key.
    SpeedBoost,
    /// Open a new lobby with the sender as host.
    CreateSession {
        #[serde(default)]
        session_name: String,
        #[serde(default)]
        visibility: Visibility,
    },
    /// Join a lobby by its share code.
    JoinSession { code: String },
    /// Leave a lobby.
    LeaveSession { session_id: SessionId },
    /// Set the sender's ready flag.
    ToggleReady { session_id: SessionId, is_ready: bool },
    /// Host-only visibility change.
    ToggleVisibility {
        session_id: SessionId,
        visibility: Visibility,
    },
    /// Request the public lobby list.
    GetSessions,
}

impl ClientMessage {
    /// Parse a client message from a text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Whether this message arrives at tick cadence.
    pub fn is_high_frequency(&self) -> bool {
        matches!(
            self,
            ClientMessage::Update | ClientMessage::SpeedBoost | ClientMessage::Direction { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unit_messages_ignore_extra_fields() {
        assert_eq!(ClientMessage::parse(r#"{"type":"update"}"#).unwrap(), ClientMessage::Update);
        assert_eq!(
            ClientMessage::parse(r#"{"type":"speedBoost","ts":12}"#).unwrap(),
            ClientMessage::SpeedBoost
        );
        assert_eq!(
            ClientMessage::parse(r#"{"type":"getSessions"}"#).unwrap(),
            ClientMessage::GetSessions
        );
    }

    #[test]
    fn test_parse_camel_case_fields() {
        let msg = ClientMessage::parse(r#"{"type":"toggleReady","sessionId":7,"isReady":true}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::ToggleReady {
                session_id: 7,
                is_ready: true
            }
        );

        let msg = ClientMessage::parse(r#"{"type":"spawn","playerName":"ana"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Spawn {
                player_name: "ana".to_string()
            }
        );

        let msg = ClientMessage::parse(r#"{"type":"direction","direction":"UP"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Direction {
                direction: Direction::Up
            }
        );
    }

    #[test]
    fn test_create_session_defaults_to_public() {
        let msg = ClientMessage::parse(r#"{"type":"createSession","sessionName":"Room1"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::CreateSession {
                session_name: "Room1".to_string(),
                visibility: Visibility::Public
            }
        );
    }

    #[test]
    fn test_rejects_unknown_type() {
        assert!(matches!(
            ClientMessage::parse(r#"{"type":"teleport"}"#),
            Err(ProtocolError::InvalidJson(_))
        ));
        assert!(ClientMessage::parse("not json").is_err());
    }
}
