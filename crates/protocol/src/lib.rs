//! Shared protocol crate for the snake server.
//!
//! This crate contains:
//! - Message definitions for both directions (JSON envelopes tagged by `type`)
//! - Shared value types (Position, Direction, Visibility, etc.)
//! - World and session snapshot shapes sent to clients

mod error;
pub mod packets;

pub use error::ProtocolError;

use serde::{Deserialize, Serialize};

/// Width and height of the square world grid.
pub const GRID_SIZE: i32 = 256;

/// Server-assigned player identifier, sequential for the process lifetime.
pub type PlayerId = u32;

/// Server-assigned session identifier.
pub type SessionId = u64;

/// A grid cell. Signed so that a step off the edge is representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The neighbouring cell one step in `direction`.
    #[inline]
    pub fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.offset();
        Self::new(self.x + dx, self.y + dy)
    }

    /// Whether both coordinates lie in `[0, grid_size)`.
    #[inline]
    pub fn in_bounds(self, grid_size: i32) -> bool {
        (0..grid_size).contains(&self.x) && (0..grid_size).contains(&self.y)
    }
}

/// Heading of a snake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
    Left,
    #[default]
    Right,
}

impl Direction {
    /// Unit vector for this heading. The y axis grows downwards.
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

/// Food variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FoodKind {
    #[default]
    Normal,
    Special,
}

/// Whether a session shows up in the public lobby list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// Lobby state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Waiting,
    Playing,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_follows_screen_axes() {
        let origin = Position::new(10, 10);
        assert_eq!(origin.step(Direction::Up), Position::new(10, 9));
        assert_eq!(origin.step(Direction::Down), Position::new(10, 11));
        assert_eq!(origin.step(Direction::Left), Position::new(9, 10));
        assert_eq!(origin.step(Direction::Right), Position::new(11, 10));
    }

    #[test]
    fn test_bounds() {
        assert!(Position::new(0, 0).in_bounds(GRID_SIZE));
        assert!(Position::new(255, 255).in_bounds(GRID_SIZE));
        assert!(!Position::new(-1, 0).in_bounds(GRID_SIZE));
        assert!(!Position::new(0, 256).in_bounds(GRID_SIZE));
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(serde_json::to_string(&Direction::Left).unwrap(), "\"LEFT\"");
        assert_eq!(serde_json::to_string(&FoodKind::Special).unwrap(), "\"special\"");
        assert_eq!(serde_json::to_string(&Visibility::Private).unwrap(), "\"private\"");
        assert_eq!(serde_json::to_string(&SessionStatus::Playing).unwrap(), "\"playing\"");
    }
}
