//! Player state.

use protocol::packets::PlayerSnapshot;
use protocol::{Direction, PlayerId, Position, SessionId};
use std::collections::VecDeque;
use std::time::Instant;

/// Identifies one scheduled minimap expiry. A timer only fires if the
/// player still holds the same token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(pub u64);

/// A connected player and their snake.
#[derive(Debug, Clone)]
pub struct Player {
    /// Unique player ID.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Segments, head first. Never empty.
    pub snake: VecDeque<Position>,
    pub direction: Direction,
    pub score: u32,
    /// In `[0, max_boost]`.
    pub speed_boost_percentage: f32,
    pub is_playing: bool,
    /// Lobby this player belongs to, mirrored by the session roster.
    pub session_id: Option<SessionId>,
    /// Pending minimap expiry, if a window is open.
    pub minimap_timer: Option<TimerToken>,
    /// Last accepted movement tick.
    pub last_update: Option<Instant>,
}

impl Player {
    /// Create an idle player with a single-segment snake at `position`.
    pub fn new(id: PlayerId, name: String, position: Position) -> Self {
        Self {
            id,
            name,
            snake: VecDeque::from([position]),
            direction: Direction::default(),
            score: 0,
            speed_boost_percentage: 0.0,
            is_playing: false,
            session_id: None,
            minimap_timer: None,
            last_update: None,
        }
    }

    /// Current head cell.
    #[inline]
    pub fn head(&self) -> Position {
        // The snake is never empty; fall back to the origin rather than panic.
        self.snake.front().copied().unwrap_or_default()
    }

    /// Whether any segment lies on `pos`.
    pub fn occupies(&self, pos: Position) -> bool {
        self.snake.contains(&pos)
    }

    /// Put the player back into play with a fresh one-cell snake.
    pub fn respawn(&mut self, position: Position) {
        self.snake.clear();
        self.snake.push_back(position);
        self.score = 0;
        self.speed_boost_percentage = 0.0;
        self.is_playing = true;
        self.minimap_timer = None;
        self.last_update = None;
    }

    /// Mark the player dead and drop any pending minimap expiry.
    pub fn kill(&mut self) {
        self.is_playing = false;
        self.minimap_timer = None;
    }

    /// Add portal boost, capped at `max`.
    pub fn add_boost(&mut self, amount: f32, max: f32) {
        self.speed_boost_percentage = (self.speed_boost_percentage + amount).min(max);
    }

    /// Burn boost while playing. Returns whether anything changed.
    pub fn burn_boost(&mut self, amount: f32) -> bool {
        if !self.is_playing || self.speed_boost_percentage <= 0.0 {
            return false;
        }
        self.speed_boost_percentage = (self.speed_boost_percentage - amount).max(0.0);
        true
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id,
            name: self.name.clone(),
            snake: self.snake.iter().copied().collect(),
            direction: self.direction,
            score: self.score,
            speed_boost_percentage: self.speed_boost_percentage,
            is_playing: self.is_playing,
            session_id: self.session_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing() -> Player {
        let mut player = Player::new(1, "p".into(), Position::new(5, 5));
        player.respawn(Position::new(5, 5));
        player
    }

    #[test]
    fn test_boost_is_capped() {
        let mut player = playing();
        player.speed_boost_percentage = 90.0;
        player.add_boost(25.0, 100.0);
        assert_eq!(player.speed_boost_percentage, 100.0);
    }

    #[test]
    fn test_boost_burn_floors_at_zero() {
        let mut player = playing();
        player.speed_boost_percentage = 0.3;
        assert!(player.burn_boost(0.5));
        assert_eq!(player.speed_boost_percentage, 0.0);
        assert!(!player.burn_boost(0.5));
        assert_eq!(player.speed_boost_percentage, 0.0);
    }

    #[test]
    fn test_boost_not_burned_while_dead() {
        let mut player = playing();
        player.speed_boost_percentage = 10.0;
        player.kill();
        assert!(!player.burn_boost(0.5));
        assert_eq!(player.speed_boost_percentage, 10.0);
    }

    #[test]
    fn test_respawn_resets_snake_and_score() {
        let mut player = playing();
        player.snake.extend([Position::new(4, 5), Position::new(3, 5)]);
        player.score = 12;
        player.minimap_timer = Some(TimerToken(3));
        player.kill();
        player.respawn(Position::new(9, 9));
        assert_eq!(player.snake, VecDeque::from([Position::new(9, 9)]));
        assert_eq!(player.score, 0);
        assert!(player.is_playing);
        assert!(player.minimap_timer.is_none());
    }
}
