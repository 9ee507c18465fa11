//! Movement and collision resolution.
//!
//! One call to [`advance`] moves one snake by one cell:
//! - Classifying what the new head runs into (wall, own tail, another snake)
//! - Consuming portals, yellow dots and food on the destination cell
//! - Growing or shifting the snake body

use crate::config::PlayerConfig;
use crate::world::World;
use protocol::{FoodKind, PlayerId, Position};

/// What a head ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collision {
    /// Left the grid.
    Wall,
    /// Hit its own body.
    Tail,
    /// Hit another playing snake.
    Player(PlayerId),
}

impl Collision {
    /// Whether the death was self-inflicted.
    pub fn is_suicide(&self) -> bool {
        matches!(self, Collision::Wall | Collision::Tail)
    }
}

/// Consumables picked up during one step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pickups {
    pub portal: bool,
    pub yellow_dot: bool,
    pub food: Option<FoodKind>,
}

/// Result of advancing one snake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Unknown or non-playing player; nothing happened.
    Ignored,
    /// The snake collided and is no longer playing.
    Died(Collision),
    /// The snake moved.
    Moved(Pickups),
}

/// Classify a move of `player_id`'s head to `new_head`.
///
/// Precedence: wall, then own body (excluding the current head), then any
/// other playing snake. Reads live state so interleaved moves from other
/// connections are always seen.
pub fn classify(world: &World, player_id: PlayerId, new_head: Position) -> Option<Collision> {
    if !new_head.in_bounds(world.grid_size()) {
        return Some(Collision::Wall);
    }

    let player = world.player(player_id)?;
    if player.snake.iter().skip(1).any(|&seg| seg == new_head) {
        return Some(Collision::Tail);
    }

    world
        .players
        .values()
        .filter(|other| other.id != player_id && other.is_playing)
        .find(|other| other.occupies(new_head))
        .map(|other| Collision::Player(other.id))
}

/// Advance `player_id`'s snake one cell in its current direction.
pub fn advance(world: &mut World, player_id: PlayerId, rules: &PlayerConfig) -> StepOutcome {
    let new_head = match world.player(player_id) {
        Some(player) if player.is_playing => player.head().step(player.direction),
        _ => return StepOutcome::Ignored,
    };

    if let Some(collision) = classify(world, player_id, new_head) {
        if let Some(player) = world.player_mut(player_id) {
            player.kill();
        }
        return StepOutcome::Died(collision);
    }

    let portal = world.take_portal_at(new_head).is_some();
    let yellow_dot = world.take_yellow_dot_at(new_head).is_some();
    let food = world.take_food_at(new_head);

    let Some(player) = world.player_mut(player_id) else {
        return StepOutcome::Ignored;
    };

    player.snake.push_front(new_head);

    if portal {
        player.add_boost(rules.portal_boost, rules.max_boost);
    }

    match food {
        Some(food) => {
            player.score += food.points();
            if let Some(&tail) = player.snake.back() {
                for _ in 0..food.extra_segments() {
                    player.snake.push_back(tail);
                }
            }
        }
        None => {
            player.snake.pop_back();
        }
    }

    StepOutcome::Moved(Pickups {
        portal,
        yellow_dot,
        food: food.map(|f| f.kind),
    })
}
