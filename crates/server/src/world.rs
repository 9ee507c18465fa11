//! World state management.
//!
//! Owns the grid, every player's snake and all consumables.

use crate::config::WorldConfig;
use crate::entity::{Food, Pickup, Player, Portal, YellowDot};
use protocol::packets::GameSnapshot;
use protocol::{FoodKind, PlayerId, Position};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

/// The game world containing all simulated entities.
#[derive(Debug)]
pub struct World {
    grid_size: i32,
    spawn_attempts: usize,
    special_food_chance: f64,
    max_yellow_dots: usize,

    /// Players by ID, in connection order.
    pub players: BTreeMap<PlayerId, Player>,
    pub foods: Vec<Food>,
    pub yellow_dots: Vec<YellowDot>,
    pub portals: Vec<Portal>,

    rng: StdRng,
}

/// Number of entities of each kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityCounts {
    pub players: usize,
    pub foods: usize,
    pub yellow_dots: usize,
    pub portals: usize,
}

impl World {
    /// Create an empty world seeded from the OS.
    pub fn new(config: &WorldConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Create an empty world driven by `rng`.
    pub fn with_rng(config: &WorldConfig, rng: StdRng) -> Self {
        Self {
            grid_size: config.grid_size.max(1),
            spawn_attempts: config.spawn_attempts,
            special_food_chance: config.special_food_chance.clamp(0.0, 1.0),
            max_yellow_dots: config.max_yellow_dots,
            players: BTreeMap::new(),
            foods: Vec::with_capacity(config.initial_food),
            yellow_dots: Vec::with_capacity(config.max_yellow_dots),
            portals: Vec::with_capacity(config.initial_portals),
            rng,
        }
    }

    #[inline]
    pub fn grid_size(&self) -> i32 {
        self.grid_size
    }

    /// Random source shared by every spawn decision.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Whether `pos` holds a snake segment (any player) or any consumable.
    pub fn is_occupied(&self, pos: Position) -> bool {
        self.players.values().any(|p| p.occupies(pos))
            || self.foods.iter().any(|f| f.is_at(pos))
            || self.yellow_dots.iter().any(|d| d.is_at(pos))
            || self.portals.iter().any(|p| p.is_at(pos))
    }

    fn occupied_cells(&self) -> HashSet<Position> {
        let mut cells = HashSet::new();
        for player in self.players.values() {
            cells.extend(player.snake.iter().copied());
        }
        cells.extend(self.foods.iter().map(Pickup::position));
        cells.extend(self.yellow_dots.iter().map(Pickup::position));
        cells.extend(self.portals.iter().map(Pickup::position));
        cells
    }

    /// Pick a free cell.
    ///
    /// Samples uniformly for a bounded number of attempts, then scans the
    /// grid from a random starting cell. Returns `None` only when every cell
    /// is taken.
    pub fn random_unoccupied_position(&mut self) -> Option<Position> {
        let size = self.grid_size;
        for _ in 0..self.spawn_attempts {
            let pos = Position::new(
                self.rng.random_range(0..size),
                self.rng.random_range(0..size),
            );
            if !self.is_occupied(pos) {
                return Some(pos);
            }
        }

        let occupied = self.occupied_cells();
        let total = (size as usize) * (size as usize);
        let start = self.rng.random_range(0..total);
        (0..total)
            .map(|i| (start + i) % total)
            .map(|cell| Position::new((cell % size as usize) as i32, (cell / size as usize) as i32))
            .find(|pos| !occupied.contains(pos))
    }

    /// A cell to place a player on. Falls back to any cell when the grid is full.
    pub fn spawn_position(&mut self) -> Position {
        match self.random_unoccupied_position() {
            Some(pos) => pos,
            None => {
                warn!("Grid is full, spawning player on an occupied cell");
                let size = self.grid_size;
                Position::new(self.rng.random_range(0..size), self.rng.random_range(0..size))
            }
        }
    }

    /// Add a player.
    pub fn add_player(&mut self, player: Player) {
        self.players.insert(player.id, player);
    }

    /// Remove a player.
    pub fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        self.players.remove(&id)
    }

    #[inline]
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    #[inline]
    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    /// IDs of players whose snakes are currently in the simulation.
    pub fn playing_ids(&self) -> Vec<PlayerId> {
        self.players
            .values()
            .filter(|p| p.is_playing)
            .map(|p| p.id)
            .collect()
    }

    pub fn add_food(&mut self, food: Food) {
        self.foods.push(food);
    }

    pub fn add_portal(&mut self, portal: Portal) {
        self.portals.push(portal);
    }

    pub fn add_yellow_dot(&mut self, dot: YellowDot) {
        self.yellow_dots.push(dot);
    }

    /// Remove and return the food at `index`.
    pub fn remove_food(&mut self, index: usize) -> Option<Food> {
        (index < self.foods.len()).then(|| self.foods.remove(index))
    }

    /// Remove and return the first food at `pos`.
    pub fn take_food_at(&mut self, pos: Position) -> Option<Food> {
        take_first(&mut self.foods, |f| f.is_at(pos))
    }

    /// Remove and return the first portal at `pos`.
    pub fn take_portal_at(&mut self, pos: Position) -> Option<Portal> {
        take_first(&mut self.portals, |p| p.is_at(pos))
    }

    /// Remove and return the first yellow dot at `pos`.
    pub fn take_yellow_dot_at(&mut self, pos: Position) -> Option<YellowDot> {
        take_first(&mut self.yellow_dots, |d| d.is_at(pos))
    }

    /// Place one food item on a free cell. Special with the configured chance.
    pub fn spawn_food(&mut self) -> Option<Food> {
        let position = self.random_unoccupied_position()?;
        let kind = if self.rng.random_bool(self.special_food_chance) {
            FoodKind::Special
        } else {
            FoodKind::Normal
        };
        let food = Food::new(position, kind);
        self.add_food(food);
        Some(food)
    }

    /// Place one portal on a free cell. Portals are not capped.
    pub fn spawn_portal(&mut self) -> Option<Portal> {
        let portal = Portal::new(self.random_unoccupied_position()?);
        self.add_portal(portal);
        Some(portal)
    }

    /// Place one yellow dot unless the soft cap is already reached.
    pub fn spawn_yellow_dot(&mut self) -> Option<YellowDot> {
        if self.yellow_dots.len() >= self.max_yellow_dots {
            return None;
        }
        self.place_yellow_dot()
    }

    fn place_yellow_dot(&mut self) -> Option<YellowDot> {
        let dot = YellowDot::new(self.random_unoccupied_position()?);
        self.add_yellow_dot(dot);
        Some(dot)
    }

    /// Initial population at startup.
    pub fn populate(&mut self, config: &WorldConfig) -> EntityCounts {
        for _ in 0..config.initial_food {
            self.spawn_food();
        }
        for _ in 0..config.initial_portals {
            self.spawn_portal();
        }
        for _ in 0..config.initial_yellow_dots {
            self.place_yellow_dot();
        }
        self.counts()
    }

    pub fn counts(&self) -> EntityCounts {
        EntityCounts {
            players: self.players.len(),
            foods: self.foods.len(),
            yellow_dots: self.yellow_dots.len(),
            portals: self.portals.len(),
        }
    }

    /// Full world state for clients.
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            players: self.players.values().map(Player::snapshot).collect(),
            foods: self.foods.iter().map(Food::snapshot).collect(),
            yellow_dots: self.yellow_dots.iter().map(YellowDot::snapshot).collect(),
            portals: self.portals.iter().map(Portal::snapshot).collect(),
        }
    }
}

fn take_first<T>(items: &mut Vec<T>, pred: impl Fn(&T) -> bool) -> Option<T> {
    let index = items.iter().position(pred)?;
    Some(items.remove(index))
}
