//! Consumables: food, yellow dots and portals.

use protocol::packets::{FoodSnapshot, PickupSnapshot};
use protocol::{FoodKind, Position};

/// Anything that occupies one grid cell until a snake head reaches it.
pub trait Pickup {
    /// Cell this item sits on.
    fn position(&self) -> Position;

    /// Whether a head at `pos` consumes this item.
    #[inline]
    fn is_at(&self, pos: Position) -> bool {
        self.position() == pos
    }
}

/// A food pellet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Food {
    pub position: Position,
    pub kind: FoodKind,
}

impl Food {
    pub fn new(position: Position, kind: FoodKind) -> Self {
        Self { position, kind }
    }

    /// Score awarded on consumption.
    pub fn points(&self) -> u32 {
        match self.kind {
            FoodKind::Normal => 1,
            FoodKind::Special => 5,
        }
    }

    /// Tail copies appended on top of keeping the tail this tick.
    ///
    /// Normal food grows the snake by one (the tail is simply not dropped),
    /// special food by five.
    pub fn extra_segments(&self) -> usize {
        match self.kind {
            FoodKind::Normal => 0,
            FoodKind::Special => 4,
        }
    }

    pub fn snapshot(&self) -> FoodSnapshot {
        FoodSnapshot {
            position: self.position,
            kind: self.kind,
        }
    }
}

impl Pickup for Food {
    fn position(&self) -> Position {
        self.position
    }
}

/// Grants the consumer a timed minimap window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YellowDot {
    pub position: Position,
}

impl YellowDot {
    pub fn new(position: Position) -> Self {
        Self { position }
    }

    pub fn snapshot(&self) -> PickupSnapshot {
        PickupSnapshot {
            position: self.position,
        }
    }
}

impl Pickup for YellowDot {
    fn position(&self) -> Position {
        self.position
    }
}

/// Grants the consumer speed-boost capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Portal {
    pub position: Position,
}

impl Portal {
    pub fn new(position: Position) -> Self {
        Self { position }
    }

    pub fn snapshot(&self) -> PickupSnapshot {
        PickupSnapshot {
            position: self.position,
        }
    }
}

impl Pickup for Portal {
    fn position(&self) -> Position {
        self.position
    }
}
