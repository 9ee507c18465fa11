//! Game entities.
//!
//! This module defines players and the consumables placed on the grid.

mod food;
mod player;

pub use food::{Food, Pickup, Portal, YellowDot};
pub use player::{Player, TimerToken};
