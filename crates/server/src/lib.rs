//! Authoritative multiplayer snake server library.

pub mod config;
pub mod entity;
pub mod movement;
pub mod server;
pub mod session;
pub mod world;

// Re-export commonly used types
pub use config::Config;
pub use server::{run, serve, Dispatcher, Effects, GameState, Outbound, Recipients, ScheduledTask};
