//! Server configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub spawner: SpawnerConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

impl Config {
    /// Load configuration from `config.toml` or use defaults.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("config.toml"))
    }

    /// Load configuration from `path`, writing the defaults there if it is missing.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&contents)?)
        } else {
            info!("No {} found, creating default config", path.display());
            let default_config = Self::default();
            std::fs::write(path, toml::to_string_pretty(&default_config)?)?;
            Ok(default_config)
        }
    }
}

/// Server networking and general settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Connections per IP limit.
    #[serde(default = "default_ip_limit")]
    pub ip_limit: usize,
    /// Server name shown in logs.
    #[serde(default = "default_name")]
    pub name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            max_connections: default_max_connections(),
            ip_limit: default_ip_limit(),
            name: default_name(),
        }
    }
}

fn default_port() -> u16 {
    8080
}
fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_max_connections() -> usize {
    100
}
fn default_ip_limit() -> usize {
    100
}
fn default_name() -> String {
    "Snake Server".to_string()
}

/// Grid and initial population.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorldConfig {
    #[serde(default = "default_grid_size")]
    pub grid_size: i32,
    #[serde(default = "default_initial_food")]
    pub initial_food: usize,
    #[serde(default = "default_initial_portals")]
    pub initial_portals: usize,
    #[serde(default = "default_initial_yellow_dots")]
    pub initial_yellow_dots: usize,
    /// Probability that a spawned food item is special.
    #[serde(default = "default_special_food_chance")]
    pub special_food_chance: f64,
    /// Periodic dot spawns stop once this many exist.
    #[serde(default = "default_max_yellow_dots")]
    pub max_yellow_dots: usize,
    /// Random samples tried before falling back to a linear scan.
    #[serde(default = "default_spawn_attempts")]
    pub spawn_attempts: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            grid_size: default_grid_size(),
            initial_food: default_initial_food(),
            initial_portals: default_initial_portals(),
            initial_yellow_dots: default_initial_yellow_dots(),
            special_food_chance: default_special_food_chance(),
            max_yellow_dots: default_max_yellow_dots(),
            spawn_attempts: default_spawn_attempts(),
        }
    }
}

fn default_grid_size() -> i32 {
    protocol::GRID_SIZE
}
fn default_initial_food() -> usize {
    100
}
fn default_initial_portals() -> usize {
    5
}
fn default_initial_yellow_dots() -> usize {
    5
}
fn default_special_food_chance() -> f64 {
    0.2
}
fn default_max_yellow_dots() -> usize {
    5
}
fn default_spawn_attempts() -> usize {
    1000
}

/// Background spawn and sweep cadence.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpawnerConfig {
    #[serde(default = "default_food_interval")]
    pub food_interval_secs: u64,
    #[serde(default = "default_portal_interval")]
    pub portal_interval_secs: u64,
    #[serde(default = "default_yellow_dot_interval")]
    pub yellow_dot_interval_secs: u64,
    #[serde(default = "default_session_sweep_interval")]
    pub session_sweep_interval_secs: u64,
}

impl SpawnerConfig {
    pub fn food_interval(&self) -> Duration {
        Duration::from_secs(self.food_interval_secs.max(1))
    }

    pub fn portal_interval(&self) -> Duration {
        Duration::from_secs(self.portal_interval_secs.max(1))
    }

    pub fn yellow_dot_interval(&self) -> Duration {
        Duration::from_secs(self.yellow_dot_interval_secs.max(1))
    }

    pub fn session_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session_sweep_interval_secs.max(1))
    }
}

impl Default for SpawnerConfig {
    fn default() -> Self {
        Self {
            food_interval_secs: default_food_interval(),
            portal_interval_secs: default_portal_interval(),
            yellow_dot_interval_secs: default_yellow_dot_interval(),
            session_sweep_interval_secs: default_session_sweep_interval(),
        }
    }
}

fn default_food_interval() -> u64 {
    5
}
fn default_portal_interval() -> u64 {
    20
}
fn default_yellow_dot_interval() -> u64 {
    60
}
fn default_session_sweep_interval() -> u64 {
    30 * 60
}

/// Player configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlayerConfig {
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,
    /// Boost percentage granted per portal.
    #[serde(default = "default_portal_boost")]
    pub portal_boost: f32,
    #[serde(default = "default_max_boost")]
    pub max_boost: f32,
    /// Boost percentage burned per `speedBoost` message.
    #[serde(default = "default_boost_decay")]
    pub boost_decay: f32,
    #[serde(default = "default_minimap_duration")]
    pub minimap_duration_secs: u64,
    /// Minimum spacing between accepted `update` messages; 0 accepts every one.
    #[serde(default)]
    pub min_update_interval_ms: u64,
}

impl PlayerConfig {
    pub fn minimap_duration(&self) -> Duration {
        Duration::from_secs(self.minimap_duration_secs)
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            max_name_length: default_max_name_length(),
            portal_boost: default_portal_boost(),
            max_boost: default_max_boost(),
            boost_decay: default_boost_decay(),
            minimap_duration_secs: default_minimap_duration(),
            min_update_interval_ms: 0,
        }
    }
}

fn default_max_name_length() -> usize {
    30
}
fn default_portal_boost() -> f32 {
    25.0
}
fn default_max_boost() -> f32 {
    100.0
}
fn default_boost_decay() -> f32 {
    0.5
}
fn default_minimap_duration() -> u64 {
    20
}

/// Lobby configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Sessions older than this are swept regardless of state.
    #[serde(default = "default_session_max_age")]
    pub max_age_secs: u64,
    /// Share code length. Values below 4 are raised to 4.
    #[serde(default = "default_code_length")]
    pub code_length: usize,
    #[serde(default = "default_session_name_length")]
    pub max_name_length: usize,
}

impl SessionConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_age_secs: default_session_max_age(),
            code_length: default_code_length(),
            max_name_length: default_session_name_length(),
        }
    }
}

fn default_session_max_age() -> u64 {
    2 * 60 * 60
}
fn default_code_length() -> usize {
    6
}
fn default_session_name_length() -> usize {
    40
}
