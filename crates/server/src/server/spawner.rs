//! Background spawners and the session sweep.

use crate::config::SpawnerConfig;
use std::time::{Duration, SystemTime};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::info;

use super::{Dispatcher, GameState};

fn ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Run the periodic food, portal and yellow dot spawns plus the expired
/// session sweep. Never returns.
pub async fn run_spawners(dispatcher: Dispatcher, config: SpawnerConfig) {
    let mut food = ticker(config.food_interval());
    let mut portals = ticker(config.portal_interval());
    let mut yellow_dots = ticker(config.yellow_dot_interval());
    let mut sweep = ticker(config.session_sweep_interval());

    info!(
        "Spawners running (food {:?}, portals {:?}, yellow dots {:?}, sweep {:?})",
        config.food_interval(),
        config.portal_interval(),
        config.yellow_dot_interval(),
        config.session_sweep_interval()
    );

    loop {
        tokio::select! {
            _ = food.tick() => dispatcher.apply(GameState::spawn_food_tick).await,
            _ = portals.tick() => dispatcher.apply(GameState::spawn_portal_tick).await,
            _ = yellow_dots.tick() => dispatcher.apply(GameState::spawn_yellow_dot_tick).await,
            _ = sweep.tick() => {
                dispatcher
                    .apply(|game| game.sweep_sessions(SystemTime::now()))
                    .await
            }
        }
    }
}
