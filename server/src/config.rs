//! Tunables for the engine. Defaults reproduce the reference game rules.

use shared::{Position, FOOD_REWARD, GRID_SIZE, INITIAL_FOOD, SPAWN_X, SPAWN_Y};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub grid_size: i32,
    pub spawn: Position,
    pub initial_food: usize,
    pub food_reward: u32,
    /// Kill a snake whose head enters any live snake's body
    pub collisions: bool,
    pub score_report_timeout: Duration,
    /// How long a finished game stays observable before the reaper drops it
    pub finished_session_ttl: Duration,
    pub reaper_interval: Duration,
    /// Snapshots buffered per room before a slow subscriber starts skipping
    pub update_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grid_size: GRID_SIZE,
            spawn: Position::new(SPAWN_X, SPAWN_Y),
            initial_food: INITIAL_FOOD,
            food_reward: FOOD_REWARD,
            collisions: false,
            score_report_timeout: Duration::from_secs(5),
            finished_session_ttl: Duration::from_secs(300),
            reaper_interval: Duration::from_secs(30),
            update_channel_capacity: 256,
        }
    }
}
