//! The session engine: one store of sessions plus the services that react
//! to what happens inside them.
//!
//! Room operations live in [`crate::lobby`] and game operations in
//! [`crate::simulation`]; both are `impl Engine` blocks over the state
//! defined here.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::game::GameSession;
use crate::room::Room;
use crate::scoring::{RankingService, ScoreReporter};
use crate::store::{Record, SessionStore};
use crate::updates::{GameUpdates, UpdateHub};
use crate::util::timestamp_ms;
use log::{debug, error, info};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Everything stored under one room id. The game is the room's
/// sub-record and is reached only through it.
#[derive(Debug, Clone)]
pub struct Session {
    pub room: Room,
    pub game: Option<GameSession>,
}

impl Record for Session {
    fn is_retired(&self) -> bool {
        self.room.members.is_empty()
    }
}

pub struct Engine {
    pub(crate) store: SessionStore<Session>,
    pub(crate) config: EngineConfig,
    pub(crate) scores: ScoreReporter,
    pub(crate) updates: UpdateHub,
}

impl Engine {
    /// Builds an engine reporting final scores to `ranking`. Must be called
    /// inside a tokio runtime.
    pub fn new(config: EngineConfig, ranking: Arc<dyn RankingService>) -> Self {
        let scores = ScoreReporter::spawn(ranking, config.score_report_timeout);
        let updates = UpdateHub::new(config.update_channel_capacity);
        Self {
            store: SessionStore::new(),
            config,
            scores,
            updates,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn room_count(&self) -> usize {
        self.store.len()
    }

    /// Subscribes to snapshots of `room_id`'s game as they are committed.
    pub fn subscribe(&self, room_id: &str) -> GameUpdates {
        self.updates.subscribe(room_id)
    }

    /// Drops finished games that have outlived the configured TTL.
    /// Returns how many were removed.
    pub async fn reap_finished(&self) -> usize {
        let now = timestamp_ms();
        let ttl = self.config.finished_session_ttl;
        let mut reaped = 0;

        for room_id in self.store.ids() {
            let result = self
                .store
                .mutate(&room_id, |session| {
                    let expired = session.game.as_ref().is_some_and(|g| g.is_expired(now, ttl));
                    if expired {
                        session.game = None;
                        self.updates.close(&room_id);
                    }
                    Ok::<_, EngineError>(expired)
                })
                .await;

            match result {
                Ok(true) => {
                    info!("Reaped finished game for room {}", room_id);
                    reaped += 1;
                }
                Ok(false) | Err(EngineError::RoomNotFound(_)) => {}
                Err(e) => error!("Failed to reap room {}: {}", room_id, e),
            }
        }
        reaped
    }

    /// Spawns task that periodically reaps finished games
    pub fn spawn_reaper(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = interval(engine.config.reaper_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let reaped = engine.reap_finished().await;
                if reaped > 0 {
                    debug!(
                        "Reaper removed {} games, {} rooms active",
                        reaped,
                        engine.room_count()
                    );
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::LogRanking;
    use shared::{Direction, GameStatus};
    use std::time::Duration;

    fn engine(config: EngineConfig) -> Engine {
        Engine::new(config, Arc::new(LogRanking))
    }

    async fn finished_game(engine: &Engine) -> String {
        let room_id = engine.create_room("alice", "r", 2).await.unwrap();
        engine.join_room(&room_id, "bob").await.unwrap();
        engine.start_game(&room_id).await.unwrap();
        engine.join_game(&room_id, "alice").await.unwrap();
        for _ in 0..20 {
            if engine.move_snake(&room_id, "alice", Direction::Up).await.is_err() {
                break;
            }
        }
        room_id
    }

    #[tokio::test]
    async fn test_reaper_drops_expired_games() {
        let engine = engine(EngineConfig {
            initial_food: 0,
            finished_session_ttl: Duration::ZERO,
            ..EngineConfig::default()
        });
        let room_id = finished_game(&engine).await;

        let state = engine.get_game_state(&room_id).await.unwrap().unwrap();
        assert_eq!(state.status, GameStatus::Finished);

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(engine.reap_finished().await, 1);
        assert_eq!(engine.get_game_state(&room_id).await, Ok(None));
        // The room itself survives; only its game is collected.
        assert!(engine.get_room(&room_id).await.is_ok());
    }

    #[tokio::test]
    async fn test_reaper_keeps_fresh_games() {
        let engine = engine(EngineConfig {
            initial_food: 0,
            ..EngineConfig::default()
        });
        let room_id = finished_game(&engine).await;

        assert_eq!(engine.reap_finished().await, 0);
        assert!(engine.get_game_state(&room_id).await.unwrap().is_some());
    }

    #[test]
    fn test_session_retires_when_empty() {
        let mut session = Session {
            room: Room::new("room_1_abcdef", "r", "alice", 2),
            game: None,
        };
        assert!(!session.is_retired());

        session.room.remove_member("alice");
        assert!(session.is_retired());
    }
}
