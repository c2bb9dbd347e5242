//! Game operations: join, leave, move and state queries.
//!
//! Each operation is a single closure run under the room's lock, so a move
//! reads and writes the snake, the food and the session status as one
//! step. Score reports leave through the reporter only after the closure
//! has committed.

use crate::engine::Engine;
use crate::error::EngineError;
use crate::game::{GameSession, MoveOutcome};
use log::{debug, info};
use shared::{Direction, GameSnapshot, GameStatus, RoomStatus, UpdateScoreRequest};

impl Engine {
    /// Adds a fresh snake for `player_id`, creating the room's game session
    /// on first use. Joining again replaces the player's snake.
    pub async fn join_game(&self, room_id: &str, player_id: &str) -> Result<(), EngineError> {
        let config = &self.config;

        self.store
            .mutate(room_id, |session| {
                if session.room.status != RoomStatus::Playing {
                    return Err(EngineError::InvalidState(
                        "game has not started in this room".to_string(),
                    ));
                }
                if session
                    .game
                    .as_ref()
                    .is_some_and(|g| g.status == GameStatus::Finished)
                {
                    return Err(EngineError::InvalidState(
                        "game already finished".to_string(),
                    ));
                }

                let mut rng = rand::thread_rng();
                let game = session.game.get_or_insert_with(|| {
                    info!("Creating game session for room {}", room_id);
                    GameSession::new(room_id, config, &mut rng)
                });
                game.add_snake(player_id, config, &mut rng);
                self.updates.publish_snapshot(room_id, || game.snapshot());
                Ok(())
            })
            .await
    }

    /// Removes the player's snake. The session goes away with its last
    /// snake; if only dead snakes remain, the game finishes.
    pub async fn leave_game(&self, room_id: &str, player_id: &str) -> Result<(), EngineError> {
        let reports = self
            .store
            .mutate(room_id, |session| {
                let game = session
                    .game
                    .as_mut()
                    .ok_or_else(|| EngineError::SessionNotFound(room_id.to_string()))?;

                let reports = game.remove_snake(player_id);
                if game.snakes.is_empty() {
                    session.game = None;
                    self.updates.close(room_id);
                    info!("Game for room {} closed, no players left", room_id);
                } else {
                    self.updates.publish_snapshot(room_id, || game.snapshot());
                }
                Ok::<_, EngineError>(reports)
            })
            .await
            .map_err(EngineError::into_session_error)?;

        self.report_scores(reports);
        Ok(())
    }

    /// Advances the player's snake one cell in `direction`.
    pub async fn move_snake(
        &self,
        room_id: &str,
        player_id: &str,
        direction: Direction,
    ) -> Result<MoveOutcome, EngineError> {
        let config = &self.config;

        let outcome = self
            .store
            .mutate(room_id, |session| {
                let game = session
                    .game
                    .as_mut()
                    .ok_or_else(|| EngineError::SessionNotFound(room_id.to_string()))?;

                let outcome =
                    game.apply_move(player_id, direction, config, &mut rand::thread_rng())?;
                self.updates.publish_snapshot(room_id, || game.snapshot());
                Ok::<_, EngineError>(outcome)
            })
            .await
            .map_err(EngineError::into_session_error)?;

        if let MoveOutcome::Died { reports } = &outcome {
            if !reports.is_empty() {
                info!("Game in room {} is over", room_id);
            }
            self.report_scores(reports.clone());
        }
        Ok(outcome)
    }

    /// A copy of the room's game, or `None` if the room has no game.
    pub async fn get_game_state(&self, room_id: &str) -> Result<Option<GameSnapshot>, EngineError> {
        let result = self
            .store
            .mutate(room_id, |session| {
                Ok::<_, EngineError>(session.game.as_ref().map(GameSession::snapshot))
            })
            .await;

        match result {
            Err(EngineError::RoomNotFound(_)) => Ok(None),
            other => other,
        }
    }

    fn report_scores(&self, reports: Vec<UpdateScoreRequest>) {
        for report in reports {
            debug!("Queueing score {} for {}", report.score, report.user_id);
            self.scores.report(report);
        }
    }
}
