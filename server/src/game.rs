use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::util::{generate_color, timestamp_ms};
use log::{debug, info};
use rand::Rng;
use shared::{Direction, GameSnapshot, GameStatus, Position, Snake, UpdateScoreRequest};
use std::collections::BTreeMap;
use std::time::Duration;

/// What a single move did to the moving snake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved { ate_food: bool },
    /// `reports` is non-empty only for the move that finished the game.
    Died { reports: Vec<UpdateScoreRequest> },
}

/// Live simulation state for one room's match.
#[derive(Debug, Clone)]
pub struct GameSession {
    pub id: String,
    pub room_id: String,
    pub snakes: BTreeMap<String, Snake>,
    pub foods: Vec<Position>,
    pub walls: Vec<Position>,
    pub status: GameStatus,
    pub version: u64,
    pub updated_at: u64,
    pub finished_at: Option<u64>,
    /// Final scores of players who left before the game ended
    departed: BTreeMap<String, u32>,
    /// Player whose death ended a multi-player game
    last_survivor: Option<String>,
}

fn random_cell<R: Rng>(rng: &mut R, grid_size: i32) -> Position {
    Position::new(rng.gen_range(0..grid_size), rng.gen_range(0..grid_size))
}

impl GameSession {
    /// Starts a playing session with the configured amount of food.
    pub fn new<R: Rng>(room_id: &str, config: &EngineConfig, rng: &mut R) -> Self {
        let foods = (0..config.initial_food)
            .map(|_| random_cell(rng, config.grid_size))
            .collect();

        Self {
            id: format!("game_{}", room_id),
            room_id: room_id.to_string(),
            snakes: BTreeMap::new(),
            foods,
            walls: Vec::new(),
            status: GameStatus::Playing,
            version: 0,
            updated_at: timestamp_ms(),
            finished_at: None,
            departed: BTreeMap::new(),
            last_survivor: None,
        }
    }

    fn touch(&mut self) {
        self.version += 1;
        self.updated_at = timestamp_ms();
    }

    /// Spawns a fresh snake for `player_id`, replacing any existing one.
    pub fn add_snake<R: Rng>(&mut self, player_id: &str, config: &EngineConfig, rng: &mut R) {
        let snake = Snake::spawn(player_id, config.spawn, generate_color(rng));
        info!(
            "Spawned snake for {} in game {} at {}",
            player_id, self.id, config.spawn
        );
        self.departed.remove(player_id);
        self.snakes.insert(player_id.to_string(), snake);
        self.touch();
    }

    /// Removes the player's snake. If that leaves only dead snakes behind the
    /// game finishes and the score reports are returned.
    pub fn remove_snake(&mut self, player_id: &str) -> Vec<UpdateScoreRequest> {
        let Some(snake) = self.snakes.remove(player_id) else {
            return Vec::new();
        };
        self.touch();

        if self.status == GameStatus::Finished {
            return Vec::new();
        }
        self.departed.insert(snake.player_id, snake.score);

        if snake.alive && !self.snakes.is_empty() && self.live_snakes() == 0 {
            return self.finish();
        }
        Vec::new()
    }

    pub fn live_snakes(&self) -> usize {
        self.snakes.values().filter(|s| s.alive).count()
    }

    /// Advances one snake by one cell.
    pub fn apply_move<R: Rng>(
        &mut self,
        player_id: &str,
        direction: Direction,
        config: &EngineConfig,
        rng: &mut R,
    ) -> Result<MoveOutcome, EngineError> {
        let snake = self
            .snakes
            .get(player_id)
            .filter(|s| s.alive)
            .ok_or_else(|| EngineError::PlayerNotActive(player_id.to_string()))?;
        let new_head = snake
            .head()
            .step(direction)
            .ok_or(EngineError::InvalidDirection)?;

        let food_index = self.foods.iter().position(|f| *f == new_head);
        let blocked = !new_head.in_bounds(config.grid_size)
            || (config.collisions && self.occupied(player_id, new_head, food_index.is_none()));

        self.touch();
        let Some(snake) = self.snakes.get_mut(player_id) else {
            return Err(EngineError::PlayerNotActive(player_id.to_string()));
        };
        snake.direction = direction;

        if blocked {
            snake.alive = false;
            info!(
                "Snake {} in game {} died moving to {} (score {})",
                player_id, self.id, new_head, snake.score
            );

            let reports = if self.live_snakes() == 0 {
                if self.snakes.len() > 1 {
                    self.last_survivor = Some(player_id.to_string());
                }
                self.finish()
            } else {
                Vec::new()
            };
            return Ok(MoveOutcome::Died { reports });
        }

        if let Some(index) = food_index {
            self.foods.remove(index);
            self.foods.push(random_cell(rng, config.grid_size));
            snake.length += 1;
            snake.score += config.food_reward;
        }

        snake.segments.insert(0, new_head);
        if food_index.is_none() {
            snake.segments.pop();
        }
        debug_assert_eq!(snake.length, snake.segments.len());
        debug!("Snake {} moved {:?} to {}", player_id, direction, new_head);

        Ok(MoveOutcome::Moved {
            ate_food: food_index.is_some(),
        })
    }

    /// True when `cell` lies on a live snake's body. The mover's tail tip
    /// does not count when it is about to slide away.
    fn occupied(&self, mover: &str, cell: Position, tail_moves: bool) -> bool {
        self.snakes.values().filter(|s| s.alive).any(|s| {
            let body = if s.player_id == mover && tail_moves {
                &s.segments[..s.segments.len() - 1]
            } else {
                &s.segments[..]
            };
            body.contains(&cell)
        })
    }

    /// Moves the session to `Finished` and builds one score report per
    /// player that took part, including players who already left.
    fn finish(&mut self) -> Vec<UpdateScoreRequest> {
        self.status = GameStatus::Finished;
        self.finished_at = Some(self.updated_at);
        info!("Game {} finished", self.id);

        let winner = self.last_survivor.as_deref();
        let mut reports: Vec<UpdateScoreRequest> = self
            .snakes
            .values()
            .map(|s| UpdateScoreRequest {
                user_id: s.player_id.clone(),
                score: s.score,
                game_won: s.alive || winner == Some(s.player_id.as_str()),
            })
            .collect();
        reports.extend(self.departed.iter().map(|(player_id, score)| UpdateScoreRequest {
            user_id: player_id.clone(),
            score: *score,
            game_won: false,
        }));
        reports
    }

    /// True once a finished game has been observable for longer than `ttl`.
    pub fn is_expired(&self, now: u64, ttl: Duration) -> bool {
        match self.finished_at {
            Some(at) => now.saturating_sub(at) > ttl.as_millis() as u64,
            None => false,
        }
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            game_id: self.id.clone(),
            room_id: self.room_id.clone(),
            snakes: self.snakes.values().cloned().collect(),
            foods: self.foods.clone(),
            walls: self.walls.clone(),
            status: self.status,
            version: self.version,
            updated_at: self.updated_at,
        }
    }
}
