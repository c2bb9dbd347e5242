//! Types shared by the session engine and its RPC callers: the grid model,
//! room and game snapshots, and the request/response envelopes that travel
//! over the wire as bincode.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const GRID_SIZE: i32 = 20;
pub const SPAWN_X: i32 = 10;
pub const SPAWN_Y: i32 = 10;
pub const INITIAL_FOOD: usize = 5;
pub const FOOD_REWARD: u32 = 10;

/// Sender id reserved for messages the engine writes itself.
pub const SYSTEM_SENDER: &str = "system";
pub const SYSTEM_SENDER_NAME: &str = "System";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns the neighbouring cell one unit in `direction`, or `None` for
    /// `Direction::None`. The result may lie outside the grid.
    pub fn step(self, direction: Direction) -> Option<Position> {
        let (dx, dy) = direction.unit_vector()?;
        Some(Position {
            x: self.x + dx,
            y: self.y + dy,
        })
    }

    pub fn in_bounds(self, grid_size: i32) -> bool {
        (0..grid_size).contains(&self.x) && (0..grid_size).contains(&self.y)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Facing of a snake. Screen coordinates: `Up` decreases `y`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    #[default]
    None,
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn unit_vector(self) -> Option<(i32, i32)> {
        match self {
            Direction::None => None,
            Direction::Up => Some((0, -1)),
            Direction::Down => Some((0, 1)),
            Direction::Left => Some((-1, 0)),
            Direction::Right => Some((1, 0)),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NONE" => Ok(Direction::None),
            "UP" => Ok(Direction::Up),
            "DOWN" => Ok(Direction::Down),
            "LEFT" => Ok(Direction::Left),
            "RIGHT" => Ok(Direction::Right),
            other => Err(format!("unknown direction '{}'", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Finished,
}

/// `Paused` is declared for future pause/resume support; nothing transitions
/// into it yet.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Waiting,
    Playing,
    Paused,
    Finished,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    System,
}

impl FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "text" => Ok(MessageKind::Text),
            "system" => Ok(MessageKind::System),
            other => Err(format!("unknown message type '{}'", other)),
        }
    }
}

/// One entry of a room's append-only chat log.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    pub room_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub content: String,
    pub kind: MessageKind,
    /// Milliseconds since the Unix epoch
    pub created_at: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub id: String,
    pub name: String,
    pub creator_id: String,
    /// Join order; index 0 is the earliest remaining member
    pub members: Vec<String>,
    pub capacity: usize,
    pub status: RoomStatus,
    pub created_at: u64,
}

/// A player's avatar: `segments[0]` is the head and `length` always equals
/// `segments.len()`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Snake {
    pub player_id: String,
    pub segments: Vec<Position>,
    pub color: String,
    pub length: usize,
    pub score: u32,
    pub alive: bool,
    pub direction: Direction,
}

impl Snake {
    /// A fresh single-segment snake facing right.
    pub fn spawn(player_id: impl Into<String>, at: Position, color: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
            segments: vec![at],
            color: color.into(),
            length: 1,
            score: 0,
            alive: true,
            direction: Direction::Right,
        }
    }

    pub fn head(&self) -> Position {
        self.segments[0]
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GameSnapshot {
    pub game_id: String,
    pub room_id: String,
    pub snakes: Vec<Snake>,
    pub foods: Vec<Position>,
    pub walls: Vec<Position>,
    pub status: GameStatus,
    /// Bumped on every committed change to the session
    pub version: u64,
    pub updated_at: u64,
}

impl GameSnapshot {
    pub fn snake(&self, player_id: &str) -> Option<&Snake> {
        self.snakes.iter().find(|s| s.player_id == player_id)
    }
}

/// Coarse classification carried by every failed response.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    Capacity,
    Conflict,
    InvalidInput,
    Internal,
    Timeout,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Request {
    CreateRoom {
        user_id: String,
        room_name: String,
        max_players: i32,
    },
    JoinRoom {
        room_id: String,
        user_id: String,
    },
    LeaveRoom {
        room_id: String,
        user_id: String,
    },
    SendMessage {
        room_id: String,
        sender_id: String,
        content: String,
        message_type: String,
    },
    GetRoomMessages {
        room_id: String,
        limit: i32,
        /// Accepted for compatibility, ignored
        since: i64,
    },
    GetRoom {
        room_id: String,
    },
    StartGame {
        room_id: String,
    },
    JoinGame {
        room_id: String,
        player_id: String,
    },
    LeaveGame {
        room_id: String,
        player_id: String,
    },
    Move {
        room_id: String,
        player_id: String,
        direction: Direction,
    },
    GetGameState {
        room_id: String,
    },
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::CreateRoom { .. } => "CreateRoom",
            Request::JoinRoom { .. } => "JoinRoom",
            Request::LeaveRoom { .. } => "LeaveRoom",
            Request::SendMessage { .. } => "SendMessage",
            Request::GetRoomMessages { .. } => "GetRoomMessages",
            Request::GetRoom { .. } => "GetRoom",
            Request::StartGame { .. } => "StartGame",
            Request::JoinGame { .. } => "JoinGame",
            Request::LeaveGame { .. } => "LeaveGame",
            Request::Move { .. } => "Move",
            Request::GetGameState { .. } => "GetGameState",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum ResponseBody {
    Empty,
    RoomCreated { room_id: String },
    Messages(Vec<ChatMessage>),
    Room(RoomInfo),
    GameState(GameSnapshot),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Response {
    pub success: bool,
    pub message: String,
    pub kind: Option<ErrorKind>,
    pub body: ResponseBody,
}

impl Response {
    pub fn ok(message: impl Into<String>, body: ResponseBody) -> Self {
        Self {
            success: true,
            message: message.into(),
            kind: None,
            body,
        }
    }

    pub fn failed(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            kind: Some(kind),
            body: ResponseBody::Empty,
        }
    }
}

/// One request datagram. `deadline_ms` of zero means "use the server default".
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Envelope {
    pub request_id: u64,
    pub deadline_ms: u64,
    pub request: Request,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Reply {
    pub request_id: u64,
    pub response: Response,
}

/// Outbound call to the external ranking service.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UpdateScoreRequest {
    pub user_id: String,
    pub score: u32,
    pub game_won: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UpdateScoreResponse {
    pub success: bool,
    pub message: String,
    pub rank: Option<u32>,
}
