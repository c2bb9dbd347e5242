//! Maps wire requests onto engine operations and engine results onto wire
//! responses. Business errors never escape as anything but a failed
//! response.

use crate::engine::Engine;
use crate::error::EngineError;
use log::{debug, error};
use shared::{ErrorKind, MessageKind, Request, Response, ResponseBody};

pub async fn dispatch(engine: &Engine, request: Request) -> Response {
    let operation = request.name();
    let result = handle(engine, request).await;

    match result {
        Ok(response) => response,
        Err(e) => {
            if e.kind() == ErrorKind::Internal {
                error!("{} failed: {}", operation, e);
            } else {
                debug!("{} rejected: {}", operation, e);
            }
            Response::failed(e.kind(), e.to_string())
        }
    }
}

async fn handle(engine: &Engine, request: Request) -> Result<Response, EngineError> {
    let response = match request {
        Request::CreateRoom {
            user_id,
            room_name,
            max_players,
        } => {
            let capacity = usize::try_from(max_players).map_err(|_| {
                EngineError::InvalidInput(format!("invalid max players: {}", max_players))
            })?;
            let room_id = engine.create_room(&user_id, &room_name, capacity).await?;
            Response::ok(
                "Room created successfully",
                ResponseBody::RoomCreated { room_id },
            )
        }
        Request::JoinRoom { room_id, user_id } => {
            engine.join_room(&room_id, &user_id).await?;
            Response::ok("Joined room successfully", ResponseBody::Empty)
        }
        Request::LeaveRoom { room_id, user_id } => {
            engine.leave_room(&room_id, &user_id).await?;
            Response::ok("Left room successfully", ResponseBody::Empty)
        }
        Request::SendMessage {
            room_id,
            sender_id,
            content,
            message_type,
        } => {
            let kind: MessageKind = message_type.parse().map_err(|_| {
                EngineError::InvalidInput(format!("unknown message type: {}", message_type))
            })?;
            engine
                .send_message(&room_id, &sender_id, &content, kind)
                .await?;
            Response::ok("Message sent successfully", ResponseBody::Empty)
        }
        Request::GetRoomMessages { room_id, limit, .. } => {
            let messages = engine.get_messages(&room_id, limit).await?;
            Response::ok(
                "Messages retrieved successfully",
                ResponseBody::Messages(messages),
            )
        }
        Request::GetRoom { room_id } => {
            let room = engine.get_room(&room_id).await?;
            Response::ok("Room retrieved successfully", ResponseBody::Room(room))
        }
        Request::StartGame { room_id } => {
            engine.start_game(&room_id).await?;
            Response::ok("Game started successfully", ResponseBody::Empty)
        }
        Request::JoinGame { room_id, player_id } => {
            engine.join_game(&room_id, &player_id).await?;
            Response::ok("Joined game successfully", ResponseBody::Empty)
        }
        Request::LeaveGame { room_id, player_id } => {
            engine.leave_game(&room_id, &player_id).await?;
            Response::ok("Left game successfully", ResponseBody::Empty)
        }
        Request::Move {
            room_id,
            player_id,
            direction,
        } => {
            engine.move_snake(&room_id, &player_id, direction).await?;
            Response::ok("Move processed", ResponseBody::Empty)
        }
        Request::GetGameState { room_id } => match engine.get_game_state(&room_id).await? {
            Some(snapshot) => Response::ok(
                "Game state retrieved successfully",
                ResponseBody::GameState(snapshot),
            ),
            None => Response::failed(ErrorKind::NotFound, "game not found"),
        },
    };
    Ok(response)
}
