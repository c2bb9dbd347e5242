//! Room lifecycle operations: create, join, leave, chat and start.

use crate::engine::{Engine, Session};
use crate::error::{EngineError, StoreError};
use crate::room::Room;
use crate::util::generate_room_id;
use log::{error, info};
use shared::{ChatMessage, MessageKind, RoomInfo};

/// Fresh ids are timestamp + random suffix; a clash this many times in a
/// row means something is badly wrong.
const ROOM_ID_ATTEMPTS: usize = 8;

impl Engine {
    /// Opens a room with `creator_id` as its first member and host.
    pub async fn create_room(
        &self,
        creator_id: &str,
        name: &str,
        capacity: usize,
    ) -> Result<String, EngineError> {
        if creator_id.is_empty() {
            return Err(EngineError::InvalidInput("user id is required".to_string()));
        }
        if capacity < 1 {
            return Err(EngineError::InvalidInput(
                "max players must be at least 1".to_string(),
            ));
        }

        for _ in 0..ROOM_ID_ATTEMPTS {
            let room_id = generate_room_id(&mut rand::thread_rng());
            let session = Session {
                room: Room::new(room_id.clone(), name, creator_id, capacity),
                game: None,
            };

            match self.store.insert_new(room_id.clone(), session) {
                Ok(()) => {
                    info!(
                        "Room {} ({}) created by {} for {} players",
                        room_id, name, creator_id, capacity
                    );
                    return Ok(room_id);
                }
                Err(StoreError::AlreadyExists(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        error!("Could not allocate a unique room id");
        Err(EngineError::Internal(
            "could not allocate a unique room id".to_string(),
        ))
    }

    pub async fn join_room(&self, room_id: &str, player_id: &str) -> Result<(), EngineError> {
        self.store
            .mutate(room_id, |session| session.room.add_member(player_id))
            .await
    }

    /// Removes a member. Leaving a room one is not in succeeds and changes
    /// nothing. The last member out closes the room and its game.
    pub async fn leave_room(&self, room_id: &str, player_id: &str) -> Result<(), EngineError> {
        let closed = self
            .store
            .mutate(room_id, |session| {
                if !session.room.remove_member(player_id) {
                    return Ok::<_, EngineError>(false);
                }
                info!("Player {} left room {}", player_id, room_id);

                let closed = session.room.members.is_empty();
                if closed {
                    session.game = None;
                    self.updates.close(room_id);
                }
                Ok(closed)
            })
            .await?;

        if closed {
            info!("Room {} is empty and has been removed", room_id);
        }
        Ok(())
    }

    /// Appends a chat message. Text messages use the sender id as the
    /// display name.
    pub async fn send_message(
        &self,
        room_id: &str,
        sender_id: &str,
        content: &str,
        kind: MessageKind,
    ) -> Result<(), EngineError> {
        self.store
            .mutate(room_id, |session| {
                session
                    .room
                    .append_message(sender_id, sender_id, content, kind);
                Ok(())
            })
            .await
    }

    /// The newest `limit` messages in chronological order; `limit <= 0`
    /// returns the whole log.
    pub async fn get_messages(
        &self,
        room_id: &str,
        limit: i32,
    ) -> Result<Vec<ChatMessage>, EngineError> {
        self.store
            .mutate(room_id, |session| Ok(session.room.recent_messages(limit)))
            .await
    }

    pub async fn get_room(&self, room_id: &str) -> Result<RoomInfo, EngineError> {
        self.store
            .mutate(room_id, |session| Ok(session.room.info()))
            .await
    }

    /// Flips a waiting room with at least two members to playing. The game
    /// session itself appears on the first `join_game`.
    pub async fn start_game(&self, room_id: &str) -> Result<(), EngineError> {
        self.store
            .mutate(room_id, |session| session.room.start())
            .await?;
        info!("Game started in room {}", room_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::scoring::LogRanking;
    use shared::RoomStatus;
    use std::sync::Arc;
    use tokio_test::assert_ok;

    fn engine() -> Engine {
        Engine::new(EngineConfig::default(), Arc::new(LogRanking))
    }

    #[tokio::test]
    async fn test_create_room() {
        let engine = engine();
        let room_id = engine.create_room("alice", "Friday", 4).await.unwrap();

        assert!(room_id.starts_with("room_"));
        let room = engine.get_room(&room_id).await.unwrap();
        assert_eq!(room.name, "Friday");
        assert_eq!(room.creator_id, "alice");
        assert_eq!(room.members, vec!["alice"]);
        assert_eq!(room.status, RoomStatus::Waiting);

        let messages = engine.get_messages(&room_id, 10).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "alice created the room");
    }

    #[tokio::test]
    async fn test_create_room_validation() {
        let engine = engine();
        assert!(matches!(
            engine.create_room("alice", "r", 0).await,
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            engine.create_room("", "r", 2).await,
            Err(EngineError::InvalidInput(_))
        ));
        assert_eq!(engine.room_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_room() {
        let engine = engine();
        let missing = EngineError::RoomNotFound("room_x".to_string());

        assert_eq!(engine.join_room("room_x", "bob").await, Err(missing.clone()));
        assert_eq!(engine.leave_room("room_x", "bob").await, Err(missing.clone()));
        assert_eq!(
            engine
                .send_message("room_x", "bob", "hi", MessageKind::Text)
                .await,
            Err(missing.clone())
        );
        assert_eq!(engine.start_game("room_x").await, Err(missing.clone()));
        assert_eq!(engine.get_messages("room_x", 5).await, Err(missing));
    }

    #[tokio::test]
    async fn test_join_and_leave_messages() {
        let engine = engine();
        let room_id = engine.create_room("alice", "r", 3).await.unwrap();
        assert_ok!(engine.join_room(&room_id, "bob").await);
        assert_ok!(engine.send_message(&room_id, "bob", "hello", MessageKind::Text).await);
        assert_ok!(engine.leave_room(&room_id, "bob").await);

        let log = engine.get_messages(&room_id, 0).await.unwrap();
        let contents: Vec<&str> = log.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec![
                "alice created the room",
                "bob joined the room",
                "hello",
                "bob left the room"
            ]
        );
        assert_eq!(log[2].sender_name, "bob");
        assert_eq!(log[2].kind, MessageKind::Text);
    }

    #[tokio::test]
    async fn test_host_leaves() {
        let engine = engine();
        let room_id = engine.create_room("alice", "r", 3).await.unwrap();
        engine.join_room(&room_id, "bob").await.unwrap();
        engine.join_room(&room_id, "carol").await.unwrap();

        engine.leave_room(&room_id, "alice").await.unwrap();

        let room = engine.get_room(&room_id).await.unwrap();
        assert_eq!(room.creator_id, "bob");
        assert_eq!(room.members, vec!["bob", "carol"]);
    }

    #[tokio::test]
    async fn test_last_leave_removes_room() {
        let engine = engine();
        let room_id = engine.create_room("alice", "r", 2).await.unwrap();

        engine.leave_room(&room_id, "alice").await.unwrap();

        assert_eq!(engine.room_count(), 0);
        assert_eq!(
            engine.get_messages(&room_id, 0).await,
            Err(EngineError::RoomNotFound(room_id.clone()))
        );
    }

    #[tokio::test]
    async fn test_last_leave_ends_update_feed() {
        let engine = engine();
        let room_id = engine.create_room("alice", "r", 2).await.unwrap();
        let mut updates = engine.subscribe(&room_id);
        assert_eq!(engine.updates.channel_count(), 1);

        engine.leave_room(&room_id, "alice").await.unwrap();

        assert!(updates.next().await.is_none());
        assert_eq!(engine.updates.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_leave_as_stranger_is_noop() {
        let engine = engine();
        let room_id = engine.create_room("alice", "r", 2).await.unwrap();

        assert_ok!(engine.leave_room(&room_id, "mallory").await);
        assert_eq!(engine.get_messages(&room_id, 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_start_game_rules() {
        let engine = engine();
        let room_id = engine.create_room("alice", "r", 2).await.unwrap();

        assert_eq!(
            engine.start_game(&room_id).await,
            Err(EngineError::NotEnoughPlayers)
        );
        engine.join_room(&room_id, "bob").await.unwrap();
        assert_ok!(engine.start_game(&room_id).await);
        assert!(matches!(
            engine.start_game(&room_id).await,
            Err(EngineError::InvalidState(_))
        ));
        assert_eq!(
            engine.get_room(&room_id).await.unwrap().status,
            RoomStatus::Playing
        );
    }
}
