//! Room records: membership, host succession and the chat log
//!
//! Everything here is plain data manipulation. Locking and lookup are the
//! engine's job; each method either validates and fails without touching
//! the room, or applies its whole change.

use crate::error::EngineError;
use crate::util::timestamp_ms;
use log::info;
use shared::{ChatMessage, MessageKind, RoomInfo, RoomStatus, SYSTEM_SENDER, SYSTEM_SENDER_NAME};

#[derive(Debug, Clone)]
pub struct Room {
    pub id: String,
    pub name: String,
    /// Host; reassigned when the host leaves
    pub creator_id: String,
    /// Join order, earliest first
    pub members: Vec<String>,
    pub capacity: usize,
    pub status: RoomStatus,
    pub created_at: u64,
    messages: Vec<ChatMessage>,
    next_message_seq: u64,
}

impl Room {
    /// Opens a waiting room with the creator as its only member.
    pub fn new(id: impl Into<String>, name: impl Into<String>, creator_id: &str, capacity: usize) -> Self {
        let mut room = Self {
            id: id.into(),
            name: name.into(),
            creator_id: creator_id.to_string(),
            members: vec![creator_id.to_string()],
            capacity,
            status: RoomStatus::Waiting,
            created_at: timestamp_ms(),
            messages: Vec::new(),
            next_message_seq: 1,
        };
        room.post_system(format!("{} created the room", creator_id));
        room
    }

    pub fn is_member(&self, player_id: &str) -> bool {
        self.members.iter().any(|m| m == player_id)
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.capacity
    }

    pub fn add_member(&mut self, player_id: &str) -> Result<(), EngineError> {
        if self.status != RoomStatus::Waiting {
            return Err(EngineError::InvalidState(
                "cannot join room that is not in waiting state".to_string(),
            ));
        }
        if self.is_full() {
            return Err(EngineError::RoomFull);
        }
        if self.is_member(player_id) {
            return Err(EngineError::AlreadyMember(player_id.to_string()));
        }

        self.members.push(player_id.to_string());
        self.post_system(format!("{} joined the room", player_id));
        info!(
            "Player {} joined room {} ({}/{})",
            player_id,
            self.id,
            self.members.len(),
            self.capacity
        );
        Ok(())
    }

    /// Removes a member and hands the host role to the earliest remaining
    /// member if the host left. Returns false for non-members, which leaves
    /// the room untouched. A room left without members is marked finished.
    pub fn remove_member(&mut self, player_id: &str) -> bool {
        let Some(index) = self.members.iter().position(|m| m == player_id) else {
            return false;
        };

        self.members.remove(index);
        self.post_system(format!("{} left the room", player_id));

        match self.members.first() {
            Some(successor) if self.creator_id == player_id => {
                info!(
                    "Host of room {} moved from {} to {}",
                    self.id, player_id, successor
                );
                self.creator_id = successor.clone();
            }
            Some(_) => {}
            None => self.status = RoomStatus::Finished,
        }
        true
    }

    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.status != RoomStatus::Waiting {
            return Err(EngineError::InvalidState(
                "game already started or finished".to_string(),
            ));
        }
        if self.members.len() < 2 {
            return Err(EngineError::NotEnoughPlayers);
        }
        self.status = RoomStatus::Playing;
        Ok(())
    }

    /// Appends to the log. Messages are never edited or reordered.
    pub fn append_message(
        &mut self,
        sender_id: &str,
        sender_name: &str,
        content: impl Into<String>,
        kind: MessageKind,
    ) -> &ChatMessage {
        let message = ChatMessage {
            id: format!("msg_{}", self.next_message_seq),
            room_id: self.id.clone(),
            sender_id: sender_id.to_string(),
            sender_name: sender_name.to_string(),
            content: content.into(),
            kind,
            created_at: timestamp_ms(),
        };
        self.next_message_seq += 1;
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }

    fn post_system(&mut self, content: String) {
        self.append_message(SYSTEM_SENDER, SYSTEM_SENDER_NAME, content, MessageKind::System);
    }

    /// The newest `limit` messages, oldest first. A non-positive limit
    /// returns the whole log.
    pub fn recent_messages(&self, limit: i32) -> Vec<ChatMessage> {
        let limit = usize::try_from(limit).unwrap_or(0);
        let start = if limit == 0 {
            0
        } else {
            self.messages.len().saturating_sub(limit)
        };
        self.messages[start..].to_vec()
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            creator_id: self.creator_id.clone(),
            members: self.members.clone(),
            capacity: self.capacity,
            status: self.status,
            created_at: self.created_at,
        }
    }
}
