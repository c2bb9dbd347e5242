//! Push feed of game snapshots, keyed by room.
//!
//! Each room with subscribers has its own broadcast channel, so traffic in
//! one room never pushes another room's subscribers behind. Snapshots are
//! published from inside the store's critical section, so a subscriber sees
//! its room's snapshots in commit order. Every snapshot is complete; a
//! subscriber that falls behind simply misses the overwritten ones.

use log::debug;
use shared::{GameSnapshot, GameStatus};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast::{self, error::RecvError};

#[derive(Debug, Clone)]
pub enum GameUpdate {
    Snapshot(GameSnapshot),
    /// The room's game session no longer exists
    Closed,
}

pub struct UpdateHub {
    capacity: usize,
    rooms: Mutex<HashMap<String, broadcast::Sender<GameUpdate>>>,
}

impl UpdateHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            rooms: Mutex::new(HashMap::new()),
        }
    }

    // Senders are only inserted or removed whole, so a poisoned map is
    // still consistent.
    fn rooms(&self) -> MutexGuard<'_, HashMap<String, broadcast::Sender<GameUpdate>>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sends the snapshot built by `build` to the room's subscribers. The
    /// snapshot is only built when someone is listening.
    pub fn publish_snapshot(&self, room_id: &str, build: impl FnOnce() -> GameSnapshot) {
        let mut rooms = self.rooms();
        let Some(sender) = rooms.get(room_id) else {
            return;
        };
        if sender.receiver_count() == 0 {
            rooms.remove(room_id);
            return;
        }
        let _ = sender.send(GameUpdate::Snapshot(build()));
    }

    /// Ends the room's feed and drops its channel.
    pub fn close(&self, room_id: &str) {
        if let Some(sender) = self.rooms().remove(room_id) {
            let _ = sender.send(GameUpdate::Closed);
        }
    }

    pub fn subscribe(&self, room_id: &str) -> GameUpdates {
        let mut rooms = self.rooms();
        rooms.retain(|_, sender| sender.receiver_count() > 0);
        let receiver = rooms
            .entry(room_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();

        GameUpdates {
            room_id: room_id.to_string(),
            receiver,
            done: false,
        }
    }

    /// Rooms that currently hold a channel
    pub fn channel_count(&self) -> usize {
        self.rooms().len()
    }
}

/// Lazy sequence of one room's snapshots. Drop it to unsubscribe.
pub struct GameUpdates {
    room_id: String,
    receiver: broadcast::Receiver<GameUpdate>,
    done: bool,
}

impl GameUpdates {
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Waits for the next snapshot of this room. Returns `None` once the
    /// session is gone or its `Finished` snapshot has been delivered.
    pub async fn next(&mut self) -> Option<GameSnapshot> {
        while !self.done {
            match self.receiver.recv().await {
                Ok(GameUpdate::Snapshot(snapshot)) => {
                    self.done = snapshot.status == GameStatus::Finished;
                    return Some(snapshot);
                }
                Ok(GameUpdate::Closed) | Err(RecvError::Closed) => self.done = true,
                Err(RecvError::Lagged(skipped)) => {
                    debug!(
                        "Subscriber for room {} skipped {} updates",
                        self.room_id, skipped
                    );
                }
            }
        }
        None
    }
}
