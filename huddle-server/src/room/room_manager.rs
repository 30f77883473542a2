use crate::room::{Room, RoomCommand};
use dashmap::DashMap;
use huddle_core::RoomId;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

const ROOM_COMMAND_BUFFER: usize = 100;

struct RoomEntry {
    tx: mpsc::Sender<RoomCommand>,
    connections: usize,
}

/// Registry of live rooms, keyed by room id.
///
/// A room exists while at least one WebSocket is attached to it. Connection
/// counting happens under the map's entry lock, so a socket either joins the
/// current room task or starts a fresh one.
#[derive(Clone)]
pub struct RoomManager {
    rooms: Arc<DashMap<RoomId, RoomEntry>>,
    chat_history_limit: usize,
}

impl RoomManager {
    pub fn new(chat_history_limit: usize) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            chat_history_limit,
        }
    }

    /// Attaches a connection to `room_id`, creating the room on first use.
    pub fn enter(&self, room_id: &RoomId) -> mpsc::Sender<RoomCommand> {
        let mut entry = self.rooms.entry(room_id.clone()).or_insert_with(|| {
            info!("Creating new room: {}", room_id);
            let (tx, rx) = mpsc::channel(ROOM_COMMAND_BUFFER);
            let room = Room::new(room_id.clone(), rx, self.chat_history_limit);
            tokio::spawn(room.run());

            RoomEntry { tx, connections: 0 }
        });

        entry.connections += 1;
        entry.tx.clone()
    }

    /// Detaches a connection. The last one out drops the room.
    pub fn leave(&self, room_id: &RoomId) {
        let empty = match self.rooms.get_mut(room_id) {
            Some(mut entry) => {
                entry.connections = entry.connections.saturating_sub(1);
                entry.connections == 0
            }
            None => false,
        };

        if empty && self.rooms.remove_if(room_id, |_, e| e.connections == 0).is_some() {
            info!("Room {} is empty, dropping it", room_id);
        }
    }

    pub fn contains(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
