use crate::config::ServerConfig;
use crate::room::RoomManager;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared state handed to every WebSocket handler.
#[derive(Clone)]
pub struct RelayState {
    pub rooms: RoomManager,
    next_connection: Arc<AtomicU64>,
}

impl RelayState {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            rooms: RoomManager::new(config.chat_history_limit),
            next_connection: Arc::new(AtomicU64::new(1)),
        }
    }

    pub(crate) fn next_connection_id(&self) -> u64 {
        self.next_connection.fetch_add(1, Ordering::Relaxed)
    }
}
