use huddle_core::utils::CHAT_HISTORY_LIMIT;
use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Chat messages kept per room and replayed to newcomers.
    pub chat_history_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            chat_history_limit: CHAT_HISTORY_LIMIT,
        }
    }
}
