pub mod model;

pub use model::{
    ChatMessage, IceCandidate, IceServerConfig, MediaState, Participant, ParticipantId, RoomId,
    SignalMessage,
};

pub mod utils {
    pub const DEFAULT_STUN_ADDR: &str = "stun:stun.l.google.com:19302";
    pub const DEFAULT_STUN_ADDR_2: &str = "stun:stun1.l.google.com:19302";

    /// Number of chat messages the relay keeps and replays in a snapshot.
    pub const CHAT_HISTORY_LIMIT: usize = 100;
}
