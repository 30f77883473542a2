mod chat;
mod media;
mod participant;
mod room;
mod signaling;

pub use chat::ChatMessage;
pub use media::MediaState;
pub use participant::{Participant, ParticipantId};
pub use room::RoomId;
pub use signaling::{IceCandidate, IceServerConfig, SignalMessage};
