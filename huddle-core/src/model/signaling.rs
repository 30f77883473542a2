use crate::model::chat::ChatMessage;
use crate::model::media::MediaState;
use crate::model::participant::{Participant, ParticipantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

/// A trickled connectivity candidate, in the shape browsers and `webrtc`
/// produce it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default)]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default)]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
            username_fragment: None,
        }
    }
}

/// Everything that travels over the room's signaling connection.
///
/// Negotiation messages (`Offer`, `Answer`, `IceCandidate`) name a `target`
/// and are delivered to that participant only. Everything else is room-wide.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalMessage {
    RoomSnapshot {
        participants: Vec<Participant>,
        chat_history: Vec<ChatMessage>,
    },
    ParticipantJoined {
        participant: Participant,
    },
    ParticipantLeft {
        participant_id: ParticipantId,
    },
    Offer {
        from: ParticipantId,
        target: ParticipantId,
        sdp: String,
    },
    Answer {
        from: ParticipantId,
        target: ParticipantId,
        sdp: String,
    },
    IceCandidate {
        from: ParticipantId,
        target: ParticipantId,
        candidate: IceCandidate,
    },
    MediaStateChanged {
        from: ParticipantId,
        state: MediaState,
    },
    ChatMessage {
        from: ParticipantId,
        content: String,
        timestamp: DateTime<Utc>,
    },
}

impl SignalMessage {
    /// Identity of the participant the message originates from.
    pub fn sender(&self) -> Option<&ParticipantId> {
        match self {
            SignalMessage::RoomSnapshot { .. } => None,
            SignalMessage::ParticipantJoined { participant } => Some(&participant.id),
            SignalMessage::ParticipantLeft { participant_id } => Some(participant_id),
            SignalMessage::Offer { from, .. }
            | SignalMessage::Answer { from, .. }
            | SignalMessage::IceCandidate { from, .. }
            | SignalMessage::MediaStateChanged { from, .. }
            | SignalMessage::ChatMessage { from, .. } => Some(from),
        }
    }

    pub fn target(&self) -> Option<&ParticipantId> {
        match self {
            SignalMessage::Offer { target, .. }
            | SignalMessage::Answer { target, .. }
            | SignalMessage::IceCandidate { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Overwrites the sender of a participant-originated message. Server-made
    /// messages are returned untouched.
    pub fn with_sender(mut self, sender: &ParticipantId) -> Self {
        match &mut self {
            SignalMessage::Offer { from, .. }
            | SignalMessage::Answer { from, .. }
            | SignalMessage::IceCandidate { from, .. }
            | SignalMessage::MediaStateChanged { from, .. }
            | SignalMessage::ChatMessage { from, .. } => *from = sender.clone(),
            _ => {}
        }
        self
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SignalMessage::RoomSnapshot { .. } => "room_snapshot",
            SignalMessage::ParticipantJoined { .. } => "participant_joined",
            SignalMessage::ParticipantLeft { .. } => "participant_left",
            SignalMessage::Offer { .. } => "offer",
            SignalMessage::Answer { .. } => "answer",
            SignalMessage::IceCandidate { .. } => "ice_candidate",
            SignalMessage::MediaStateChanged { .. } => "media_state_changed",
            SignalMessage::ChatMessage { .. } => "chat_message",
        }
    }
}

impl From<ChatMessage> for SignalMessage {
    fn from(msg: ChatMessage) -> Self {
        SignalMessage::ChatMessage {
            from: msg.from,
            content: msg.content,
            timestamp: msg.timestamp,
        }
    }
}
