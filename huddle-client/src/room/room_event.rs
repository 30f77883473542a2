use crate::media::RemoteTrack;
use crate::peer::PeerState;
use huddle_core::{ChatMessage, MediaState, Participant, ParticipantId};
use std::collections::HashSet;

/// What the reconciler asks of the peer session manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionDirective {
    Ensure(ParticipantId),
    Teardown(ParticipantId),
    /// Tear down every session not in the set.
    Retain(HashSet<ParticipantId>),
}

/// Notifications for the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    RosterReplaced {
        participants: Vec<Participant>,
    },
    ParticipantJoined(Participant),
    ParticipantLeft(ParticipantId),
    MediaStateChanged {
        participant: ParticipantId,
        state: MediaState,
    },
    ChatReceived(ChatMessage),
    PeerStateChanged {
        participant: ParticipantId,
        state: PeerState,
    },
    RemoteTrack {
        participant: ParticipantId,
        track: RemoteTrack,
    },
    Unreachable {
        participant: ParticipantId,
        reason: String,
    },
    Disconnected {
        reason: String,
    },
}

/// Result of applying one inbound message to the room state.
#[derive(Debug, Default, PartialEq)]
pub struct Reconciliation {
    pub directives: Vec<SessionDirective>,
    pub event: Option<RoomEvent>,
}
