use crate::peer::PeerState;
use huddle_core::{ChatMessage, MediaState, Participant, ParticipantId};
use std::collections::{BTreeMap, BTreeSet};

/// Read-only snapshot of a joined room, for rendering.
#[derive(Debug, Clone, Default)]
pub struct RoomView {
    pub participants: Vec<Participant>,
    pub chat: Vec<ChatMessage>,
    pub peers: BTreeMap<ParticipantId, PeerState>,
    pub unreachable: BTreeSet<ParticipantId>,
    pub local_media: MediaState,
    pub active_tracks: usize,
    pub connected: bool,
}

impl RoomView {
    pub fn participant(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == *id)
    }

    pub fn peer_state(&self, id: &ParticipantId) -> Option<PeerState> {
        self.peers.get(id).copied()
    }
}

/// What `leave` managed to clean up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub sessions_closed: usize,
    pub tracks_released: usize,
    pub channel_closed: bool,
}
