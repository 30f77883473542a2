use crate::error::{NegotiationError, TransportFailure};
use crate::media::RemoteTrack;
use crate::peer::PeerState;
use huddle_core::{IceCandidate, ParticipantId};
use std::fmt;

/// Inbound negotiation traffic for one session, in arrival order.
#[derive(Debug)]
pub enum PeerCommand {
    RemoteOffer { sdp: String },
    RemoteAnswer { sdp: String },
    RemoteCandidate { candidate: IceCandidate },
}

/// Which side opens the exchange when a session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// The participant became known from the roster; offer right away.
    Offer,
    /// Created for an unsolicited offer; wait for it and answer.
    Answer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerFailure {
    Negotiation(NegotiationError),
    Transport(TransportFailure),
}

impl fmt::Display for PeerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerFailure::Negotiation(e) => write!(f, "negotiation failed: {e}"),
            PeerFailure::Transport(e) => write!(f, "transport failed: {e}"),
        }
    }
}

/// Reports from session tasks to whoever owns the manager.
///
/// `epoch` identifies the session instance, so reports from a session that
/// has already been replaced can be told apart.
#[derive(Debug, Clone)]
pub enum PeerEvent {
    StateChanged {
        participant: ParticipantId,
        epoch: u64,
        state: PeerState,
    },
    RemoteTrack {
        participant: ParticipantId,
        epoch: u64,
        track: RemoteTrack,
    },
    Failed {
        participant: ParticipantId,
        epoch: u64,
        failure: PeerFailure,
    },
}

impl PeerEvent {
    pub fn participant(&self) -> &ParticipantId {
        match self {
            PeerEvent::StateChanged { participant, .. }
            | PeerEvent::RemoteTrack { participant, .. }
            | PeerEvent::Failed { participant, .. } => participant,
        }
    }

    pub fn epoch(&self) -> u64 {
        match self {
            PeerEvent::StateChanged { epoch, .. }
            | PeerEvent::RemoteTrack { epoch, .. }
            | PeerEvent::Failed { epoch, .. } => *epoch,
        }
    }
}
