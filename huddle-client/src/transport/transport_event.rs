use crate::media::RemoteTrack;
use huddle_core::IceCandidate;

/// Transport-level connectivity, independent of the signaling state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Events a media transport emits towards its owning peer session.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    CandidateGenerated(IceCandidate),
    NegotiationNeeded,
    ConnectivityChanged(Connectivity),
    TrackArrived(RemoteTrack),
}
