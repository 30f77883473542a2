use crate::error::SignalingError;
use async_trait::async_trait;
use huddle_core::{IceCandidate, ParticipantId};

/// Outbound half of negotiation: everything a peer session needs to reach
/// its remote counterpart through the room's signaling connection.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Send an SDP offer to a specific participant.
    async fn send_offer(&self, target: ParticipantId, sdp: String) -> Result<(), SignalingError>;

    /// Send an SDP answer to a specific participant.
    async fn send_answer(&self, target: ParticipantId, sdp: String)
    -> Result<(), SignalingError>;

    /// Send a local ICE candidate to a specific participant.
    async fn send_ice(
        &self,
        target: ParticipantId,
        candidate: IceCandidate,
    ) -> Result<(), SignalingError>;
}
