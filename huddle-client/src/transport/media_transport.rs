use crate::error::NegotiationError;
use crate::media::LocalTrack;
use crate::transport::TransportEvent;
use async_trait::async_trait;
use huddle_core::{IceCandidate, ParticipantId};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
}

/// How a track replacement was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    /// Swapped in place on the existing sender; no renegotiation needed.
    Replaced,
    /// Added as a new sender; the session has to renegotiate.
    Added,
}

/// Point-to-point media transport to one remote participant.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Create an offer and set it as the local description.
    async fn create_offer(&self) -> Result<String, NegotiationError>;

    /// Create an answer to the applied remote offer and set it locally.
    async fn create_answer(&self) -> Result<String, NegotiationError>;

    async fn set_remote_description(
        &self,
        kind: SdpKind,
        sdp: String,
    ) -> Result<(), NegotiationError>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError>;

    async fn add_track(&self, track: Arc<LocalTrack>) -> Result<(), NegotiationError>;

    /// Swap the outgoing track of the same kind, adding one if none exists.
    async fn replace_track(
        &self,
        track: Arc<LocalTrack>,
    ) -> Result<ReplaceOutcome, NegotiationError>;

    async fn close(&self) -> Result<(), NegotiationError>;
}

/// Creates one transport per remote participant.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// `events` receives everything the transport reports for its lifetime.
    async fn create(
        &self,
        remote: &ParticipantId,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn MediaTransport>, NegotiationError>;
}
