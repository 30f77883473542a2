use std::time::Duration;
use thiserror::Error;

/// Local capture could not be obtained.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediaAccessError {
    #[error("media access denied: {0}")]
    Denied(String),

    #[error("media device unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("signaling connection failed: {0}")]
    Connection(String),

    #[error("signaling channel is closed")]
    Closed,

    #[error("failed to encode signaling message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A description or candidate exchange the transport refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NegotiationError {
    #[error("session description rejected: {0}")]
    Description(String),

    #[error("ice candidate rejected: {0}")]
    Candidate(String),

    #[error("track operation failed: {0}")]
    Track(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("offer not answered within {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    #[error("connectivity lost for longer than {after:?}")]
    ConnectivityLost { after: Duration },

    #[error("transport connectivity failed")]
    Failed,

    #[error("transport closed by remote")]
    ClosedRemotely,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Media(#[from] MediaAccessError),

    #[error(transparent)]
    Signaling(#[from] SignalingError),

    #[error(transparent)]
    Negotiation(#[from] NegotiationError),

    #[error("no room snapshot within {0:?}")]
    SnapshotTimeout(Duration),

    #[error("session is closed")]
    Closed,
}
