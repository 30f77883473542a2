pub mod config;
pub mod error;
pub mod media;
pub mod peer;
pub mod room;
pub mod session;
pub mod signaling;
pub mod transport;

pub use config::{MediaConstraints, MediaPolicy, SessionConfig};
pub use error::{MediaAccessError, NegotiationError, SessionError, SignalingError, TransportFailure};
pub use media::{LocalMediaController, LocalTrack, LocalTrackSet, MediaDevices, VirtualDevices};
pub use peer::{PeerEvent, PeerSessionManager, PeerState};
pub use room::{RoomEvent, RoomState};
pub use session::{RoomView, SessionController, SessionHandle, TeardownReport};
pub use signaling::{ChannelEvent, SignalingChannel, SignalingOutput};
pub use transport::{MediaTransport, RtcTransportFactory, TransportEvent, TransportFactory};
