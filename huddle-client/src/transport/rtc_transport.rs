use crate::error::NegotiationError;
use crate::media::{LocalTrack, RemoteTrack, TrackKind};
use crate::transport::{
    Connectivity, MediaTransport, ReplaceOutcome, SdpKind, TransportEvent, TransportFactory,
};
use async_trait::async_trait;
use huddle_core::{IceCandidate, IceServerConfig, ParticipantId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

const LOCAL_STREAM_ID: &str = "huddle-local";

/// Builds [`RtcTransport`]s sharing one ICE server configuration.
#[derive(Clone, Default)]
pub struct RtcTransportFactory {
    ice_servers: Vec<IceServerConfig>,
}

impl RtcTransportFactory {
    pub fn new(ice_servers: Vec<IceServerConfig>) -> Self {
        Self { ice_servers }
    }
}

#[async_trait]
impl TransportFactory for RtcTransportFactory {
    async fn create(
        &self,
        remote: &ParticipantId,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn MediaTransport>, NegotiationError> {
        let transport = RtcTransport::new(remote.clone(), &self.ice_servers, events).await?;
        Ok(Box::new(transport))
    }
}

/// [`MediaTransport`] backed by a `webrtc` peer connection.
pub struct RtcTransport {
    remote: ParticipantId,
    peer_connection: Arc<RTCPeerConnection>,
    senders: Mutex<HashMap<TrackKind, Arc<RTCRtpSender>>>,
}

impl RtcTransport {
    /// Sets up the peer connection; every callback reports into `event_tx`.
    pub async fn new(
        remote: ParticipantId,
        ice_servers: &[IceServerConfig],
        event_tx: mpsc::Sender<TransportEvent>,
    ) -> Result<Self, NegotiationError> {
        let mut m = MediaEngine::default();
        m.register_default_codecs().map_err(transport_err)?;
        let registry =
            register_default_interceptors(Registry::new(), &mut m).map_err(transport_err)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers
                .iter()
                .map(|s| RTCIceServer {
                    urls: s.urls.clone(),
                    username: s.username.clone().unwrap_or_default(),
                    credential: s.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .map_err(transport_err)?,
        );

        let state_tx = event_tx.clone();
        let uid_state = remote.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                let uid = uid_state.clone();

                Box::pin(async move {
                    info!(participant = %uid, state = %s, "Peer connection state changed");
                    let connectivity = match s {
                        RTCPeerConnectionState::Connecting => Connectivity::Connecting,
                        RTCPeerConnectionState::Connected => Connectivity::Connected,
                        RTCPeerConnectionState::Disconnected => Connectivity::Disconnected,
                        RTCPeerConnectionState::Failed => Connectivity::Failed,
                        RTCPeerConnectionState::Closed => Connectivity::Closed,
                        _ => Connectivity::New,
                    };
                    let _ = tx
                        .send(TransportEvent::ConnectivityChanged(connectivity))
                        .await;
                })
            },
        ));

        let ice_tx = event_tx.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let candidate = IceCandidate {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                    username_fragment: init.username_fragment,
                };
                let _ = tx.send(TransportEvent::CandidateGenerated(candidate)).await;
            })
        }));

        let nego_tx = event_tx.clone();
        peer_connection.on_negotiation_needed(Box::new(move || {
            let tx = nego_tx.clone();
            Box::pin(async move {
                let _ = tx.send(TransportEvent::NegotiationNeeded).await;
            })
        }));

        let track_tx = event_tx;
        let uid_track = remote.clone();
        peer_connection.on_track(Box::new(move |track, _receiver, _transceiver| {
            let tx = track_tx.clone();
            let uid = uid_track.clone();

            Box::pin(async move {
                let kind = match track.kind() {
                    RTPCodecType::Audio => TrackKind::Audio,
                    _ => TrackKind::Video,
                };
                let remote_track = RemoteTrack {
                    id: track.id(),
                    stream_id: track.stream_id(),
                    kind,
                };
                debug!(participant = %uid, track = %remote_track.id, %kind, "Remote track arrived");
                let _ = tx.send(TransportEvent::TrackArrived(remote_track)).await;
            })
        }));

        Ok(Self {
            remote,
            peer_connection,
            senders: Mutex::new(HashMap::new()),
        })
    }

    pub fn remote(&self) -> &ParticipantId {
        &self.remote
    }

    fn sample_track(track: &LocalTrack) -> Arc<TrackLocalStaticSample> {
        let mime_type = match track.kind() {
            TrackKind::Audio => MIME_TYPE_OPUS,
            TrackKind::Video => MIME_TYPE_VP8,
        };
        Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: mime_type.to_owned(),
                ..Default::default()
            },
            track.id().to_owned(),
            LOCAL_STREAM_ID.to_owned(),
        ))
    }
}

#[async_trait]
impl MediaTransport for RtcTransport {
    async fn create_offer(&self) -> Result<String, NegotiationError> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(description_err)?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await
            .map_err(description_err)?;
        Ok(offer.sdp)
    }

    async fn create_answer(&self) -> Result<String, NegotiationError> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .map_err(description_err)?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await
            .map_err(description_err)?;
        Ok(answer.sdp)
    }

    async fn set_remote_description(
        &self,
        kind: SdpKind,
        sdp: String,
    ) -> Result<(), NegotiationError> {
        let desc = match kind {
            SdpKind::Offer => RTCSessionDescription::offer(sdp),
            SdpKind::Answer => RTCSessionDescription::answer(sdp),
        }
        .map_err(description_err)?;
        self.peer_connection
            .set_remote_description(desc)
            .await
            .map_err(description_err)
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: candidate.username_fragment,
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .map_err(|e| NegotiationError::Candidate(e.to_string()))
    }

    async fn add_track(&self, track: Arc<LocalTrack>) -> Result<(), NegotiationError> {
        let rtc_track = Self::sample_track(&track);
        let sender = self
            .peer_connection
            .add_track(rtc_track as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(track_err)?;

        // RTCP has to be read for interceptors to work.
        let rtcp_sender = Arc::clone(&sender);
        tokio::spawn(async move {
            let mut rtcp_buf = vec![0u8; 1500];
            while let Ok((_, _)) = rtcp_sender.read(&mut rtcp_buf).await {}
        });

        self.senders.lock().await.insert(track.kind(), sender);
        Ok(())
    }

    async fn replace_track(
        &self,
        track: Arc<LocalTrack>,
    ) -> Result<ReplaceOutcome, NegotiationError> {
        let existing = self.senders.lock().await.get(&track.kind()).cloned();
        let Some(sender) = existing else {
            self.add_track(track).await?;
            return Ok(ReplaceOutcome::Added);
        };

        let rtc_track = Self::sample_track(&track);
        sender
            .replace_track(Some(rtc_track as Arc<dyn TrackLocal + Send + Sync>))
            .await
            .map_err(track_err)?;
        Ok(ReplaceOutcome::Replaced)
    }

    async fn close(&self) -> Result<(), NegotiationError> {
        self.peer_connection.close().await.map_err(transport_err)
    }
}

fn transport_err(e: webrtc::Error) -> NegotiationError {
    NegotiationError::Transport(e.to_string())
}

fn description_err(e: webrtc::Error) -> NegotiationError {
    NegotiationError::Description(e.to_string())
}

fn track_err(e: webrtc::Error) -> NegotiationError {
    NegotiationError::Track(e.to_string())
}
