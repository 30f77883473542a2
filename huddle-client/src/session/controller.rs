use crate::config::{MediaConstraints, MediaPolicy, SessionConfig};
use crate::error::{MediaAccessError, SessionError, SignalingError};
use crate::media::{LocalMediaController, MediaDevices, TrackKind};
use crate::peer::{PeerEvent, PeerSessionManager};
use crate::room::{Reconciliation, RoomEvent, RoomState, SessionDirective};
use crate::session::{Intent, RoomView, TeardownReport};
use crate::signaling::{ChannelEvent, SignalingChannel, SignalingOutput};
use crate::transport::TransportFactory;
use huddle_core::{ChatMessage, MediaState, Participant, ParticipantId, RoomId, SignalMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

const INTENT_BUFFER: usize = 64;

/// Composition root of a joined room.
///
/// Owns the signaling channel, local media, peer sessions and room state,
/// and drives them from a single task that reacts to UI intents, inbound
/// signaling and peer session reports.
pub struct SessionController {
    me: ParticipantId,
    devices: Arc<dyn MediaDevices>,
    media: LocalMediaController,
    media_policy: MediaPolicy,
    local_state: MediaState,
    channel: SignalingChannel,
    inbound: mpsc::UnboundedReceiver<ChannelEvent>,
    room: RoomState,
    peers: PeerSessionManager,
    peer_events: mpsc::UnboundedReceiver<PeerEvent>,
    intents: mpsc::Receiver<Intent>,
    events: mpsc::UnboundedSender<RoomEvent>,
    view: watch::Sender<RoomView>,
    torn_down: bool,
}

impl SessionController {
    /// Acquires media, connects, waits for the room snapshot and starts the
    /// controller task.
    ///
    /// Anything acquired before a failing step is released again.
    pub async fn join(
        config: SessionConfig,
        room: RoomId,
        me: Participant,
        devices: Arc<dyn MediaDevices>,
        factory: Arc<dyn TransportFactory>,
    ) -> Result<(SessionHandle, mpsc::UnboundedReceiver<RoomEvent>), SessionError> {
        info!(room = %room, participant = %me.id, "Joining room");

        let media = match LocalMediaController::acquire(devices.as_ref(), config.constraints).await
        {
            Ok(media) => media,
            Err(e) if config.media_policy == MediaPolicy::ContinueWithout => {
                warn!("Joining without local media: {}", e);
                LocalMediaController::empty()
            }
            Err(e) => return Err(e.into()),
        };

        let (channel, mut inbound) =
            SignalingChannel::connect(&config.signaling_url, &room, &me).await?;

        let (snapshot, early) = match await_snapshot(&mut inbound, config.snapshot_timeout).await {
            Ok(received) => received,
            Err(e) => {
                channel.close().await;
                return Err(e);
            }
        };

        let local_state = MediaState {
            camera_on: media.is_enabled(TrackKind::Video),
            mic_on: media.is_enabled(TrackKind::Audio),
            screen_sharing: false,
        };
        let signaling: Arc<dyn SignalingOutput> = Arc::new(channel.clone());
        let (peers, peer_events) = PeerSessionManager::new(
            me.id.clone(),
            factory,
            signaling,
            media.subscribe(),
            &config,
        );
        let (intents_tx, intents_rx) = mpsc::channel(INTENT_BUFFER);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(RoomView::default());

        let mut controller = SessionController {
            me: me.id.clone(),
            devices,
            media,
            media_policy: config.media_policy,
            local_state,
            channel,
            inbound,
            room: RoomState::new(room, me.id.clone()),
            peers,
            peer_events,
            intents: intents_rx,
            events: events_tx,
            view: view_tx,
            torn_down: false,
        };

        controller.dispatch(snapshot).await;
        for msg in early {
            controller.dispatch(msg).await;
        }
        controller.announce_media_state();
        controller.publish_view();

        tokio::spawn(controller.run());

        let handle = SessionHandle {
            me: me.id,
            intents: intents_tx,
            view: view_rx,
        };
        Ok((handle, events_rx))
    }

    async fn run(mut self) {
        info!(room = %self.room.room(), "Session event loop started");

        loop {
            tokio::select! {
                intent = self.intents.recv() => match intent {
                    Some(intent) => {
                        if !self.handle_intent(intent).await {
                            break;
                        }
                    }
                    None => {
                        info!("All session handles dropped, leaving room");
                        self.teardown().await;
                        break;
                    }
                },

                evt = self.inbound.recv() => match evt {
                    Some(ChannelEvent::Message(msg)) => self.dispatch(msg).await,
                    Some(ChannelEvent::Closed { reason }) => {
                        warn!(%reason, "Signaling channel closed, tearing down room");
                        self.teardown().await;
                        self.emit(RoomEvent::Disconnected { reason });
                        break;
                    }
                    None => {
                        self.teardown().await;
                        self.emit(RoomEvent::Disconnected {
                            reason: "signaling channel dropped".to_owned(),
                        });
                        break;
                    }
                },

                Some(evt) = self.peer_events.recv() => self.handle_peer_event(evt).await,
            }

            self.publish_view();
        }

        self.publish_view();
        info!("Session event loop finished");
    }

    async fn dispatch(&mut self, msg: SignalMessage) {
        match msg {
            SignalMessage::Offer { .. }
            | SignalMessage::Answer { .. }
            | SignalMessage::IceCandidate { .. } => self.peers.handle_signal(msg),
            other => {
                let Reconciliation { directives, event } =
                    self.room.apply(&other, self.media_ready());
                for directive in directives {
                    self.apply_directive(directive).await;
                }
                if let Some(event) = event {
                    self.emit(event);
                }
            }
        }
    }

    /// Sessions are only started while local tracks are held, or when the
    /// room was joined receive-only.
    fn media_ready(&self) -> bool {
        !self.torn_down
            && (self.media.active_track_count() > 0
                || self.media_policy == MediaPolicy::ContinueWithout)
    }

    async fn apply_directive(&mut self, directive: SessionDirective) {
        match directive {
            SessionDirective::Ensure(id) => {
                if self.peers.ensure_session(&id) {
                    debug!(participant = %id, "Peer session created");
                }
            }
            SessionDirective::Teardown(id) => {
                self.peers.close(&id).await;
            }
            SessionDirective::Retain(keep) => {
                let closed = self.peers.retain(&keep).await;
                if closed > 0 {
                    info!(closed, "Dropped sessions for participants no longer present");
                }
            }
        }
    }

    async fn handle_peer_event(&mut self, event: PeerEvent) {
        let Some(event) = self.peers.handle_event(event).await else {
            return;
        };

        match event {
            PeerEvent::StateChanged {
                participant, state, ..
            } => self.emit(RoomEvent::PeerStateChanged { participant, state }),
            PeerEvent::RemoteTrack {
                participant, track, ..
            } => self.emit(RoomEvent::RemoteTrack { participant, track }),
            PeerEvent::Failed {
                participant,
                failure,
                ..
            } => {
                self.room.mark_unreachable(&participant);
                self.emit(RoomEvent::Unreachable {
                    participant,
                    reason: failure.to_string(),
                });
            }
        }
    }

    /// Returns `false` once the room has been left.
    async fn handle_intent(&mut self, intent: Intent) -> bool {
        match intent {
            Intent::ToggleCamera { reply } => {
                let _ = reply.send(self.toggle(TrackKind::Video));
            }
            Intent::ToggleMic { reply } => {
                let _ = reply.send(self.toggle(TrackKind::Audio));
            }
            Intent::ToggleScreenShare { reply } => {
                let _ = reply.send(self.toggle_screen_share().await);
            }
            Intent::SendChat { content, reply } => {
                let _ = reply.send(self.send_chat(&content));
            }
            Intent::Leave { reply } => {
                let _ = reply.send(self.teardown().await);
                return false;
            }
        }
        true
    }

    fn toggle(&mut self, kind: TrackKind) -> Result<bool, SessionError> {
        // While sharing, the outgoing video track is the screen; the camera
        // setting only applies once the camera is back.
        if kind == TrackKind::Video && self.local_state.screen_sharing {
            self.local_state.camera_on = !self.local_state.camera_on;
            self.announce_media_state();
            return Ok(self.local_state.camera_on);
        }

        let enabled = !self.media.is_enabled(kind);
        if !self.media.set_enabled(kind, enabled) {
            return Err(MediaAccessError::Unavailable(format!("no local {kind} track")).into());
        }

        match kind {
            TrackKind::Video => self.local_state.camera_on = enabled,
            TrackKind::Audio => self.local_state.mic_on = enabled,
        }
        self.announce_media_state();
        Ok(enabled)
    }

    async fn toggle_screen_share(&mut self) -> Result<bool, SessionError> {
        let sharing = !self.local_state.screen_sharing;

        let next = if sharing {
            self.devices.display_media().await?
        } else {
            let camera_only = MediaConstraints {
                audio: false,
                video: true,
            };
            self.devices
                .user_media(camera_only)
                .await?
                .video
                .ok_or_else(|| MediaAccessError::Unavailable("no camera track".to_owned()))?
        };

        if let Some(old) = self.media.replace_video_source(next) {
            old.stop();
        }
        self.media
            .set_enabled(TrackKind::Video, sharing || self.local_state.camera_on);

        self.local_state.screen_sharing = sharing;
        info!(sharing, "Screen share toggled");
        self.announce_media_state();
        Ok(sharing)
    }

    fn send_chat(&self, content: &str) -> Result<(), SessionError> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(());
        }
        self.channel
            .send(ChatMessage::new(self.me.clone(), content).into())?;
        Ok(())
    }

    fn announce_media_state(&self) {
        let msg = SignalMessage::MediaStateChanged {
            from: self.me.clone(),
            state: self.local_state,
        };
        if let Err(e) = self.channel.send(msg) {
            warn!("Failed to announce media state: {}", e);
        }
    }

    /// Closes sessions, releases tracks, then closes the channel.
    async fn teardown(&mut self) -> TeardownReport {
        if self.torn_down {
            return TeardownReport::default();
        }
        self.torn_down = true;

        let sessions_closed = self.peers.close_all().await;
        let tracks_released = self.media.release();
        self.channel.close().await;

        let report = TeardownReport {
            sessions_closed,
            tracks_released,
            channel_closed: self.channel.is_closed(),
        };
        info!(?report, "Left room");
        report
    }

    fn emit(&self, event: RoomEvent) {
        let _ = self.events.send(event);
    }

    fn publish_view(&self) {
        self.view.send_replace(RoomView {
            participants: self.room.participants().cloned().collect(),
            chat: self.room.chat().to_vec(),
            peers: self.peers.states(),
            unreachable: self.room.unreachable().clone(),
            local_media: self.local_state,
            active_tracks: self.media.active_track_count(),
            connected: !self.torn_down,
        });
    }
}

/// Waits for the room snapshot, keeping whatever arrives before it.
async fn await_snapshot(
    inbound: &mut mpsc::UnboundedReceiver<ChannelEvent>,
    timeout: Duration,
) -> Result<(SignalMessage, Vec<SignalMessage>), SessionError> {
    let mut early = Vec::new();

    let wait = async {
        loop {
            match inbound.recv().await {
                Some(ChannelEvent::Message(msg @ SignalMessage::RoomSnapshot { .. })) => {
                    return Ok(msg);
                }
                Some(ChannelEvent::Message(msg)) => {
                    debug!(kind = msg.kind(), "Holding message until snapshot arrives");
                    early.push(msg);
                }
                Some(ChannelEvent::Closed { reason }) => {
                    warn!(%reason, "Signaling closed before room snapshot");
                    return Err(SessionError::Signaling(SignalingError::Closed));
                }
                None => return Err(SessionError::Signaling(SignalingError::Closed)),
            }
        }
    };

    match tokio::time::timeout(timeout, wait).await {
        Ok(Ok(snapshot)) => Ok((snapshot, early)),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(SessionError::SnapshotTimeout(timeout)),
    }
}

/// Cloneable front end of a joined room.
#[derive(Clone)]
pub struct SessionHandle {
    me: ParticipantId,
    intents: mpsc::Sender<Intent>,
    view: watch::Receiver<RoomView>,
}

impl SessionHandle {
    pub fn me(&self) -> &ParticipantId {
        &self.me
    }

    /// Returns whether the camera is on afterwards.
    pub async fn toggle_camera(&self) -> Result<bool, SessionError> {
        self.request(|reply| Intent::ToggleCamera { reply }).await?
    }

    /// Returns whether the microphone is on afterwards.
    pub async fn toggle_mic(&self) -> Result<bool, SessionError> {
        self.request(|reply| Intent::ToggleMic { reply }).await?
    }

    /// Returns whether the screen is being shared afterwards.
    pub async fn toggle_screen_share(&self) -> Result<bool, SessionError> {
        self.request(|reply| Intent::ToggleScreenShare { reply })
            .await?
    }

    pub async fn send_chat(&self, content: impl Into<String>) -> Result<(), SessionError> {
        let content = content.into();
        self.request(|reply| Intent::SendChat { content, reply })
            .await?
    }

    pub async fn leave(&self) -> Result<TeardownReport, SessionError> {
        self.request(|reply| Intent::Leave { reply }).await
    }

    pub fn room_view(&self) -> RoomView {
        self.view.borrow().clone()
    }

    pub fn watch_view(&self) -> watch::Receiver<RoomView> {
        self.view.clone()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Intent,
    ) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.intents
            .send(make(reply))
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }
}
