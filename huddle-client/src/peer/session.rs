use crate::error::{NegotiationError, SignalingError, TransportFailure};
use crate::media::{LocalTrackSet, TrackKind};
use crate::peer::{PeerCommand, PeerEvent, PeerFailure, PeerState, SessionMode};
use crate::signaling::SignalingOutput;
use crate::transport::{
    Connectivity, MediaTransport, ReplaceOutcome, SdpKind, TransportEvent, TransportFactory,
};
use huddle_core::{IceCandidate, ParticipantId};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const TRANSPORT_EVENT_BUFFER: usize = 256;

/// Everything a session task needs; assembled by the manager.
pub(crate) struct SessionSetup {
    pub local: ParticipantId,
    pub remote: ParticipantId,
    pub epoch: u64,
    pub mode: SessionMode,
    pub factory: Arc<dyn TransportFactory>,
    pub signaling: Arc<dyn SignalingOutput>,
    pub tracks: watch::Receiver<LocalTrackSet>,
    pub commands: mpsc::UnboundedReceiver<PeerCommand>,
    pub events: mpsc::UnboundedSender<PeerEvent>,
    pub state: watch::Sender<PeerState>,
    pub cancel: CancellationToken,
    pub connectivity_timeout: Duration,
    pub negotiation_timeout: Duration,
}

/// Why a handler stopped early.
enum Interrupt {
    Cancelled,
    Negotiation(NegotiationError),
}

/// Negotiation state machine for a single remote participant.
///
/// Runs as its own task: commands, transport events and local track changes
/// are handled one at a time, so handlers never overlap. Every await inside a
/// handler is raced against the session's cancellation token.
struct PeerSession {
    local: ParticipantId,
    remote: ParticipantId,
    epoch: u64,
    factory: Arc<dyn TransportFactory>,
    transport: Box<dyn MediaTransport>,
    signaling: Arc<dyn SignalingOutput>,
    tracks: watch::Receiver<LocalTrackSet>,
    tracks_open: bool,
    attached: HashMap<TrackKind, String>,
    commands: mpsc::UnboundedReceiver<PeerCommand>,
    transport_events: mpsc::Receiver<TransportEvent>,
    transport_open: bool,
    events: mpsc::UnboundedSender<PeerEvent>,
    state: PeerState,
    state_tx: watch::Sender<PeerState>,
    remote_description_set: bool,
    pending_ice_candidates: VecDeque<IceCandidate>,
    renegotiate_when_stable: bool,
    disconnected_deadline: Option<Instant>,
    connectivity_timeout: Duration,
    offer_deadline: Option<Instant>,
    negotiation_timeout: Duration,
    cancel: CancellationToken,
}

pub(crate) async fn run_session(setup: SessionSetup) {
    let SessionSetup {
        local,
        remote,
        epoch,
        mode,
        factory,
        signaling,
        tracks,
        commands,
        events,
        state,
        cancel,
        connectivity_timeout,
        negotiation_timeout,
    } = setup;

    let (transport, transport_rx) = match open_transport(&cancel, factory.as_ref(), &remote).await
    {
        Err(Interrupt::Cancelled) => {
            state.send_replace(PeerState::Closed);
            return;
        }
        Ok(opened) => opened,
        Err(Interrupt::Negotiation(e)) => {
            warn!(participant = %remote, "Failed to create transport: {}", e);
            state.send_replace(PeerState::Failed);
            let _ = events.send(PeerEvent::StateChanged {
                participant: remote.clone(),
                epoch,
                state: PeerState::Failed,
            });
            let _ = events.send(PeerEvent::Failed {
                participant: remote,
                epoch,
                failure: PeerFailure::Negotiation(e),
            });
            return;
        }
    };

    let session = PeerSession {
        local,
        remote,
        epoch,
        factory,
        transport,
        signaling,
        tracks,
        tracks_open: true,
        attached: HashMap::new(),
        commands,
        transport_events: transport_rx,
        transport_open: true,
        events,
        state: PeerState::New,
        state_tx: state,
        remote_description_set: false,
        pending_ice_candidates: VecDeque::new(),
        renegotiate_when_stable: false,
        disconnected_deadline: None,
        connectivity_timeout,
        offer_deadline: None,
        negotiation_timeout,
        cancel,
    };
    session.run(mode).await;
}

impl PeerSession {
    async fn run(mut self, mode: SessionMode) {
        debug!(participant = %self.remote, epoch = self.epoch, ?mode, "Peer session started");

        let started = self.start(mode).await;
        self.settle(started);

        while !self.state.is_terminal() {
            let deadline = self.disconnected_deadline;
            let offer_deadline = self.offer_deadline;

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => {
                        let outcome = self.handle_command(cmd).await;
                        self.settle(outcome);
                    }
                    None => break,
                },

                evt = self.transport_events.recv(), if self.transport_open => match evt {
                    Some(evt) => {
                        let outcome = self.handle_transport_event(evt).await;
                        self.settle(outcome);
                    }
                    None => self.transport_open = false,
                },

                changed = self.tracks.changed(), if self.tracks_open => match changed {
                    Ok(()) => {
                        let outcome = self.sync_tracks().await;
                        self.settle(outcome);
                    }
                    Err(_) => self.tracks_open = false,
                },

                _ = sleep_until_deadline(deadline) => {
                    self.fail(PeerFailure::Transport(TransportFailure::ConnectivityLost {
                        after: self.connectivity_timeout,
                    }));
                }

                _ = sleep_until_deadline(offer_deadline) => {
                    warn!(participant = %self.remote, "No answer to local offer");
                    self.fail(PeerFailure::Negotiation(NegotiationError::Timeout(
                        self.negotiation_timeout,
                    )));
                }
            }
        }

        self.finish().await;
    }

    async fn start(&mut self, mode: SessionMode) -> Result<(), Interrupt> {
        let initial = self.tracks.borrow_and_update().clone();
        for track in initial.iter() {
            guarded(&self.cancel, self.transport.add_track(Arc::clone(track))).await?;
            self.attached.insert(track.kind(), track.id().to_owned());
        }

        match mode {
            SessionMode::Offer => self.make_offer().await,
            SessionMode::Answer => Ok(()),
        }
    }

    async fn handle_command(&mut self, cmd: PeerCommand) -> Result<(), Interrupt> {
        match cmd {
            PeerCommand::RemoteOffer { sdp } => self.on_remote_offer(sdp).await,
            PeerCommand::RemoteAnswer { sdp } => self.on_remote_answer(sdp).await,
            PeerCommand::RemoteCandidate { candidate } => self.on_remote_candidate(candidate).await,
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) -> Result<(), Interrupt> {
        match event {
            TransportEvent::CandidateGenerated(candidate) => {
                self.signal(
                    "candidate",
                    self.signaling.send_ice(self.remote.clone(), candidate),
                )
                .await
            }

            TransportEvent::NegotiationNeeded => {
                if self.state == PeerState::Connected {
                    info!(participant = %self.remote, "Renegotiating");
                    self.make_offer().await
                } else {
                    debug!(participant = %self.remote, state = %self.state, "Negotiation already under way");
                    Ok(())
                }
            }

            TransportEvent::ConnectivityChanged(connectivity) => {
                self.on_connectivity(connectivity);
                Ok(())
            }

            TransportEvent::TrackArrived(track) => {
                let _ = self.events.send(PeerEvent::RemoteTrack {
                    participant: self.remote.clone(),
                    epoch: self.epoch,
                    track,
                });
                Ok(())
            }
        }
    }

    async fn make_offer(&mut self) -> Result<(), Interrupt> {
        let sdp = guarded(&self.cancel, self.transport.create_offer()).await?;
        self.set_state(PeerState::OfferPending);
        self.offer_deadline = Some(Instant::now() + self.negotiation_timeout);
        self.signal(
            "offer",
            self.signaling.send_offer(self.remote.clone(), sdp),
        )
        .await
    }

    /// Discards the local offer by swapping in a fresh transport.
    ///
    /// Current local tracks are attached to the new transport. Buffered
    /// remote candidates are kept; events still queued from the old
    /// transport are dropped with its channel.
    async fn replace_transport(&mut self) -> Result<(), Interrupt> {
        let (transport, events) =
            open_transport(&self.cancel, self.factory.as_ref(), &self.remote).await?;
        let old = std::mem::replace(&mut self.transport, transport);
        self.transport_events = events;
        self.transport_open = true;
        self.remote_description_set = false;
        self.disconnected_deadline = None;

        if let Err(e) = old.close().await {
            warn!(participant = %self.remote, "Failed to close replaced transport: {}", e);
        }

        self.attached.clear();
        let current = self.tracks.borrow_and_update().clone();
        for track in current.iter() {
            guarded(&self.cancel, self.transport.add_track(Arc::clone(track))).await?;
            self.attached.insert(track.kind(), track.id().to_owned());
        }
        debug!(participant = %self.remote, tracks = self.attached.len(), "Transport replaced");
        Ok(())
    }

    async fn on_remote_offer(&mut self, sdp: String) -> Result<(), Interrupt> {
        if self.state == PeerState::OfferPending {
            if !self.is_polite() {
                info!(participant = %self.remote, "Offer collision, keeping local offer");
                return Ok(());
            }
            info!(participant = %self.remote, "Offer collision, dropping local offer");
            self.replace_transport().await?;
        }

        self.set_state(PeerState::AnswerPending);
        guarded(
            &self.cancel,
            self.transport.set_remote_description(SdpKind::Offer, sdp),
        )
        .await?;
        self.remote_description_set = true;
        self.flush_candidates().await?;

        let answer = guarded(&self.cancel, self.transport.create_answer()).await?;
        self.signal(
            "answer",
            self.signaling.send_answer(self.remote.clone(), answer),
        )
        .await?;

        self.set_state(PeerState::Connected);
        self.on_stable().await
    }

    async fn on_remote_answer(&mut self, sdp: String) -> Result<(), Interrupt> {
        if self.state != PeerState::OfferPending {
            warn!(participant = %self.remote, state = %self.state, "Ignoring unexpected answer");
            return Ok(());
        }

        guarded(
            &self.cancel,
            self.transport.set_remote_description(SdpKind::Answer, sdp),
        )
        .await?;
        self.remote_description_set = true;
        self.flush_candidates().await?;

        self.set_state(PeerState::Connected);
        self.on_stable().await
    }

    async fn on_remote_candidate(&mut self, candidate: IceCandidate) -> Result<(), Interrupt> {
        if !self.remote_description_set {
            self.pending_ice_candidates.push_back(candidate);
            debug!(
                participant = %self.remote,
                buffered = self.pending_ice_candidates.len(),
                "Buffering candidate until remote description is set"
            );
            return Ok(());
        }
        self.apply_candidate(candidate).await
    }

    async fn flush_candidates(&mut self) -> Result<(), Interrupt> {
        while let Some(candidate) = self.pending_ice_candidates.pop_front() {
            self.apply_candidate(candidate).await?;
        }
        Ok(())
    }

    async fn apply_candidate(&self, candidate: IceCandidate) -> Result<(), Interrupt> {
        match guarded(&self.cancel, self.transport.add_ice_candidate(candidate)).await {
            Err(Interrupt::Negotiation(e)) => {
                warn!(participant = %self.remote, "Ignoring unusable candidate: {}", e);
                Ok(())
            }
            other => other,
        }
    }

    async fn sync_tracks(&mut self) -> Result<(), Interrupt> {
        let current = self.tracks.borrow_and_update().clone();
        let mut needs_offer = false;

        for track in current.iter() {
            if self.attached.get(&track.kind()).map(String::as_str) == Some(track.id()) {
                continue;
            }
            let outcome =
                guarded(&self.cancel, self.transport.replace_track(Arc::clone(track))).await?;
            info!(participant = %self.remote, track = track.id(), ?outcome, "Outgoing track updated");
            self.attached.insert(track.kind(), track.id().to_owned());
            needs_offer |= outcome == ReplaceOutcome::Added;
        }

        if !needs_offer {
            return Ok(());
        }
        if self.state == PeerState::Connected {
            self.make_offer().await
        } else {
            self.renegotiate_when_stable = true;
            Ok(())
        }
    }

    async fn on_stable(&mut self) -> Result<(), Interrupt> {
        if std::mem::take(&mut self.renegotiate_when_stable) {
            self.make_offer().await
        } else {
            Ok(())
        }
    }

    fn on_connectivity(&mut self, connectivity: Connectivity) {
        match connectivity {
            Connectivity::Connected => {
                if self.disconnected_deadline.take().is_some() {
                    info!(participant = %self.remote, "Connectivity restored");
                }
            }
            Connectivity::Disconnected => {
                if self.disconnected_deadline.is_none() {
                    warn!(participant = %self.remote, "Connectivity lost, waiting for recovery");
                    self.disconnected_deadline = Some(Instant::now() + self.connectivity_timeout);
                }
            }
            Connectivity::Failed => self.fail(PeerFailure::Transport(TransportFailure::Failed)),
            Connectivity::Closed => {
                self.fail(PeerFailure::Transport(TransportFailure::ClosedRemotely))
            }
            Connectivity::New | Connectivity::Connecting => {}
        }
    }

    /// The smaller id yields on offer collisions.
    fn is_polite(&self) -> bool {
        self.local < self.remote
    }

    async fn signal<F>(&self, what: &'static str, send: F) -> Result<(), Interrupt>
    where
        F: Future<Output = Result<(), SignalingError>>,
    {
        match cancellable(&self.cancel, send).await {
            None => Err(Interrupt::Cancelled),
            Some(Err(e)) => {
                warn!(participant = %self.remote, "Failed to send {}: {}", what, e);
                Ok(())
            }
            Some(Ok(())) => Ok(()),
        }
    }

    fn settle(&mut self, outcome: Result<(), Interrupt>) {
        if let Err(Interrupt::Negotiation(e)) = outcome {
            self.fail(PeerFailure::Negotiation(e));
        }
    }

    fn set_state(&mut self, state: PeerState) {
        if self.state == state {
            return;
        }
        debug!(participant = %self.remote, from = %self.state, to = %state, "Peer state changed");
        if state != PeerState::OfferPending {
            self.offer_deadline = None;
        }
        self.state = state;
        self.state_tx.send_replace(state);
        let _ = self.events.send(PeerEvent::StateChanged {
            participant: self.remote.clone(),
            epoch: self.epoch,
            state,
        });
    }

    fn fail(&mut self, failure: PeerFailure) {
        if self.state.is_terminal() {
            return;
        }
        warn!(participant = %self.remote, "Peer session failed: {}", failure);
        self.set_state(PeerState::Failed);
        let _ = self.events.send(PeerEvent::Failed {
            participant: self.remote.clone(),
            epoch: self.epoch,
            failure,
        });
    }

    async fn finish(mut self) {
        let discarded = self.pending_ice_candidates.len();
        self.pending_ice_candidates.clear();

        if let Err(e) = self.transport.close().await {
            warn!(participant = %self.remote, "Failed to close transport: {}", e);
        }
        if self.state != PeerState::Failed {
            self.set_state(PeerState::Closed);
        }
        debug!(participant = %self.remote, epoch = self.epoch, discarded, "Peer session finished");
    }
}

async fn open_transport(
    cancel: &CancellationToken,
    factory: &dyn TransportFactory,
    remote: &ParticipantId,
) -> Result<(Box<dyn MediaTransport>, mpsc::Receiver<TransportEvent>), Interrupt> {
    let (tx, rx) = mpsc::channel(TRANSPORT_EVENT_BUFFER);
    let transport = guarded(cancel, factory.create(remote, tx)).await?;
    Ok((transport, rx))
}

async fn cancellable<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}

async fn guarded<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, Interrupt>
where
    F: Future<Output = Result<T, NegotiationError>>,
{
    match cancellable(cancel, fut).await {
        None => Err(Interrupt::Cancelled),
        Some(result) => result.map_err(Interrupt::Negotiation),
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
