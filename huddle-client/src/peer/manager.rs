use crate::config::SessionConfig;
use crate::media::LocalTrackSet;
use crate::peer::session::{SessionSetup, run_session};
use crate::peer::{PeerCommand, PeerEvent, PeerFailure, PeerState, SessionMode};
use crate::signaling::SignalingOutput;
use crate::transport::TransportFactory;
use futures_util::future::join_all;
use huddle_core::{ParticipantId, SignalMessage};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Manager-side handle to one running session task.
struct PeerHandle {
    commands: mpsc::UnboundedSender<PeerCommand>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
    state: watch::Receiver<PeerState>,
    epoch: u64,
}

impl PeerHandle {
    /// Cancels the task and waits for it to close its transport.
    async fn shutdown(self, remote: &ParticipantId, timeout: Duration) {
        self.cancel.cancel();
        let mut task = self.task;
        if tokio::time::timeout(timeout, &mut task).await.is_err() {
            warn!(participant = %remote, "Peer session did not stop in time, aborting");
            task.abort();
        }
    }
}

/// Keeps exactly one negotiation session per remote participant.
pub struct PeerSessionManager {
    local: ParticipantId,
    factory: Arc<dyn TransportFactory>,
    signaling: Arc<dyn SignalingOutput>,
    tracks: watch::Receiver<LocalTrackSet>,
    events_tx: mpsc::UnboundedSender<PeerEvent>,
    sessions: HashMap<ParticipantId, PeerHandle>,
    retried: HashSet<ParticipantId>,
    next_epoch: u64,
    connectivity_timeout: Duration,
    negotiation_timeout: Duration,
    close_timeout: Duration,
}

impl PeerSessionManager {
    pub fn new(
        local: ParticipantId,
        factory: Arc<dyn TransportFactory>,
        signaling: Arc<dyn SignalingOutput>,
        tracks: watch::Receiver<LocalTrackSet>,
        config: &SessionConfig,
    ) -> (Self, mpsc::UnboundedReceiver<PeerEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let manager = Self {
            local,
            factory,
            signaling,
            tracks,
            events_tx,
            sessions: HashMap::new(),
            retried: HashSet::new(),
            next_epoch: 0,
            connectivity_timeout: config.connectivity_timeout,
            negotiation_timeout: config.negotiation_timeout,
            close_timeout: config.close_timeout,
        };
        (manager, events_rx)
    }

    pub fn local(&self) -> &ParticipantId {
        &self.local
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, remote: &ParticipantId) -> bool {
        self.sessions.contains_key(remote)
    }

    pub fn state(&self, remote: &ParticipantId) -> Option<PeerState> {
        self.sessions.get(remote).map(|h| *h.state.borrow())
    }

    pub fn states(&self) -> BTreeMap<ParticipantId, PeerState> {
        self.sessions
            .iter()
            .map(|(id, h)| (id.clone(), *h.state.borrow()))
            .collect()
    }

    /// Starts an offering session for `remote` unless one already exists.
    ///
    /// Returns whether a session was created.
    pub fn ensure_session(&mut self, remote: &ParticipantId) -> bool {
        if *remote == self.local || self.sessions.contains_key(remote) {
            return false;
        }
        self.spawn(remote.clone(), SessionMode::Offer);
        true
    }

    /// Routes an inbound negotiation message to its session.
    ///
    /// An offer from a participant without a session creates one in answer
    /// mode. Answers and candidates for unknown participants are dropped.
    pub fn handle_signal(&mut self, msg: SignalMessage) {
        let (from, cmd) = match msg {
            SignalMessage::Offer { from, target, sdp } if target == self.local => {
                (from, PeerCommand::RemoteOffer { sdp })
            }
            SignalMessage::Answer { from, target, sdp } if target == self.local => {
                (from, PeerCommand::RemoteAnswer { sdp })
            }
            SignalMessage::IceCandidate {
                from,
                target,
                candidate,
            } if target == self.local => (from, PeerCommand::RemoteCandidate { candidate }),
            other => {
                debug!(kind = other.kind(), "Not a negotiation message for us");
                return;
            }
        };

        if from == self.local {
            return;
        }

        if !self.sessions.contains_key(&from) {
            if !matches!(cmd, PeerCommand::RemoteOffer { .. }) {
                warn!(participant = %from, "Dropping negotiation message without a session");
                return;
            }
            info!(participant = %from, "Unsolicited offer, creating answering session");
            self.spawn(from.clone(), SessionMode::Answer);
        }

        if let Some(handle) = self.sessions.get(&from) {
            if handle.commands.send(cmd).is_err() {
                debug!(participant = %from, "Peer session already stopped");
            }
        }
    }

    /// Tears down the session for `remote`. Returns whether one existed.
    pub async fn close(&mut self, remote: &ParticipantId) -> bool {
        self.retried.remove(remote);
        self.stop(remote).await
    }

    /// Tears down every session whose participant is not in `keep`.
    pub async fn retain(&mut self, keep: &HashSet<ParticipantId>) -> usize {
        let stale: Vec<ParticipantId> = self
            .sessions
            .keys()
            .filter(|id| !keep.contains(*id))
            .cloned()
            .collect();
        for id in &stale {
            self.close(id).await;
        }
        stale.len()
    }

    /// Tears down all sessions concurrently. Returns how many there were.
    pub async fn close_all(&mut self) -> usize {
        self.retried.clear();
        let timeout = self.close_timeout;
        let handles: Vec<(ParticipantId, PeerHandle)> = self.sessions.drain().collect();
        let count = handles.len();

        join_all(
            handles
                .into_iter()
                .map(|(id, handle)| async move { handle.shutdown(&id, timeout).await }),
        )
        .await;

        if count > 0 {
            info!(count, "All peer sessions closed");
        }
        count
    }

    /// Filters a session report and applies the retry rule.
    ///
    /// Reports from replaced sessions are swallowed. A session's first
    /// negotiation failure recreates it with a fresh transport and is not
    /// passed on; anything else is returned for the caller to act on.
    pub async fn handle_event(&mut self, event: PeerEvent) -> Option<PeerEvent> {
        let current = self.sessions.get(event.participant()).map(|h| h.epoch);
        if current != Some(event.epoch()) {
            return None;
        }

        if let PeerEvent::Failed {
            participant,
            failure: PeerFailure::Negotiation(e),
            ..
        } = &event
        {
            if self.retried.insert(participant.clone()) {
                warn!(participant = %participant, "Recreating peer session after: {}", e);
                self.stop(participant).await;
                self.spawn(participant.clone(), SessionMode::Offer);
                return None;
            }
        }

        Some(event)
    }

    async fn stop(&mut self, remote: &ParticipantId) -> bool {
        let Some(handle) = self.sessions.remove(remote) else {
            return false;
        };
        debug!(participant = %remote, epoch = handle.epoch, "Closing peer session");
        handle.shutdown(remote, self.close_timeout).await;
        true
    }

    fn spawn(&mut self, remote: ParticipantId, mode: SessionMode) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(PeerState::New);
        let cancel = CancellationToken::new();
        let epoch = self.next_epoch;
        self.next_epoch += 1;

        let setup = SessionSetup {
            local: self.local.clone(),
            remote: remote.clone(),
            epoch,
            mode,
            factory: Arc::clone(&self.factory),
            signaling: Arc::clone(&self.signaling),
            tracks: self.tracks.clone(),
            commands: commands_rx,
            events: self.events_tx.clone(),
            state: state_tx,
            cancel: cancel.clone(),
            connectivity_timeout: self.connectivity_timeout,
            negotiation_timeout: self.negotiation_timeout,
        };
        let task = tokio::spawn(run_session(setup));

        self.sessions.insert(
            remote,
            PeerHandle {
                commands: commands_tx,
                cancel,
                task,
                state: state_rx,
                epoch,
            },
        );
    }
}
