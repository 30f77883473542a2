use async_trait::async_trait;
use huddle_client::{SignalingError, SignalingOutput};
use huddle_core::{IceCandidate, ParticipantId, SignalMessage};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Mock SignalingOutput that captures everything a peer session sends,
/// stamped with the local identity the way the real channel does it.
#[derive(Clone)]
pub struct MockSignalingOutput {
    local: ParticipantId,
    tx: mpsc::UnboundedSender<SignalMessage>,
    signals: Arc<Mutex<Vec<SignalMessage>>>,
}

impl MockSignalingOutput {
    pub fn new(local: &str) -> (Self, mpsc::UnboundedReceiver<SignalMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let signaling = Self {
            local: local.into(),
            tx,
            signals: Arc::new(Mutex::new(Vec::new())),
        };
        (signaling, rx)
    }

    pub fn get_signals(&self) -> Vec<SignalMessage> {
        self.signals.lock().unwrap().clone()
    }

    pub fn count(&self, kind: &str, target: &ParticipantId) -> usize {
        self.get_signals()
            .iter()
            .filter(|s| s.kind() == kind && s.target() == Some(target))
            .count()
    }

    pub fn offers_to(&self, target: &ParticipantId) -> usize {
        self.count("offer", target)
    }

    pub fn answers_to(&self, target: &ParticipantId) -> usize {
        self.count("answer", target)
    }

    fn record(&self, msg: SignalMessage) {
        tracing::debug!("[MockSignaling] {} to {:?}", msg.kind(), msg.target());
        let _ = self.tx.send(msg.clone());
        self.signals.lock().unwrap().push(msg);
    }
}

#[async_trait]
impl SignalingOutput for MockSignalingOutput {
    async fn send_offer(&self, target: ParticipantId, sdp: String) -> Result<(), SignalingError> {
        self.record(SignalMessage::Offer {
            from: self.local.clone(),
            target,
            sdp,
        });
        Ok(())
    }

    async fn send_answer(
        &self,
        target: ParticipantId,
        sdp: String,
    ) -> Result<(), SignalingError> {
        self.record(SignalMessage::Answer {
            from: self.local.clone(),
            target,
            sdp,
        });
        Ok(())
    }

    async fn send_ice(
        &self,
        target: ParticipantId,
        candidate: IceCandidate,
    ) -> Result<(), SignalingError> {
        self.record(SignalMessage::IceCandidate {
            from: self.local.clone(),
            target,
            candidate,
        });
        Ok(())
    }
}
