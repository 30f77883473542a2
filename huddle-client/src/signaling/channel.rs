use crate::error::SignalingError;
use crate::signaling::SignalingOutput;
use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use huddle_core::{IceCandidate, Participant, ParticipantId, RoomId, SignalMessage};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// What the channel hands to its single consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Message(SignalMessage),
    /// Terminal; delivered once, after which nothing else arrives.
    Closed { reason: String },
}

struct ChannelInner {
    identity: ParticipantId,
    outbound: mpsc::UnboundedSender<Message>,
    closed: AtomicBool,
    shutdown: CancellationToken,
    writer: Mutex<Option<JoinHandle<()>>>,
}

/// Room-scoped signaling connection.
///
/// Inbound messages are delivered through the receiver returned by
/// [`SignalingChannel::connect`] in arrival order. There is no reconnect: once
/// the transport goes away the receiver yields a single
/// [`ChannelEvent::Closed`] and every later `send` fails.
#[derive(Clone)]
pub struct SignalingChannel {
    inner: Arc<ChannelInner>,
}

impl SignalingChannel {
    pub async fn connect(
        base_url: &str,
        room: &RoomId,
        me: &Participant,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ChannelEvent>), SignalingError> {
        let url = endpoint_url(base_url, room, me);
        debug!(%url, "Connecting signaling channel");

        let (ws, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| SignalingError::Connection(e.to_string()))?;

        info!(room = %room, participant = %me.id, "Signaling channel connected");
        Ok(Self::over(ws, me.id.clone()))
    }

    /// Runs the channel over an already established WebSocket stream.
    pub fn over<S>(stream: S, identity: ParticipantId) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>)
    where
        S: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Send + 'static,
    {
        let (mut sink, mut source) = stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let writer = tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => {
                            let _ = sink.send(Message::Close(None)).await;
                            break;
                        }
                        msg = outbound_rx.recv() => {
                            let Some(msg) = msg else { break };
                            if let Err(e) = sink.send(msg).await {
                                warn!("Signaling write failed: {}", e);
                                break;
                            }
                        }
                    }
                }
                let _ = sink.close().await;
            }
        });

        let inner = Arc::new(ChannelInner {
            identity,
            outbound: outbound_tx,
            closed: AtomicBool::new(false),
            shutdown: shutdown.clone(),
            writer: Mutex::new(Some(writer)),
        });

        tokio::spawn({
            let inner = inner.clone();
            async move {
                let reason = loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break "closed locally".to_owned(),
                        frame = source.next() => match frame {
                            Some(Ok(Message::Text(text))) => {
                                match serde_json::from_str::<SignalMessage>(&text) {
                                    Ok(msg) => {
                                        debug!(kind = msg.kind(), "Signal received");
                                        if events_tx.send(ChannelEvent::Message(msg)).is_err() {
                                            break "receiver dropped".to_owned();
                                        }
                                    }
                                    Err(e) => warn!("Skipping undecodable signal: {}", e),
                                }
                            }
                            Some(Ok(Message::Close(frame))) => {
                                break frame
                                    .map(|f| f.reason.as_str().to_owned())
                                    .filter(|r| !r.is_empty())
                                    .unwrap_or_else(|| "closed by server".to_owned());
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => break e.to_string(),
                            None => break "connection lost".to_owned(),
                        }
                    }
                };

                inner.closed.store(true, Ordering::SeqCst);
                inner.shutdown.cancel();
                info!(%reason, "Signaling channel closed");
                let _ = events_tx.send(ChannelEvent::Closed { reason });
            }
        });

        (Self { inner }, events_rx)
    }

    pub fn identity(&self) -> &ParticipantId {
        &self.inner.identity
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Queues a message for the relay. `from` is always this participant.
    pub fn send(&self, message: SignalMessage) -> Result<(), SignalingError> {
        if self.is_closed() {
            return Err(SignalingError::Closed);
        }

        let message = message.with_sender(&self.inner.identity);
        let json = serde_json::to_string(&message)?;
        self.inner
            .outbound
            .send(Message::Text(json.into()))
            .map_err(|_| SignalingError::Closed)
    }

    /// Closes the connection. Safe to call more than once.
    pub async fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.shutdown.cancel();

        let writer = self.inner.writer.lock().await.take();
        if let Some(writer) = writer {
            if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer).await.is_err() {
                warn!("Signaling writer did not finish in time");
            }
        }
    }
}

#[async_trait]
impl SignalingOutput for SignalingChannel {
    async fn send_offer(&self, target: ParticipantId, sdp: String) -> Result<(), SignalingError> {
        self.send(SignalMessage::Offer {
            from: self.inner.identity.clone(),
            target,
            sdp,
        })
    }

    async fn send_answer(&self, target: ParticipantId, sdp: String) -> Result<(), SignalingError> {
        self.send(SignalMessage::Answer {
            from: self.inner.identity.clone(),
            target,
            sdp,
        })
    }

    async fn send_ice(
        &self,
        target: ParticipantId,
        candidate: IceCandidate,
    ) -> Result<(), SignalingError> {
        self.send(SignalMessage::IceCandidate {
            from: self.inner.identity.clone(),
            target,
            candidate,
        })
    }
}

/// `{base}/ws/meeting/{room}?user_id={id}&user_name={name}`
pub fn endpoint_url(base_url: &str, room: &RoomId, me: &Participant) -> String {
    format!(
        "{}/ws/meeting/{}?user_id={}&user_name={}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(room.as_str()),
        urlencoding::encode(me.id.as_str()),
        urlencoding::encode(&me.display_name),
    )
}
