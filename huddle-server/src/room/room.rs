use crate::room::room_command::RoomCommand;
use axum::extract::ws::Message;
use huddle_core::{ChatMessage, Participant, ParticipantId, RoomId, SignalMessage};
use std::collections::{BTreeMap, VecDeque};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

struct Member {
    participant: Participant,
    connection: u64,
    outbound: mpsc::UnboundedSender<Message>,
}

/// One meeting room: its members, their media state and the chat backlog.
///
/// Runs as a task that owns all of its state; handlers talk to it through
/// [`RoomCommand`]s. The task ends once every sender is gone.
pub struct Room {
    id: RoomId,
    members: BTreeMap<ParticipantId, Member>,
    chat_history: VecDeque<ChatMessage>,
    chat_history_limit: usize,
    command_rx: mpsc::Receiver<RoomCommand>,
}

impl Room {
    pub fn new(
        id: RoomId,
        command_rx: mpsc::Receiver<RoomCommand>,
        chat_history_limit: usize,
    ) -> Self {
        Self {
            id,
            members: BTreeMap::new(),
            chat_history: VecDeque::new(),
            chat_history_limit,
            command_rx,
        }
    }

    pub async fn run(mut self) {
        info!("Room {} event loop started", self.id);

        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd);
        }

        info!("Command channel closed. Shutting down room {}.", self.id);
    }

    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                participant,
                connection,
                outbound,
            } => self.join(participant, connection, outbound),

            RoomCommand::Signal {
                from,
                connection,
                message,
            } => {
                if !self.is_current(&from, connection) {
                    debug!("Dropping {} from replaced connection of {}", message.kind(), from);
                    return;
                }
                self.relay(&from, message.with_sender(&from));
            }

            RoomCommand::Leave {
                participant_id,
                connection,
            } => {
                if !self.is_current(&participant_id, connection) {
                    return;
                }
                self.members.remove(&participant_id);
                info!("{} left room {}", participant_id, self.id);

                let left = SignalMessage::ParticipantLeft { participant_id };
                self.broadcast(&left, None);
            }
        }
    }

    fn join(
        &mut self,
        participant: Participant,
        connection: u64,
        outbound: mpsc::UnboundedSender<Message>,
    ) {
        let id = participant.id.clone();
        let member = Member {
            participant: participant.clone(),
            connection,
            outbound,
        };

        if self.members.insert(id.clone(), member).is_some() {
            info!("{} reconnected to room {}, replacing old connection", id, self.id);
        } else {
            info!("{} joined room {}", id, self.id);
        }

        let snapshot = SignalMessage::RoomSnapshot {
            participants: self
                .members
                .values()
                .map(|m| m.participant.clone())
                .collect(),
            chat_history: self.chat_history.iter().cloned().collect(),
        };
        self.send_to(&id, &snapshot);

        let joined = SignalMessage::ParticipantJoined { participant };
        self.broadcast(&joined, Some(&id));
    }

    fn relay(&mut self, from: &ParticipantId, message: SignalMessage) {
        match message {
            SignalMessage::Offer { ref target, .. }
            | SignalMessage::Answer { ref target, .. }
            | SignalMessage::IceCandidate { ref target, .. } => {
                if self.members.contains_key(target) {
                    self.send_to(target, &message);
                } else {
                    debug!(
                        "Dropping {} from {} for absent participant {}",
                        message.kind(),
                        from,
                        target
                    );
                }
            }

            SignalMessage::MediaStateChanged { state, .. } => {
                if let Some(member) = self.members.get_mut(from) {
                    member.participant.media_state = state;
                }
                self.broadcast(&message, None);
            }

            SignalMessage::ChatMessage {
                ref content,
                timestamp,
                ..
            } => {
                self.chat_history.push_back(ChatMessage {
                    from: from.clone(),
                    content: content.clone(),
                    timestamp,
                });
                while self.chat_history.len() > self.chat_history_limit {
                    self.chat_history.pop_front();
                }
                self.broadcast(&message, None);
            }

            SignalMessage::RoomSnapshot { .. }
            | SignalMessage::ParticipantJoined { .. }
            | SignalMessage::ParticipantLeft { .. } => {
                warn!("{} sent relay-only message {}", from, message.kind());
            }
        }
    }

    fn is_current(&self, id: &ParticipantId, connection: u64) -> bool {
        self.members
            .get(id)
            .is_some_and(|member| member.connection == connection)
    }

    fn send_to(&self, id: &ParticipantId, message: &SignalMessage) {
        let Some(member) = self.members.get(id) else {
            warn!("Attempted to send signal to disconnected user {}", id);
            return;
        };

        match serde_json::to_string(message) {
            Ok(json) => {
                if let Err(e) = member.outbound.send(Message::Text(json.into())) {
                    error!("Failed to send WS message to {}: {}", id, e);
                }
            }
            Err(e) => error!("Failed to serialize signal message: {}", e),
        }
    }

    fn broadcast(&self, message: &SignalMessage, except: Option<&ParticipantId>) {
        for id in self.members.keys() {
            if Some(id) != except {
                self.send_to(id, message);
            }
        }
    }
}
