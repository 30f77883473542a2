use crate::room::{Reconciliation, RoomEvent, SessionDirective};
use huddle_core::{ChatMessage, Participant, ParticipantId, RoomId, SignalMessage};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, info, warn};

/// Local view of the room: roster, media states and chat.
///
/// Applying an inbound message never touches peer sessions directly; it
/// returns the session directives the change implies.
#[derive(Debug)]
pub struct RoomState {
    room: RoomId,
    me: ParticipantId,
    participants: BTreeMap<ParticipantId, Participant>,
    chat: Vec<ChatMessage>,
    unreachable: BTreeSet<ParticipantId>,
    has_snapshot: bool,
}

impl RoomState {
    pub fn new(room: RoomId, me: ParticipantId) -> Self {
        Self {
            room,
            me,
            participants: BTreeMap::new(),
            chat: Vec::new(),
            unreachable: BTreeSet::new(),
            has_snapshot: false,
        }
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    pub fn me(&self) -> &ParticipantId {
        &self.me
    }

    pub fn has_snapshot(&self) -> bool {
        self.has_snapshot
    }

    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    pub fn participant(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.get(id)
    }

    /// Everyone in the room except us.
    pub fn remote_ids(&self) -> HashSet<ParticipantId> {
        self.participants
            .keys()
            .filter(|id| **id != self.me)
            .cloned()
            .collect()
    }

    pub fn chat(&self) -> &[ChatMessage] {
        &self.chat
    }

    pub fn unreachable(&self) -> &BTreeSet<ParticipantId> {
        &self.unreachable
    }

    /// Records that the transport to `id` has failed for good.
    pub fn mark_unreachable(&mut self, id: &ParticipantId) -> bool {
        if !self.participants.contains_key(id) {
            return false;
        }
        self.unreachable.insert(id.clone())
    }

    /// Applies one room-level message. `media_ready` gates session creation.
    pub fn apply(&mut self, msg: &SignalMessage, media_ready: bool) -> Reconciliation {
        match msg {
            SignalMessage::RoomSnapshot {
                participants,
                chat_history,
            } => self.apply_snapshot(participants, chat_history, media_ready),

            SignalMessage::ParticipantJoined { participant } => {
                self.apply_joined(participant, media_ready)
            }

            SignalMessage::ParticipantLeft { participant_id } => self.apply_left(participant_id),

            SignalMessage::MediaStateChanged { from, state } => {
                let Some(participant) = self.participants.get_mut(from) else {
                    warn!(participant = %from, "Media state for unknown participant ignored");
                    return Reconciliation::default();
                };
                participant.media_state = *state;
                Reconciliation {
                    directives: Vec::new(),
                    event: Some(RoomEvent::MediaStateChanged {
                        participant: from.clone(),
                        state: *state,
                    }),
                }
            }

            SignalMessage::ChatMessage {
                from,
                content,
                timestamp,
            } => {
                let message = ChatMessage {
                    from: from.clone(),
                    content: content.clone(),
                    timestamp: *timestamp,
                };
                self.chat.push(message.clone());
                Reconciliation {
                    directives: Vec::new(),
                    event: Some(RoomEvent::ChatReceived(message)),
                }
            }

            SignalMessage::Offer { .. }
            | SignalMessage::Answer { .. }
            | SignalMessage::IceCandidate { .. } => {
                debug!(kind = msg.kind(), "Negotiation message has no room-level effect");
                Reconciliation::default()
            }
        }
    }

    fn apply_snapshot(
        &mut self,
        participants: &[Participant],
        chat_history: &[ChatMessage],
        media_ready: bool,
    ) -> Reconciliation {
        self.participants = participants
            .iter()
            .map(|p| (p.id.clone(), p.clone()))
            .collect();
        self.chat = chat_history.to_vec();
        self.has_snapshot = true;

        let remote = self.remote_ids();
        self.unreachable.retain(|id| remote.contains(id));
        info!(
            room = %self.room,
            participants = self.participants.len(),
            chat = self.chat.len(),
            "Room snapshot applied"
        );

        let mut directives = vec![SessionDirective::Retain(remote.clone())];
        if media_ready {
            let mut ensure: Vec<ParticipantId> = remote.into_iter().collect();
            ensure.sort();
            directives.extend(ensure.into_iter().map(SessionDirective::Ensure));
        }

        Reconciliation {
            directives,
            event: Some(RoomEvent::RosterReplaced {
                participants: self.participants.values().cloned().collect(),
            }),
        }
    }

    fn apply_joined(&mut self, participant: &Participant, media_ready: bool) -> Reconciliation {
        let id = participant.id.clone();
        let rejoined = self
            .participants
            .insert(id.clone(), participant.clone())
            .is_some();
        self.unreachable.remove(&id);

        let mut directives = Vec::new();
        if id != self.me {
            // A known id joining again is a fresh client; its old session is useless.
            if rejoined {
                directives.push(SessionDirective::Teardown(id.clone()));
            }
            if media_ready {
                directives.push(SessionDirective::Ensure(id));
            }
        }

        Reconciliation {
            directives,
            event: Some(RoomEvent::ParticipantJoined(participant.clone())),
        }
    }

    fn apply_left(&mut self, id: &ParticipantId) -> Reconciliation {
        if self.participants.remove(id).is_none() {
            debug!(participant = %id, "Unknown participant left");
        }
        self.unreachable.remove(id);

        let directives = if *id == self.me {
            Vec::new()
        } else {
            vec![SessionDirective::Teardown(id.clone())]
        };

        Reconciliation {
            directives,
            event: Some(RoomEvent::ParticipantLeft(id.clone())),
        }
    }
}
