use axum::extract::ws::Message;
use huddle_core::{Participant, ParticipantId, SignalMessage};
use tokio::sync::mpsc;

/// Commands a room receives from the WebSocket handlers of its members.
///
/// `connection` tells apart two sockets opened with the same participant id;
/// only the newest one is a member.
#[derive(Debug)]
pub enum RoomCommand {
    Join {
        participant: Participant,
        connection: u64,
        outbound: mpsc::UnboundedSender<Message>,
    },

    Signal {
        from: ParticipantId,
        connection: u64,
        message: SignalMessage,
    },

    Leave {
        participant_id: ParticipantId,
        connection: u64,
    },
}
