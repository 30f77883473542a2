use crate::room::RoomCommand;
use crate::signaling::RelayState;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use huddle_core::{Participant, RoomId, SignalMessage};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Debug, Deserialize)]
pub struct JoinParams {
    pub user_id: Option<String>,
    pub user_name: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<String>,
    Query(params): Query<JoinParams>,
    State(state): State<RelayState>,
) -> Response {
    let (Some(user_id), Some(user_name)) = (params.user_id, params.user_name) else {
        return (StatusCode::BAD_REQUEST, "user_id and user_name are required").into_response();
    };
    if user_id.trim().is_empty() || user_name.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "user_id and user_name are required").into_response();
    }

    let room_id = RoomId::from(room_id);
    let participant = Participant::new(user_id, user_name);

    ws.on_upgrade(move |socket| handle_socket(socket, room_id, participant, state))
}

async fn handle_socket(
    socket: WebSocket,
    room_id: RoomId,
    participant: Participant,
    state: RelayState,
) {
    let participant_id = participant.id.clone();
    let connection = state.next_connection_id();
    info!(
        "New WebSocket connection: {} in room {} (#{})",
        participant_id, room_id, connection
    );

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let room_tx = state.rooms.enter(&room_id);
    let join = RoomCommand::Join {
        participant,
        connection,
        outbound: tx,
    };
    if let Err(e) = room_tx.send(join).await {
        error!("Room {} died before {} could join: {}", room_id, participant_id, e);
        state.rooms.leave(&room_id);
        return;
    }

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    let mut recv_task = tokio::spawn({
        let room_tx = room_tx.clone();
        let participant_id = participant_id.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<SignalMessage>(&text) {
                        Ok(message) => {
                            let cmd = RoomCommand::Signal {
                                from: participant_id.clone(),
                                connection,
                                message,
                            };
                            if let Err(e) = room_tx.send(cmd).await {
                                error!("Room died: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Invalid SignalMessage from {}: {}", participant_id, e),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    let _ = room_tx
        .send(RoomCommand::Leave {
            participant_id: participant_id.clone(),
            connection,
        })
        .await;
    drop(room_tx);
    state.rooms.leave(&room_id);

    info!("WebSocket disconnected: {} (#{})", participant_id, connection);
}
