use futures_util::{SinkExt, StreamExt};
use huddle_client::{RoomEvent, SessionConfig, SessionError, SignalingError, VirtualDevices};
use huddle_core::{ChatMessage, Participant, SignalMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use crate::integration::init_tracing;
use crate::utils::{
    SIGNAL_TIMEOUT_MS, TestSession, config_for, snapshot_frame, spawn_fake_relay, wait_until,
};

#[tokio::test]
async fn test_missing_snapshot_times_out() {
    init_tracing();

    let addr = spawn_fake_relay(|mut ws| async move {
        while let Some(Ok(_)) = ws.next().await {}
    })
    .await
    .unwrap();

    let config = SessionConfig {
        snapshot_timeout: Duration::from_millis(300),
        ..config_for(addr)
    };
    let result = TestSession::join(config, "b", Arc::new(VirtualDevices::new())).await;

    assert!(matches!(result, Err(SessionError::SnapshotTimeout(_))));
}

#[tokio::test]
async fn test_close_before_snapshot_fails_join() {
    init_tracing();

    let addr = spawn_fake_relay(|mut ws| async move {
        let _ = ws.close(None).await;
    })
    .await
    .unwrap();

    let result = TestSession::join(config_for(addr), "b", Arc::new(VirtualDevices::new())).await;

    assert!(matches!(
        result,
        Err(SessionError::Signaling(SignalingError::Closed))
    ));
}

#[tokio::test]
async fn test_unreachable_relay_fails_join() {
    init_tracing();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = TestSession::join(config_for(addr), "b", Arc::new(VirtualDevices::new())).await;

    assert!(matches!(
        result,
        Err(SessionError::Signaling(SignalingError::Connection(_)))
    ));
}

#[tokio::test]
async fn test_messages_before_snapshot_are_kept() {
    init_tracing();

    let early = ChatMessage::new("a".into(), "before snapshot");
    let early_frame = serde_json::to_string(&SignalMessage::from(early.clone())).unwrap();

    let addr = spawn_fake_relay(move |mut ws| async move {
        let _ = ws.send(Message::Text(early_frame.into())).await;
        let _ = ws
            .send(snapshot_frame(vec![
                Participant::new("a", "Alice"),
                Participant::new("b", "Bob"),
            ]))
            .await;
        while let Some(Ok(_)) = ws.next().await {}
    })
    .await
    .unwrap();

    let bob = TestSession::join(config_for(addr), "b", Arc::new(VirtualDevices::new()))
        .await
        .unwrap();

    let view = bob.handle.room_view();
    assert_eq!(view.chat, vec![early]);
    assert_eq!(view.participants.len(), 2);
}

#[tokio::test]
async fn test_relay_loss_tears_down_room() {
    init_tracing();

    let addr = spawn_fake_relay(|mut ws| async move {
        let _ = ws
            .send(snapshot_frame(vec![
                Participant::new("a", "Alice"),
                Participant::new("b", "Bob"),
            ]))
            .await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = ws.close(None).await;
    })
    .await
    .unwrap();

    let mut bob = TestSession::join(config_for(addr), "b", Arc::new(VirtualDevices::new()))
        .await
        .unwrap();
    let factory = bob.factory.clone();

    let disconnected = bob
        .next_event(SIGNAL_TIMEOUT_MS, |e| matches!(e, RoomEvent::Disconnected { .. }))
        .await;
    assert!(disconnected.is_some());

    assert!(factory.latest(&"a".into()).unwrap().is_closed());
    let handle = bob.handle.clone();
    assert!(wait_until(|| !handle.room_view().connected, SIGNAL_TIMEOUT_MS).await);
    assert_eq!(handle.room_view().active_tracks, 0);

    assert!(matches!(
        bob.handle.send_chat("anyone?").await,
        Err(SessionError::Closed)
    ));
}
