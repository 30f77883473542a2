use chrono::{TimeZone, Utc};
use huddle_core::{ChatMessage, ParticipantId, SignalMessage};
use huddle_server::ServerConfig;

use crate::integration::init_tracing;
use crate::utils::{SIGNAL_TIMEOUT_MS, SILENCE_MS, TestClient, small_history, spawn_relay};

#[tokio::test]
async fn test_chat_reaches_everyone_once() {
    init_tracing();

    let (addr, _state) = spawn_relay(ServerConfig::default()).await.unwrap();

    let (mut alice, _) = TestClient::join(addr, "standup", "alice").await.unwrap();
    let (mut bob, _) = TestClient::join(addr, "standup", "bob").await.unwrap();
    alice
        .recv_kind("participant_joined", SIGNAL_TIMEOUT_MS)
        .await
        .unwrap();

    let timestamp = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
    let chat = SignalMessage::ChatMessage {
        from: "bob".into(),
        content: "hi".to_owned(),
        timestamp,
    };
    bob.send(&chat).await.unwrap();

    assert_eq!(alice.recv(SIGNAL_TIMEOUT_MS).await.unwrap(), chat);
    assert_eq!(bob.recv(SIGNAL_TIMEOUT_MS).await.unwrap(), chat);
    assert!(alice.expect_silence(SILENCE_MS).await);
    assert!(bob.expect_silence(SILENCE_MS).await);
}

#[tokio::test]
async fn test_history_is_capped_for_newcomers() {
    init_tracing();

    let (addr, _state) = spawn_relay(small_history(3)).await.unwrap();

    let (mut alice, _) = TestClient::join(addr, "standup", "alice").await.unwrap();
    for n in 0..5 {
        let msg = ChatMessage::new("alice".into(), format!("message {n}"));
        alice.send(&msg.into()).await.unwrap();
        alice
            .recv_kind("chat_message", SIGNAL_TIMEOUT_MS)
            .await
            .unwrap();
    }

    let (_bob, snapshot) = TestClient::join(addr, "standup", "bob").await.unwrap();
    let SignalMessage::RoomSnapshot { chat_history, .. } = snapshot else {
        panic!("expected snapshot");
    };

    let contents: Vec<&str> = chat_history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["message 2", "message 3", "message 4"]);
    assert!(
        chat_history
            .iter()
            .all(|m| m.from == ParticipantId::from("alice"))
    );
}
