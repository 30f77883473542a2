use huddle_core::{MediaState, ParticipantId, SignalMessage};
use huddle_server::ServerConfig;

use crate::integration::init_tracing;
use crate::utils::{SIGNAL_TIMEOUT_MS, TestClient, spawn_relay};

#[tokio::test]
async fn test_media_state_is_broadcast_and_remembered() {
    init_tracing();

    let (addr, _state) = spawn_relay(ServerConfig::default()).await.unwrap();

    let (mut alice, _) = TestClient::join(addr, "standup", "alice").await.unwrap();
    let (mut bob, _) = TestClient::join(addr, "standup", "bob").await.unwrap();
    alice
        .recv_kind("participant_joined", SIGNAL_TIMEOUT_MS)
        .await
        .unwrap();

    let muted = MediaState {
        camera_on: true,
        mic_on: false,
        screen_sharing: false,
    };
    bob.send(&SignalMessage::MediaStateChanged {
        from: "bob".into(),
        state: muted,
    })
    .await
    .unwrap();

    for client in [&mut alice, &mut bob] {
        let msg = client
            .recv_kind("media_state_changed", SIGNAL_TIMEOUT_MS)
            .await
            .unwrap();
        assert_eq!(
            msg,
            SignalMessage::MediaStateChanged {
                from: "bob".into(),
                state: muted,
            }
        );
    }

    let (_carol, snapshot) = TestClient::join(addr, "standup", "carol").await.unwrap();
    let SignalMessage::RoomSnapshot { participants, .. } = snapshot else {
        panic!("expected snapshot");
    };
    let bob_entry = participants
        .iter()
        .find(|p| p.id == ParticipantId::from("bob"))
        .unwrap();
    assert_eq!(bob_entry.media_state, muted);
}
