use huddle_client::PeerState;
use huddle_client::media::LocalTrackSet;
use huddle_core::{ParticipantId, SignalMessage};
use std::collections::HashSet;
use tokio::sync::watch;

use crate::integration::init_tracing;
use crate::utils::{SIGNAL_TIMEOUT_MS, TestPeer};

async fn connected_peer(remotes: &[&str]) -> (TestPeer, watch::Sender<LocalTrackSet>) {
    let (tracks_tx, tracks) = watch::channel(LocalTrackSet::default());
    let mut peer = TestPeer::new("m", tracks);

    for remote in remotes {
        let id = ParticipantId::from(*remote);
        peer.manager.ensure_session(&id);
        assert!(peer.wait_offers(&id, 1, SIGNAL_TIMEOUT_MS).await);
        peer.answer_offers_as(&id);
        assert!(peer.wait_state(&id, PeerState::Connected, SIGNAL_TIMEOUT_MS).await);
    }
    (peer, tracks_tx)
}

#[tokio::test]
async fn test_closing_one_session_leaves_others() {
    init_tracing();

    let (mut peer, _tracks) = connected_peer(&["x", "y", "z"]).await;
    let (x, y, z) = (
        ParticipantId::from("x"),
        ParticipantId::from("y"),
        ParticipantId::from("z"),
    );

    assert!(peer.manager.close(&y).await);

    assert_eq!(peer.manager.len(), 2);
    assert!(!peer.manager.contains(&y));
    assert!(peer.factory.latest(&y).unwrap().is_closed());
    for id in [&x, &z] {
        assert_eq!(peer.manager.state(id), Some(PeerState::Connected));
        assert!(!peer.factory.latest(id).unwrap().is_closed());
    }

    // Closing again is a no-op.
    assert!(!peer.manager.close(&y).await);
}

#[tokio::test]
async fn test_ensure_is_idempotent_and_skips_self() {
    init_tracing();

    let (_tracks_tx, tracks) = watch::channel(LocalTrackSet::default());
    let mut peer = TestPeer::new("m", tracks);
    let x = ParticipantId::from("x");

    assert!(peer.manager.ensure_session(&x));
    assert!(!peer.manager.ensure_session(&x));
    assert!(!peer.manager.ensure_session(&"m".into()));
    assert_eq!(peer.manager.len(), 1);

    // Our own messages echoed back never create a session.
    peer.manager.handle_signal(SignalMessage::Offer {
        from: "m".into(),
        target: "m".into(),
        sdp: "loopback".into(),
    });
    assert_eq!(peer.manager.len(), 1);
}

#[tokio::test]
async fn test_retain_and_close_all() {
    init_tracing();

    let (mut peer, _tracks) = connected_peer(&["x", "y", "z"]).await;

    let keep: HashSet<ParticipantId> = [ParticipantId::from("x")].into_iter().collect();
    assert_eq!(peer.manager.retain(&keep).await, 2);
    assert_eq!(peer.manager.len(), 1);
    assert!(peer.factory.latest(&"y".into()).unwrap().is_closed());
    assert!(peer.factory.latest(&"z".into()).unwrap().is_closed());

    assert_eq!(peer.manager.close_all().await, 1);
    assert!(peer.manager.is_empty());
    assert!(peer.factory.latest(&"x".into()).unwrap().is_closed());
}

#[tokio::test]
async fn test_messages_for_others_are_ignored() {
    init_tracing();

    let (_tracks_tx, tracks) = watch::channel(LocalTrackSet::default());
    let mut peer = TestPeer::new("m", tracks);

    peer.manager.handle_signal(SignalMessage::Offer {
        from: "x".into(),
        target: "someone-else".into(),
        sdp: "v=0".into(),
    });

    assert!(peer.manager.is_empty());
}
