use huddle_client::{PeerState, RoomEvent, VirtualDevices};
use huddle_core::{ParticipantId, SignalMessage};
use std::sync::Arc;

use crate::integration::init_tracing;
use crate::utils::{
    RawParticipant, SIGNAL_TIMEOUT_MS, SILENCE_MS, TestSession, TransportCall, config_for,
    spawn_relay, wait_until,
};

#[tokio::test]
async fn test_join_offers_once_to_existing_participant() {
    init_tracing();

    let addr = spawn_relay().await.unwrap();
    let mut alice = RawParticipant::join(addr, "a").await.unwrap();
    let a = alice.id.clone();

    let mut bob = TestSession::join(config_for(addr), "b", Arc::new(VirtualDevices::new()))
        .await
        .unwrap();
    let b = bob.handle.me().clone();

    let received = alice.collect(500).await;
    let offers: Vec<&SignalMessage> = received.iter().filter(|m| m.kind() == "offer").collect();
    assert_eq!(offers.len(), 1, "exactly one offer: {received:?}");
    assert_eq!(offers[0].sender(), Some(&b));
    assert_eq!(offers[0].target(), Some(&a));
    assert!(
        received
            .iter()
            .any(|m| matches!(m, SignalMessage::ParticipantJoined { participant } if participant.id == b))
    );

    let view = bob.handle.room_view();
    assert_eq!(view.participants.len(), 2);
    assert!(view.connected);
    assert_eq!(view.active_tracks, 2);

    let transport = bob.factory.latest(&a).unwrap();
    assert_eq!(transport.count(&TransportCall::CreateOffer), 1);
    assert_eq!(
        transport
            .calls()
            .iter()
            .filter(|c| matches!(c, TransportCall::AddTrack(_)))
            .count(),
        2
    );

    alice.answer(&b).await.unwrap();
    let connected = bob
        .next_event(SIGNAL_TIMEOUT_MS, |e| {
            matches!(
                e,
                RoomEvent::PeerStateChanged {
                    state: PeerState::Connected,
                    ..
                }
            )
        })
        .await;
    assert_eq!(
        connected,
        Some(RoomEvent::PeerStateChanged {
            participant: a.clone(),
            state: PeerState::Connected,
        })
    );
    assert!(alice.collect(SILENCE_MS).await.iter().all(|m| m.kind() != "offer"));
}

#[tokio::test]
async fn test_presence_changes_drive_sessions() {
    init_tracing();

    let addr = spawn_relay().await.unwrap();
    let mut bob = TestSession::join(config_for(addr), "b", Arc::new(VirtualDevices::new()))
        .await
        .unwrap();
    let b = bob.handle.me().clone();
    assert!(bob.handle.room_view().peers.is_empty());

    let mut carol = RawParticipant::join(addr, "c").await.unwrap();
    let c = ParticipantId::from("c");

    let joined = bob
        .next_event(SIGNAL_TIMEOUT_MS, |e| matches!(e, RoomEvent::ParticipantJoined(_)))
        .await;
    assert!(matches!(joined, Some(RoomEvent::ParticipantJoined(p)) if p.id == c));

    let offer = carol.recv_kind("offer", SIGNAL_TIMEOUT_MS).await.unwrap();
    assert_eq!(offer.sender(), Some(&b));

    carol.close().await.unwrap();
    let left = bob
        .next_event(SIGNAL_TIMEOUT_MS, |e| matches!(e, RoomEvent::ParticipantLeft(_)))
        .await;
    assert_eq!(left, Some(RoomEvent::ParticipantLeft(c.clone())));

    let factory = bob.factory.clone();
    assert!(wait_until(|| factory.latest(&c).unwrap().is_closed(), SIGNAL_TIMEOUT_MS).await);
    let handle = bob.handle.clone();
    assert!(wait_until(|| handle.room_view().peers.is_empty(), SIGNAL_TIMEOUT_MS).await);
    assert_eq!(bob.handle.room_view().participants.len(), 1);
}

#[tokio::test]
async fn test_two_engines_negotiate_through_relay() {
    init_tracing();

    let addr = spawn_relay().await.unwrap();
    let mut alice = TestSession::join(config_for(addr), "a", Arc::new(VirtualDevices::new()))
        .await
        .unwrap();
    let bob = TestSession::join(config_for(addr), "b", Arc::new(VirtualDevices::new()))
        .await
        .unwrap();
    let (a, b) = (ParticipantId::from("a"), ParticipantId::from("b"));

    let (alice_handle, bob_handle) = (alice.handle.clone(), bob.handle.clone());
    let connected = wait_until(
        || {
            alice_handle.room_view().peer_state(&b) == Some(PeerState::Connected)
                && bob_handle.room_view().peer_state(&a) == Some(PeerState::Connected)
        },
        SIGNAL_TIMEOUT_MS,
    )
    .await;
    assert!(connected);

    let joined = alice
        .next_event(SIGNAL_TIMEOUT_MS, |e| matches!(e, RoomEvent::ParticipantJoined(_)))
        .await;
    assert!(matches!(joined, Some(RoomEvent::ParticipantJoined(p)) if p.id == b));

    // Both offered; "a" yielded by answering on a fresh transport.
    let alice_transports = alice.factory.transports_for(&b);
    assert_eq!(alice_transports.len(), 2);
    assert!(alice_transports[0].is_closed());
    assert_eq!(alice_transports[1].count(&TransportCall::CreateAnswer), 1);
    assert_eq!(bob.factory.transports_for(&a).len(), 1);
}
