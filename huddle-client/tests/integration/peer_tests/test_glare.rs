use huddle_client::PeerState;
use huddle_client::media::{LocalTrack, LocalTrackSet, TrackSource};
use huddle_client::transport::SdpKind;
use huddle_core::{IceCandidate, ParticipantId, SignalMessage};
use tokio::sync::watch;

use crate::integration::init_tracing;
use crate::utils::{PeerPair, SIGNAL_TIMEOUT_MS, TestPeer, TransportCall, wait_until};

#[tokio::test]
async fn test_simultaneous_offers_resolve_once() {
    init_tracing();

    let a = ParticipantId::from("a");
    let b = ParticipantId::from("b");
    let mut pair = PeerPair::new("a", "b");

    // Both learn about each other at once and both offer.
    assert!(pair.a.manager.ensure_session(&b));
    assert!(pair.b.manager.ensure_session(&a));

    let (a_id, b_id) = (a.clone(), b.clone());
    let settled = pair
        .pump_until(SIGNAL_TIMEOUT_MS, move |ma, mb| {
            ma.state(&b_id) == Some(PeerState::Connected)
                && mb.state(&a_id) == Some(PeerState::Connected)
        })
        .await;
    assert!(settled, "both sides should end up connected");

    // Let anything left in flight play out; nothing may loop.
    pair.pump_for(300).await;
    assert_eq!(pair.a.manager.state(&b), Some(PeerState::Connected));
    assert_eq!(pair.b.manager.state(&a), Some(PeerState::Connected));

    // "a" yields: the transport holding its offer is dropped and a fresh
    // one answers.
    let a_transports = pair.a.factory.transports_for(&b);
    assert_eq!(a_transports.len(), 2);
    assert!(a_transports[0].is_closed());
    assert_eq!(a_transports[0].count(&TransportCall::CreateOffer), 1);
    assert_eq!(a_transports[0].count(&TransportCall::SetRemote(SdpKind::Offer)), 0);

    let answering = &a_transports[1];
    assert!(!answering.is_closed());
    assert_eq!(answering.count(&TransportCall::CreateOffer), 0);
    assert_eq!(answering.count(&TransportCall::SetRemote(SdpKind::Offer)), 1);
    assert_eq!(answering.count(&TransportCall::CreateAnswer), 1);
    assert_eq!(pair.a.signaling.answers_to(&b), 1);

    // "b" keeps its offer and applies the answer.
    let b_transports = pair.b.factory.transports_for(&a);
    assert_eq!(b_transports.len(), 1);
    assert_eq!(b_transports[0].count(&TransportCall::CreateOffer), 1);
    assert_eq!(b_transports[0].count(&TransportCall::CreateAnswer), 0);
    assert_eq!(b_transports[0].count(&TransportCall::SetRemote(SdpKind::Answer)), 1);
    assert_eq!(pair.b.signaling.offers_to(&a), 1);
    assert_eq!(pair.b.signaling.answers_to(&a), 0);
}

#[tokio::test]
async fn test_yielding_side_keeps_tracks_and_buffered_candidates() {
    init_tracing();

    let camera = LocalTrack::new(TrackSource::Camera);
    let (_tracks_tx, tracks) = watch::channel(LocalTrackSet {
        audio: None,
        video: Some(camera.clone()),
    });
    let mut peer = TestPeer::new("a", tracks);
    let b = ParticipantId::from("b");

    peer.manager.ensure_session(&b);
    assert!(peer.wait_offers(&b, 1, SIGNAL_TIMEOUT_MS).await);

    // A candidate from "b" shows up before its colliding offer.
    peer.manager.handle_signal(SignalMessage::IceCandidate {
        from: b.clone(),
        target: "a".into(),
        candidate: IceCandidate::new("candidate:early"),
    });
    peer.manager.handle_signal(SignalMessage::Offer {
        from: b.clone(),
        target: "a".into(),
        sdp: "offer-from-b".into(),
    });

    assert!(peer.wait_state(&b, PeerState::Connected, SIGNAL_TIMEOUT_MS).await);

    let factory = peer.factory.clone();
    assert!(wait_until(|| factory.transports_for(&b).len() == 2, SIGNAL_TIMEOUT_MS).await);
    let replacement = peer.factory.latest(&b).unwrap();
    assert_eq!(
        replacement.calls(),
        vec![
            TransportCall::AddTrack(camera.id().to_owned()),
            TransportCall::SetRemote(SdpKind::Offer),
            TransportCall::AddCandidate("candidate:early".into()),
            TransportCall::CreateAnswer,
        ]
    );
    assert_eq!(peer.signaling.answers_to(&b), 1);
}

#[tokio::test]
async fn test_unsolicited_offer_creates_answering_session() {
    init_tracing();

    let a = ParticipantId::from("a");
    let b = ParticipantId::from("b");
    let mut pair = PeerPair::new("a", "b");

    // Only "b" knows about "a"; "a" learns of "b" from the offer itself.
    assert!(pair.b.manager.ensure_session(&a));

    let (a_id, b_id) = (a.clone(), b.clone());
    let settled = pair
        .pump_until(SIGNAL_TIMEOUT_MS, move |ma, mb| {
            ma.state(&b_id) == Some(PeerState::Connected)
                && mb.state(&a_id) == Some(PeerState::Connected)
        })
        .await;
    assert!(settled);

    let a_transport = pair.a.factory.latest(&b).unwrap();
    assert_eq!(a_transport.count(&TransportCall::CreateOffer), 0);
    assert_eq!(a_transport.count(&TransportCall::CreateAnswer), 1);
    assert_eq!(pair.a.factory.created_count(), 1);
    assert_eq!(pair.a.signaling.offers_to(&b), 0);
}
