use huddle_client::RtcTransportFactory;
use huddle_client::media::{LocalTrack, TrackSource};
use huddle_client::transport::{
    MediaTransport, ReplaceOutcome, SdpKind, TransportEvent, TransportFactory,
};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::integration::init_tracing;
use crate::utils::SIGNAL_TIMEOUT_MS;

async fn transport(
    factory: &RtcTransportFactory,
    remote: &str,
) -> (Box<dyn MediaTransport>, mpsc::Receiver<TransportEvent>) {
    let (tx, rx) = mpsc::channel(256);
    let transport = factory
        .create(&remote.into(), tx)
        .await
        .expect("Failed to create transport");
    (transport, rx)
}

#[tokio::test]
async fn test_rtc_offer_answer_exchange() {
    init_tracing();

    let factory = RtcTransportFactory::new(Vec::new());
    let (alice, mut alice_events) = transport(&factory, "b").await;
    let (bob, _bob_events) = transport(&factory, "a").await;

    alice
        .add_track(LocalTrack::new(TrackSource::Microphone))
        .await
        .unwrap();
    alice
        .add_track(LocalTrack::new(TrackSource::Camera))
        .await
        .unwrap();

    let negotiation_needed = tokio::time::timeout(
        Duration::from_millis(SIGNAL_TIMEOUT_MS),
        async {
            while let Some(event) = alice_events.recv().await {
                if matches!(event, TransportEvent::NegotiationNeeded) {
                    return true;
                }
            }
            false
        },
    )
    .await
    .unwrap_or(false);
    assert!(negotiation_needed);

    let offer = alice.create_offer().await.unwrap();
    assert!(offer.starts_with("v=0"));
    assert!(offer.contains("m=audio"));
    assert!(offer.contains("m=video"));

    bob.set_remote_description(SdpKind::Offer, offer)
        .await
        .unwrap();
    let answer = bob.create_answer().await.unwrap();
    assert!(answer.starts_with("v=0"));

    alice
        .set_remote_description(SdpKind::Answer, answer)
        .await
        .unwrap();

    alice.close().await.unwrap();
    bob.close().await.unwrap();
}

#[tokio::test]
async fn test_rtc_answer_without_offer_is_rejected() {
    init_tracing();

    let factory = RtcTransportFactory::new(Vec::new());
    let (alice, _events) = transport(&factory, "b").await;

    assert!(alice.create_answer().await.is_err());
    alice.close().await.unwrap();
}

#[tokio::test]
async fn test_rtc_replace_track_reuses_sender() {
    init_tracing();

    let factory = RtcTransportFactory::new(Vec::new());
    let (alice, _events) = transport(&factory, "b").await;

    alice
        .add_track(LocalTrack::new(TrackSource::Camera))
        .await
        .unwrap();

    let outcome = alice
        .replace_track(LocalTrack::new(TrackSource::Screen))
        .await
        .unwrap();
    assert_eq!(outcome, ReplaceOutcome::Replaced);

    let outcome = alice
        .replace_track(LocalTrack::new(TrackSource::Microphone))
        .await
        .unwrap();
    assert_eq!(outcome, ReplaceOutcome::Added);

    alice.close().await.unwrap();
}
