use duet_client::peer::TrackKind;
use duet_client::{ClientEvent, PeerEventKind, Slot};
use duet_core::ServerMessage;

use crate::integration::init_tracing;
use crate::utils::{Harness, member, offer_from};

fn layout_events(events: &[ClientEvent]) -> Vec<&ClientEvent> {
    events
        .iter()
        .filter(|e| matches!(e, ClientEvent::LayoutChanged { .. }))
        .collect()
}

#[tokio::test]
async fn test_entering_a_room_shows_local_as_primary() {
    init_tracing();

    let h = Harness::created("r1", "Ana").await;
    assert_eq!(h.controller.layout().primary(), Some(Slot::Local));
    assert_eq!(h.controller.layout().mini(), None);
}

#[tokio::test]
async fn test_remote_track_swaps_once() {
    init_tracing();

    let ana = member("Ana");
    let mut h = Harness::joined("r1", "Bob", vec![ana.clone()]).await;
    h.server(offer_from(&ana, "ana-offer")).await;
    let pc = h.factory.latest_for(&ana.id).unwrap();
    h.drain_ui();

    pc.emit(PeerEventKind::RemoteTrack(TrackKind::Audio));
    pc.emit(PeerEventKind::RemoteTrack(TrackKind::Video));
    pc.emit(PeerEventKind::RemoteTrack(TrackKind::Video));
    h.pump().await;

    let events = h.drain_ui();
    assert_eq!(
        layout_events(&events),
        vec![&ClientEvent::LayoutChanged {
            primary: Some(Slot::Remote(ana.id)),
            mini: Some(Slot::Local),
        }]
    );
}

#[tokio::test]
async fn test_peer_leaving_restores_local_primary() {
    init_tracing();

    let mut h = Harness::created("r1", "Ana").await;
    let bob = member("Bob");
    h.server(ServerMessage::UserJoined(bob.clone())).await;
    let pc = h.factory.latest_for(&bob.id).unwrap();
    pc.emit(PeerEventKind::RemoteTrack(TrackKind::Video));
    h.pump().await;
    assert!(h.controller.layout().has_remote());
    h.drain_ui();

    h.server(ServerMessage::UserLeft(bob.clone())).await;

    assert_eq!(h.controller.layout().primary(), Some(Slot::Local));
    assert_eq!(h.controller.layout().mini(), None);
    assert_eq!(layout_events(&h.drain_ui()).len(), 1);

    // A track event racing the departure changes nothing.
    pc.emit(PeerEventKind::RemoteTrack(TrackKind::Audio));
    h.pump().await;
    assert_eq!(h.controller.layout().primary(), Some(Slot::Local));
    assert!(layout_events(&h.drain_ui()).is_empty());
}
