use duet_client::peer::{NegotiationState, SdpType};
use duet_client::Role;
use duet_core::ClientMessage;

use crate::integration::init_tracing;
use crate::utils::{Harness, PeerCall, answer_from, member, offer_from};

#[tokio::test]
async fn test_member_present_first_initiates() {
    init_tracing();

    let mut h = Harness::created("r1", "Ana").await;
    let bob = member("Bob");
    h.server(duet_core::ServerMessage::UserJoined(bob.clone())).await;

    let out = h.drain_outbound();
    assert_eq!(
        out,
        vec![ClientMessage::Offer {
            sdp: "offer-1".into(),
            target_id: bob.id
        }]
    );

    let session = h.controller.session(&bob.id).expect("session for newcomer");
    assert_eq!(session.role(), Role::Initiator);
    assert_eq!(session.negotiation_state(), NegotiationState::HaveLocalOffer);

    let pc = h.factory.latest_for(&bob.id).unwrap();
    assert_eq!(
        pc.calls(),
        vec![
            PeerCall::CreateDataChannel("chat".into()),
            PeerCall::CreateOffer,
            PeerCall::SetLocal(SdpType::Offer, "offer-1".into()),
        ]
    );

    h.server(answer_from(&bob, "bob-answer")).await;
    let session = h.controller.session(&bob.id).unwrap();
    assert_eq!(session.negotiation_state(), NegotiationState::Stable);
    assert!(pc.calls().contains(&PeerCall::SetRemote(SdpType::Answer, "bob-answer".into())));
}

#[tokio::test]
async fn test_newcomer_answers_and_never_offers() {
    init_tracing();

    let ana = member("Ana");
    let mut h = Harness::joined("r1", "Bob", vec![ana.clone()]).await;

    // Joining alone must not start a negotiation.
    assert_eq!(h.controller.session_count(), 0);
    assert_eq!(h.factory.created_count(), 0);

    h.server(offer_from(&ana, "ana-offer")).await;

    let out = h.drain_outbound();
    assert_eq!(out.len(), 1);
    let ClientMessage::Answer { sdp, target_id } = &out[0] else {
        panic!("expected an answer, got {:?}", out[0]);
    };
    assert_eq!(*target_id, ana.id);
    assert_eq!(sdp, "answer-1");

    let session = h.controller.session(&ana.id).unwrap();
    assert_eq!(session.role(), Role::Responder);
    assert_eq!(session.negotiation_state(), NegotiationState::Stable);

    let pc = h.factory.latest_for(&ana.id).unwrap();
    assert_eq!(pc.count(|c| matches!(c, PeerCall::CreateOffer)), 0);
    assert_eq!(pc.count(|c| matches!(c, PeerCall::CreateDataChannel(_))), 0);
    assert_eq!(
        pc.calls(),
        vec![
            PeerCall::SetRemote(SdpType::Offer, "ana-offer".into()),
            PeerCall::CreateAnswer,
            PeerCall::SetLocal(SdpType::Answer, "answer-1".into()),
        ]
    );
}

#[tokio::test]
async fn test_offer_to_initiator_is_dropped() {
    init_tracing();

    let mut h = Harness::created("r1", "Ana").await;
    let bob = member("Bob");
    h.server(duet_core::ServerMessage::UserJoined(bob.clone())).await;
    h.drain_outbound();

    h.server(offer_from(&bob, "glare-offer")).await;

    assert!(h.drain_outbound().is_empty());
    assert_eq!(h.factory.created_count(), 1);
    let session = h.controller.session(&bob.id).unwrap();
    assert_eq!(session.role(), Role::Initiator);
    assert_eq!(session.negotiation_state(), NegotiationState::HaveLocalOffer);
}

#[tokio::test]
async fn test_repeated_offer_is_ignored_by_responder() {
    init_tracing();

    let ana = member("Ana");
    let mut h = Harness::joined("r1", "Bob", vec![ana.clone()]).await;

    h.server(offer_from(&ana, "ana-offer")).await;
    h.server(offer_from(&ana, "ana-offer")).await;

    assert_eq!(h.drain_outbound().len(), 1);
    assert_eq!(h.factory.created_count(), 1);
}

#[tokio::test]
async fn test_offer_outside_a_room_is_dropped() {
    init_tracing();

    let mut h = Harness::connected().await;
    h.server(offer_from(&member("Ana"), "ana-offer")).await;

    assert!(h.drain_outbound().is_empty());
    assert_eq!(h.factory.created_count(), 0);
}
