use duet_client::peer::{CANDIDATE_BUFFER_LIMIT, NegotiationState, SdpType};
use duet_client::controller::EARLY_CANDIDATE_LIMIT;
use duet_core::ServerMessage;

use crate::integration::init_tracing;
use crate::utils::{
    Harness, PeerCall, answer_from, candidate, candidate_from, member, offer_from,
};

#[tokio::test]
async fn test_candidate_before_answer_is_applied_after_it() {
    init_tracing();

    let mut h = Harness::created("r1", "Ana").await;
    let bob = member("Bob");
    h.server(ServerMessage::UserJoined(bob.clone())).await;

    h.server(candidate_from(&bob, candidate(1))).await;
    h.server(candidate_from(&bob, candidate(2))).await;

    let pc = h.factory.latest_for(&bob.id).unwrap();
    assert_eq!(pc.count(|c| matches!(c, PeerCall::AddCandidate(_))), 0);
    assert_eq!(h.controller.session(&bob.id).unwrap().pending_candidate_count(), 2);

    h.server(answer_from(&bob, "bob-answer")).await;

    let remote_at = pc
        .position(|c| matches!(c, PeerCall::SetRemote(SdpType::Answer, _)))
        .unwrap();
    let first_candidate_at = pc
        .position(|c| matches!(c, PeerCall::AddCandidate(_)))
        .unwrap();
    assert!(remote_at < first_candidate_at);
    assert_eq!(pc.count(|c| matches!(c, PeerCall::AddCandidate(_))), 2);
    assert_eq!(h.controller.session(&bob.id).unwrap().pending_candidate_count(), 0);

    // Once the remote description is in place candidates go straight through.
    h.server(candidate_from(&bob, candidate(3))).await;
    assert!(pc.calls().contains(&PeerCall::AddCandidate(candidate(3))));
}

#[tokio::test]
async fn test_candidate_before_offer_is_handed_to_responder() {
    init_tracing();

    let ana = member("Ana");
    let mut h = Harness::joined("r1", "Bob", vec![ana.clone()]).await;

    h.server(candidate_from(&ana, candidate(1))).await;
    assert_eq!(h.controller.early_candidate_count(&ana.id), 1);
    assert_eq!(h.factory.created_count(), 0);

    h.server(offer_from(&ana, "ana-offer")).await;

    let pc = h.factory.latest_for(&ana.id).unwrap();
    assert_eq!(
        pc.calls()[..3],
        [
            PeerCall::SetRemote(SdpType::Offer, "ana-offer".into()),
            PeerCall::AddCandidate(candidate(1)),
            PeerCall::CreateAnswer,
        ]
    );
    assert_eq!(h.controller.early_candidate_count(&ana.id), 0);
}

#[tokio::test]
async fn test_early_candidates_are_bounded() {
    init_tracing();

    let ana = member("Ana");
    let mut h = Harness::joined("r1", "Bob", vec![ana.clone()]).await;

    for n in 0..(EARLY_CANDIDATE_LIMIT as u32 + 10) {
        h.server(candidate_from(&ana, candidate(n))).await;
    }
    assert_eq!(h.controller.early_candidate_count(&ana.id), EARLY_CANDIDATE_LIMIT);
}

#[tokio::test]
async fn test_candidate_from_stranger_is_dropped() {
    init_tracing();

    let mut h = Harness::created("r1", "Ana").await;
    let stranger = member("Eve");

    h.server(candidate_from(&stranger, candidate(1))).await;

    assert_eq!(h.controller.early_candidate_count(&stranger.id), 0);
    assert_eq!(h.factory.created_count(), 0);
}

#[tokio::test]
async fn test_failed_remote_description_does_not_leave_a_session() {
    init_tracing();

    let ana = member("Ana");
    let mut h = Harness::joined("r1", "Bob", vec![ana.clone()]).await;
    h.server(candidate_from(&ana, candidate(1))).await;

    // The mock refuses empty descriptions.
    h.server(offer_from(&ana, "")).await;

    assert!(h.controller.session(&ana.id).is_none());
    assert!(h.drain_outbound().is_empty());
    assert!(h.factory.latest_for(&ana.id).unwrap().is_closed());
    assert!(h.drain_ui().iter().any(|e| matches!(
        e,
        duet_client::ClientEvent::ConnectionError { peer_id, .. } if *peer_id == ana.id
    )));
}

#[tokio::test]
async fn test_candidates_awaiting_answer_are_bounded() {
    init_tracing();

    let mut h = Harness::created("r1", "Ana").await;
    let bob = member("Bob");
    h.server(ServerMessage::UserJoined(bob.clone())).await;

    for n in 0..(CANDIDATE_BUFFER_LIMIT as u32 + 10) {
        h.server(candidate_from(&bob, candidate(n))).await;
    }

    let session = h.controller.session(&bob.id).expect("session for Bob");
    assert_eq!(session.negotiation_state(), NegotiationState::HaveLocalOffer);
    assert_eq!(session.pending_candidate_count(), CANDIDATE_BUFFER_LIMIT);

    // only the kept ones are applied once the answer lands
    h.server(answer_from(&bob, "bob-answer")).await;
    let pc = h.factory.latest_for(&bob.id).unwrap();
    assert_eq!(
        pc.count(|c| matches!(c, PeerCall::AddCandidate(_))),
        CANDIDATE_BUFFER_LIMIT
    );
    assert!(pc.calls().contains(&PeerCall::AddCandidate(candidate(0))));
}
