use duet_core::{ClientMessage, ConnectionId, ServerMessage};

use crate::integration::{create_test_coordinator, init_tracing};
use crate::utils::{SIGNAL_TIMEOUT_MS, connect, create_room, join_room, send, settle};

#[tokio::test]
async fn test_offer_to_unknown_target_is_silently_dropped() {
    init_tracing();

    let (cmd_tx, signaling, _store) = create_test_coordinator();
    let a = connect(&cmd_tx).await.unwrap();
    create_room(&cmd_tx, &signaling, a, "r1", "Ana").await.unwrap();
    let before = signaling.count_for(&a).await;

    send(
        &cmd_tx,
        a,
        ClientMessage::Offer {
            sdp: "v=0".into(),
            target_id: ConnectionId::new(),
        },
    )
    .await
    .unwrap();
    settle().await;

    // no error frame for the sender
    assert_eq!(signaling.count_for(&a).await, before);
}

#[tokio::test]
async fn test_relay_survives_target_socket_closing() {
    init_tracing();

    let (cmd_tx, signaling, _store) = create_test_coordinator();
    let a = connect(&cmd_tx).await.unwrap();
    let b = connect(&cmd_tx).await.unwrap();

    create_room(&cmd_tx, &signaling, a, "r1", "Ana").await.unwrap();
    join_room(&cmd_tx, &signaling, b, "r1", "Bob").await.unwrap();

    // B's socket is gone but its Disconnected has not been processed yet
    signaling.drop_connection(b).await;
    send(
        &cmd_tx,
        a,
        ClientMessage::Offer {
            sdp: "v=0".into(),
            target_id: b,
        },
    )
    .await
    .unwrap();

    // coordinator keeps serving A
    send(
        &cmd_tx,
        a,
        ClientMessage::ChatMessage {
            body: "anyone?".into(),
            file_ref: None,
        },
    )
    .await
    .unwrap();
    signaling
        .wait_for(&a, SIGNAL_TIMEOUT_MS, |m| matches!(m, ServerMessage::ChatMessage(_)))
        .await
        .expect("coordinator still alive");
}

#[tokio::test]
async fn test_relay_across_rooms_is_refused() {
    init_tracing();

    let (cmd_tx, signaling, _store) = create_test_coordinator();
    let a = connect(&cmd_tx).await.unwrap();
    let c = connect(&cmd_tx).await.unwrap();

    create_room(&cmd_tx, &signaling, a, "r1", "Ana").await.unwrap();
    create_room(&cmd_tx, &signaling, c, "r2", "Cid").await.unwrap();

    send(
        &cmd_tx,
        a,
        ClientMessage::Offer {
            sdp: "v=0".into(),
            target_id: c,
        },
    )
    .await
    .unwrap();
    settle().await;

    assert!(
        !signaling
            .messages_for(&c)
            .await
            .iter()
            .any(|m| matches!(m, ServerMessage::Offer { .. }))
    );
}
