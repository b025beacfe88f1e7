use duet_core::{ClientMessage, ErrorCode, ServerMessage};

use crate::integration::{create_test_coordinator, init_tracing};
use crate::utils::{SIGNAL_TIMEOUT_MS, connect, create_room, join_room, send, settle};

async fn expect_invalid(signaling: &crate::utils::MockSignalingOutput, id: &duet_core::ConnectionId) -> String {
    let err = signaling
        .wait_for(id, SIGNAL_TIMEOUT_MS, |m| {
            matches!(
                m,
                ServerMessage::Error {
                    code: ErrorCode::InvalidRequest,
                    ..
                }
            )
        })
        .await
        .expect("invalid-request error");
    match err {
        ServerMessage::Error { message, .. } => message,
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn test_create_without_name_is_rejected() {
    init_tracing();

    let (cmd_tx, signaling, _store) = create_test_coordinator();
    let a = connect(&cmd_tx).await.unwrap();

    send(
        &cmd_tx,
        a,
        ClientMessage::CreateRoom {
            room_id: Some("r1".into()),
            display_name: "   ".into(),
        },
    )
    .await
    .unwrap();

    let message = expect_invalid(&signaling, &a).await;
    assert!(message.contains("Username"));

    // nothing was created
    let b = connect(&cmd_tx).await.unwrap();
    let reply = join_room(&cmd_tx, &signaling, b, "r1", "Bob").await.unwrap();
    assert_eq!(reply, ServerMessage::RoomNotFound {});
}

#[tokio::test]
async fn test_join_without_room_id_is_rejected() {
    init_tracing();

    let (cmd_tx, signaling, _store) = create_test_coordinator();
    let a = connect(&cmd_tx).await.unwrap();

    let reply = join_room(&cmd_tx, &signaling, a, "", "Ana").await.unwrap();
    assert!(matches!(
        reply,
        ServerMessage::Error {
            code: ErrorCode::InvalidRequest,
            ..
        }
    ));
}

#[tokio::test]
async fn test_member_cannot_join_second_room() {
    init_tracing();

    let (cmd_tx, signaling, _store) = create_test_coordinator();
    let a = connect(&cmd_tx).await.unwrap();
    let b = connect(&cmd_tx).await.unwrap();

    create_room(&cmd_tx, &signaling, a, "r1", "Ana").await.unwrap();
    create_room(&cmd_tx, &signaling, b, "r2", "Bob").await.unwrap();

    let reply = join_room(&cmd_tx, &signaling, a, "r2", "Ana").await.unwrap();
    assert!(matches!(reply, ServerMessage::Error { .. }));
    settle().await;

    // B is still alone in r2
    assert!(
        !signaling
            .messages_for(&b)
            .await
            .iter()
            .any(|m| matches!(m, ServerMessage::UserJoined(_)))
    );
}

#[tokio::test]
async fn test_chat_outside_room_is_rejected() {
    init_tracing();

    let (cmd_tx, signaling, _store) = create_test_coordinator();
    let a = connect(&cmd_tx).await.unwrap();

    send(
        &cmd_tx,
        a,
        ClientMessage::ChatMessage {
            body: "hello?".into(),
            file_ref: None,
        },
    )
    .await
    .unwrap();

    expect_invalid(&signaling, &a).await;
}
