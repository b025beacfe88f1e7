use duet_client::{ClientError, ClientEvent};
use duet_core::{ClientMessage, ErrorCode, ServerMessage, SignalError};

use crate::integration::init_tracing;
use crate::utils::Harness;

#[tokio::test]
async fn test_full_room_is_reported_and_clears_pending() {
    init_tracing();

    let mut h = Harness::connected().await;
    h.controller.join_room("r1", "Bob").unwrap();
    assert_eq!(
        h.drain_outbound(),
        vec![ClientMessage::JoinRoom {
            room_id: "r1".into(),
            display_name: "Bob".into()
        }]
    );

    h.server(ServerMessage::RoomFull {}).await;
    assert_eq!(
        h.drain_ui(),
        vec![ClientEvent::Rejected {
            reason: "Room r1 is full.".into()
        }]
    );
    assert!(h.controller.room_id().is_none());

    // The failed attempt does not block another one.
    assert!(h.controller.join_room("r2", "Bob").is_ok());
}

#[tokio::test]
async fn test_missing_room_is_reported() {
    init_tracing();

    let mut h = Harness::connected().await;
    h.controller.join_room("ghost", "Bob").unwrap();
    h.server(ServerMessage::RoomNotFound {}).await;

    assert_eq!(
        h.drain_ui(),
        vec![ClientEvent::Rejected {
            reason: "Room ghost does not exist.".into()
        }]
    );
}

#[tokio::test]
async fn test_create_conflict_reason_comes_from_server() {
    init_tracing();

    let mut h = Harness::connected().await;
    h.controller.create_room(Some("r1".into()), "Ana").unwrap();
    let message = "Room r1 already exists. Please choose another ID or join it.".to_string();
    h.server(ServerMessage::Error {
        code: ErrorCode::AlreadyExists,
        message: message.clone(),
    })
    .await;

    assert_eq!(h.drain_ui(), vec![ClientEvent::Rejected { reason: message }]);
}

#[tokio::test]
async fn test_second_request_while_pending_is_refused() {
    init_tracing();

    let mut h = Harness::connected().await;
    h.controller.create_room(None, "Ana").unwrap();

    assert!(matches!(
        h.controller.join_room("r1", "Ana"),
        Err(ClientError::RequestPending)
    ));
    assert_eq!(h.drain_outbound().len(), 1);
}

#[tokio::test]
async fn test_request_inside_a_room_is_refused() {
    init_tracing();

    let mut h = Harness::created("r1", "Ana").await;
    assert!(matches!(
        h.controller.create_room(Some("r2".into()), "Ana"),
        Err(ClientError::AlreadyInRoom(_))
    ));
    assert!(h.drain_outbound().is_empty());
}

#[tokio::test]
async fn test_invalid_input_is_caught_before_sending() {
    init_tracing();

    let mut h = Harness::connected().await;
    assert!(matches!(
        h.controller.join_room("r1", "   "),
        Err(ClientError::Signal(SignalError::InvalidRequest(_)))
    ));
    assert!(matches!(
        h.controller.join_room("", "Bob"),
        Err(ClientError::Signal(SignalError::InvalidRequest(_)))
    ));
    assert!(h.drain_outbound().is_empty());

    // A blank room id on create asks the server to pick one.
    h.controller.create_room(Some("  ".into()), "Ana").unwrap();
    assert_eq!(
        h.drain_outbound(),
        vec![ClientMessage::CreateRoom {
            room_id: None,
            display_name: "Ana".into()
        }]
    );
}

#[tokio::test]
async fn test_created_room_uses_requested_name() {
    init_tracing();

    let mut h = Harness::connected().await;
    h.controller.create_room(None, "  Ana ").unwrap();
    assert_eq!(
        h.drain_outbound(),
        vec![ClientMessage::CreateRoom {
            room_id: None,
            display_name: "Ana".into()
        }]
    );

    h.server(ServerMessage::RoomCreated {
        room_id: duet_core::RoomId::parse("k3j9x2a").unwrap(),
        epoch: 4,
    })
    .await;

    assert_eq!(h.controller.room_id().map(|r| r.as_str()), Some("k3j9x2a"));
    assert!(h.drain_ui().contains(&ClientEvent::RoomCreated {
        room_id: duet_core::RoomId::parse("k3j9x2a").unwrap()
    }));
}
