use crate::{RoomCommand, SignalingService};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use duet_core::{ClientMessage, ConnectionId, ServerMessage, SignalError};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(service): State<SignalingService>,
) -> impl IntoResponse {
    let connection_id = ConnectionId::new();

    ws.on_upgrade(move |socket| handle_socket(socket, connection_id, service))
}

async fn handle_socket(socket: WebSocket, connection_id: ConnectionId, service: SignalingService) {
    info!(connection = %connection_id, "WebSocket connected");

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    service.add_connection(connection_id, tx);

    let welcome = ServerMessage::Welcome {
        connection_id,
        ice_servers: service.ice_servers(),
    };
    let _ = service.send(&connection_id, &welcome);

    if service
        .command_tx
        .send(RoomCommand::Connected { connection_id })
        .await
        .is_err()
    {
        error!("Coordinator is gone, refusing connection {}", connection_id);
        service.remove_connection(&connection_id);
        return;
    }

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let service = service.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(message) => {
                            let cmd = RoomCommand::Signal {
                                connection_id,
                                message,
                            };
                            if let Err(e) = service.command_tx.send(cmd).await {
                                error!("Coordinator died: {}", e);
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(connection = %connection_id, "Invalid client frame: {}", e);
                            let err = SignalError::invalid(format!("Malformed message: {e}"));
                            if let Some(reply) = err.to_server_message() {
                                let _ = service.send(&connection_id, &reply);
                            }
                        }
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    service.remove_connection(&connection_id);
    let _ = service
        .command_tx
        .send(RoomCommand::Disconnected { connection_id })
        .await;

    info!(connection = %connection_id, "WebSocket disconnected");
}
