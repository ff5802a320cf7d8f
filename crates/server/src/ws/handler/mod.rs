mod chat;
mod lifecycle;
mod subscriptions;

use axum::{
    extract::{State, WebSocketUpgrade, ws::{Message, WebSocket}},
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::AppState;
use crate::error::{ChatError, ChatResult};
use crate::ws::frame::{Frame, FrameError};
use crate::ws::gateway::ClientId;
use crate::ws::session::{Admitted, ClientCommand, Session};

const STOMP_SUBPROTOCOLS: [&str; 3] = ["v12.stomp", "v11.stomp", "v10.stomp"];

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.protocols(STOMP_SUBPROTOCOLS)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let client_id = state.gateway.next_client_id().await;
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    state.gateway.register(client_id, tx).await;
    tracing::debug!(client_id, "STOMP socket opened");

    // Drains everything queued for this client, including a final ERROR
    // frame, before closing.
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_tx.send(Message::Text(msg.into())).await.is_err() {
                return;
            }
        }
        let _ = ws_tx.send(Message::Close(None)).await;
    });

    // Receive loop. The session lives here and nowhere else.
    let state_clone = state.clone();
    let recv_task = tokio::spawn(async move {
        let mut session = Session::new();
        while let Some(Ok(msg)) = ws_rx.next().await {
            let text = match msg {
                Message::Text(text) => text.as_str().to_string(),
                Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => text,
                    Err(_) => continue,
                },
                Message::Close(_) => break,
                _ => continue,
            };
            handle_text(&state_clone, client_id, &mut session, &text).await;
            if session.is_terminated() {
                break;
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    lifecycle::handle_disconnect(&state, client_id).await;
}

async fn handle_text(state: &AppState, client_id: ClientId, session: &mut Session, text: &str) {
    let frame = match Frame::parse(text) {
        Ok(Some(frame)) => frame,
        // heart-beat
        Ok(None) => return,
        Err(e) => {
            let error = match e {
                FrameError::MissingCommand => ChatError::UnsupportedOperation(e.to_string()),
                _ => ChatError::InvalidArgument(e.to_string()),
            };
            send_error(state, client_id, &error, None).await;
            return;
        }
    };

    let receipt = frame.get("receipt").map(str::to_string);
    let result = dispatch(state, client_id, session, frame).await;

    match result {
        Ok(()) => {
            if let Some(receipt_id) = receipt {
                let frame = Frame::new("RECEIPT").header("receipt-id", receipt_id);
                state.gateway.send_to(client_id, &frame).await;
            }
        }
        Err(e) => send_error(state, client_id, &e, receipt.as_deref()).await,
    }
}

async fn dispatch(
    state: &AppState,
    client_id: ClientId,
    session: &mut Session,
    frame: Frame,
) -> ChatResult<()> {
    match session.admit(frame)? {
        Admitted::Connect { credential } => {
            lifecycle::connect(state, client_id, session, credential).await
        }
        Admitted::Frame { command, frame, user } => match command {
            ClientCommand::Send => chat::handle_send(state, &user, &frame).await,
            ClientCommand::Subscribe => {
                subscriptions::subscribe(state, client_id, &user, &frame).await
            }
            ClientCommand::Unsubscribe => {
                subscriptions::unsubscribe(state, client_id, &user, &frame).await
            }
            ClientCommand::Disconnect => {
                lifecycle::disconnect(state, session, &user).await;
                Ok(())
            }
            ClientCommand::Connect | ClientCommand::Other(_) => Err(
                ChatError::UnsupportedOperation(format!("Unsupported command: {}", frame.command)),
            ),
        },
    }
}

async fn send_error(state: &AppState, client_id: ClientId, error: &ChatError, receipt: Option<&str>) {
    if let ChatError::Database(e) = error {
        tracing::error!(client_id, "Frame failed: {}", e);
    } else {
        tracing::debug!(client_id, code = error.code(), "Frame rejected: {}", error);
    }

    let mut frame = Frame::new("ERROR")
        .header("message", error.code())
        .header("content-type", "text/plain")
        .body(error.client_message());
    if let Some(receipt_id) = receipt {
        frame = frame.header("receipt-id", receipt_id);
    }
    state.gateway.send_to(client_id, &frame).await;
}
