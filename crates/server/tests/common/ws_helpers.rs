#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use huddle_server::ws::frame::Frame;
use huddle_server::{routes, AppState};
use std::sync::Arc;
use tokio_tungstenite::tungstenite::Message;

use super::RecordingPush;

pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

pub struct TestServer {
    pub base: String,
    pub pool: sqlx::SqlitePool,
    pub state: Arc<AppState>,
    pub push: Arc<RecordingPush>,
}

/// Start the test app on a random TCP port.
pub async fn start_server() -> TestServer {
    let pool = super::setup_test_db().await;
    let (state, push) = super::create_test_state(pool.clone());
    let app = routes::build_router(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base = format!("http://127.0.0.1:{}", addr.port());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    TestServer {
        base,
        pool,
        state,
        push,
    }
}

/// Open the STOMP websocket without sending anything.
pub async fn ws_open(base: &str) -> WsStream {
    let ws_url = format!("{}/stomp/chat", base.replace("http://", "ws://"));
    let (ws, _) = tokio_tungstenite::connect_async(&ws_url).await.unwrap();
    ws
}

pub async fn send_frame(ws: &mut WsStream, frame: Frame) {
    ws.send(Message::Text(frame.encode().into())).await.unwrap();
}

pub async fn send_raw(ws: &mut WsStream, raw: &str) {
    ws.send(Message::Text(raw.to_string().into())).await.unwrap();
}

/// Read the next STOMP frame, with timeout.
pub async fn recv_frame(ws: &mut WsStream) -> Option<Frame> {
    loop {
        let timeout = tokio::time::timeout(std::time::Duration::from_secs(3), ws.next()).await;
        match timeout {
            Ok(Some(Ok(Message::Text(text)))) => match Frame::parse(text.as_str()) {
                Ok(Some(frame)) => return Some(frame),
                _ => continue,
            },
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => continue,
            _ => return None,
        }
    }
}

/// Drain all pending frames until timeout.
pub async fn drain_frames(ws: &mut WsStream) -> Vec<Frame> {
    let mut frames = Vec::new();
    loop {
        let timeout =
            tokio::time::timeout(std::time::Duration::from_millis(200), ws.next()).await;
        match timeout {
            Ok(Some(Ok(Message::Text(text)))) => {
                if let Ok(Some(frame)) = Frame::parse(text.as_str()) {
                    frames.push(frame);
                }
            }
            _ => break,
        }
    }
    frames
}

/// True once the server has closed the socket.
pub async fn is_closed(ws: &mut WsStream) -> bool {
    loop {
        let timeout = tokio::time::timeout(std::time::Duration::from_secs(3), ws.next()).await;
        match timeout {
            Ok(None) | Ok(Some(Err(_))) | Ok(Some(Ok(Message::Close(_)))) => return true,
            Ok(Some(Ok(_))) => continue,
            Err(_) => return false,
        }
    }
}

pub fn connect_frame(token: &str) -> Frame {
    Frame::new("CONNECT")
        .header("accept-version", "1.2")
        .header("host", "localhost")
        .header("Authorization", format!("Bearer {}", token))
}

/// Open a socket and complete the CONNECT handshake.
pub async fn stomp_connect(base: &str, token: &str) -> WsStream {
    let mut ws = ws_open(base).await;
    send_frame(&mut ws, connect_frame(token)).await;
    let connected = recv_frame(&mut ws).await.expect("no CONNECTED frame");
    assert_eq!(connected.command, "CONNECTED");
    ws
}

/// Subscribe to a room topic and wait for the RECEIPT. Room events that
/// overtake the receipt are returned.
pub async fn subscribe_room(ws: &mut WsStream, subscription_id: &str, room_id: &str) -> Vec<Frame> {
    let receipt = format!("sub-{}", subscription_id);
    send_frame(
        ws,
        Frame::new("SUBSCRIBE")
            .header("id", subscription_id)
            .header("destination", format!("/topic/room.{}", room_id))
            .header("receipt", receipt.as_str()),
    )
    .await;

    let mut early = Vec::new();
    loop {
        let frame = recv_frame(ws).await.expect("no RECEIPT frame");
        if frame.command == "MESSAGE" {
            early.push(frame);
            continue;
        }
        assert_eq!(frame.command, "RECEIPT", "unexpected frame {:?}", frame);
        assert_eq!(frame.get("receipt-id"), Some(receipt.as_str()));
        return early;
    }
}

/// Read frames until a room event of the given `type` shows up.
pub async fn next_event(ws: &mut WsStream, event_type: &str) -> Option<(Frame, serde_json::Value)> {
    loop {
        let frame = recv_frame(ws).await?;
        if frame.command != "MESSAGE" {
            continue;
        }
        let body = payload(&frame);
        if body["type"] == event_type {
            return Some((frame, body));
        }
    }
}

pub fn chat_frame(room_id: &str, body: &str) -> Frame {
    Frame::new("SEND")
        .header("destination", "/pub/chat.message")
        .header("content-type", "application/json")
        .body(
            serde_json::json!({
                "roomId": room_id,
                "type": "TEXT",
                "message": body,
                "mention": [],
                "mentionAll": false,
            })
            .to_string(),
        )
}

/// Parse the JSON body of a MESSAGE frame.
pub fn payload(frame: &Frame) -> serde_json::Value {
    serde_json::from_str(&frame.body).unwrap()
}
