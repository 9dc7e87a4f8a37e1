#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use pairchat_server::config::Config;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

pub type TestSocket =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Start the test app on a random TCP port and return the base URL.
pub async fn start_server() -> (String, sqlx::SqlitePool) {
    start_server_with(super::test_config()).await
}

pub async fn start_server_with(config: Config) -> (String, sqlx::SqlitePool) {
    let pool = super::setup_test_db().await;
    let app = super::create_test_app_with(pool.clone(), config);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base = format!("http://127.0.0.1:{}", addr.port());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    (base, pool)
}

pub async fn ws_connect(base: &str) -> TestSocket {
    let ws_url = format!("{}/socket", base.replace("http://", "ws://"));
    let (ws, _) = tokio_tungstenite::connect_async(&ws_url).await.unwrap();
    ws
}

/// Connect, join, and consume the history + joined replies.
pub async fn connect_and_join(base: &str, name: &str, user_id: &str) -> (TestSocket, Vec<Value>) {
    let mut ws = ws_connect(base).await;
    send_json(
        &mut ws,
        &json!({"type": "join", "displayName": name, "userId": user_id}),
    )
    .await;
    let history = recv_type(&mut ws, "message_history").await.expect("history");
    let joined = recv_type(&mut ws, "joined").await;
    assert!(joined.is_some(), "joined reply expected");
    let messages = history["messages"].as_array().cloned().unwrap_or_default();
    (ws, messages)
}

/// Read next text message parsed as JSON, with timeout.
pub async fn recv_json(ws: &mut TestSocket) -> Option<Value> {
    let timeout = tokio::time::timeout(std::time::Duration::from_secs(3), ws.next()).await;
    match timeout {
        Ok(Some(Ok(Message::Text(text)))) => serde_json::from_str(&text).ok(),
        _ => None,
    }
}

/// Skip frames until one with the given `type` arrives.
pub async fn recv_type(ws: &mut TestSocket, event_type: &str) -> Option<Value> {
    loop {
        let value = recv_json(ws).await?;
        if value["type"] == event_type {
            return Some(value);
        }
    }
}

/// Drain all pending messages until timeout.
pub async fn drain_messages(ws: &mut TestSocket) -> Vec<Value> {
    let mut messages = Vec::new();
    loop {
        let timeout =
            tokio::time::timeout(std::time::Duration::from_millis(200), ws.next()).await;
        match timeout {
            Ok(Some(Ok(Message::Text(text)))) => {
                if let Ok(v) = serde_json::from_str::<Value>(&text) {
                    messages.push(v);
                }
            }
            _ => break,
        }
    }
    messages
}

/// Send a JSON message over WebSocket.
pub async fn send_json(ws: &mut TestSocket, value: &Value) {
    ws.send(Message::Text(serde_json::to_string(value).unwrap().into()))
        .await
        .unwrap();
}
