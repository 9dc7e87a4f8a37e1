mod chat;
mod chat_ext;
mod lifecycle;

use axum::{
    extract::{State, WebSocketUpgrade, ws::{Message, WebSocket}},
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::AppState;
use crate::ws::events::{ClientEvent, ConnectionId, ReactionAction, ServerEvent};

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let connection_id = state.registry.connect(tx).await;
    tracing::info!(connection_id, "connection opened");

    // Task to forward messages from mpsc to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_tx.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    // Events on one connection are handled strictly in order. The task is
    // detached, so a store call already in flight when the socket drops
    // still completes and broadcasts.
    let state_clone = state.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                Message::Text(text) => {
                    let text_str: &str = &text;
                    match serde_json::from_str::<ClientEvent>(text_str) {
                        Ok(event) => handle_client_event(&state_clone, connection_id, event).await,
                        Err(e) => {
                            tracing::debug!(connection_id, error = %e, "ignoring unparseable frame");
                        }
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    lifecycle::handle_disconnect(&state, connection_id).await;
}

async fn handle_client_event(
    state: &AppState,
    connection_id: ConnectionId,
    event: ClientEvent,
) {
    // A closed allow-list admits nothing but `join` from a connection that
    // has not joined; payload identities are only honoured on an open list.
    if !state.allow_list.is_open()
        && !matches!(event, ClientEvent::Join { .. } | ClientEvent::Ping)
        && state.registry.identity_of(connection_id).await.is_none()
    {
        let client_message_id = match &event {
            ClientEvent::SendMessage { client_message_id, .. } => client_message_id.clone(),
            _ => None,
        };
        tracing::warn!(connection_id, "event from unjoined connection refused");
        state
            .registry
            .send_to(
                connection_id,
                &ServerEvent::Error {
                    message: "Join the chat first".into(),
                    client_message_id,
                },
            )
            .await;
        return;
    }

    match event {
        ClientEvent::Join {
            display_name,
            user_id,
            secret,
        } => {
            lifecycle::handle_join(state, connection_id, &display_name, &user_id, secret.as_deref())
                .await;
        }
        ClientEvent::SendMessage {
            body,
            attachment,
            reply_ref,
            timestamp,
            client_message_id,
            author_name,
            author_id,
        } => {
            let draft = chat::Draft {
                body,
                attachment,
                reply_ref,
                timestamp,
                client_message_id,
                author_name,
                author_id,
            };
            chat::handle_send_message(state, connection_id, draft).await;
        }
        ClientEvent::DeleteMessage { id } => {
            chat::handle_delete_message(state, connection_id, id).await;
        }
        ClientEvent::EditMessage { id, new_body } => {
            chat::handle_edit_message(state, connection_id, id, new_body).await;
        }
        ClientEvent::Typing { display_name, is_typing } => {
            chat::handle_typing(state, connection_id, display_name, is_typing).await;
        }
        ClientEvent::AddReaction { id, emoji, actor } => {
            chat_ext::handle_reaction(state, connection_id, id, emoji, actor, ReactionAction::Add).await;
        }
        ClientEvent::RemoveReaction { id, emoji, actor } => {
            chat_ext::handle_reaction(state, connection_id, id, emoji, actor, ReactionAction::Remove).await;
        }
        ClientEvent::MarkMessageRead { id, reader } => {
            chat_ext::handle_mark_read(state, connection_id, id, reader).await;
        }
        ClientEvent::Ping => {}
    }
}
