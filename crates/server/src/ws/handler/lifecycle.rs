use crate::AppState;
use crate::ws::events::{ConnectionId, ServerEvent};

pub async fn handle_join(
    state: &AppState,
    connection_id: ConnectionId,
    display_name: &str,
    user_id: &str,
    secret: Option<&str>,
) {
    let identity = match state.allow_list.admit(display_name, user_id, secret) {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!(connection_id, display_name, error = %e, "join rejected");
            state
                .registry
                .send_to(
                    connection_id,
                    &ServerEvent::Error {
                        message: e.to_string(),
                        client_message_id: None,
                    },
                )
                .await;
            return;
        }
    };

    if let Some(previous) = state.registry.join(connection_id, identity.clone()).await {
        tracing::debug!(connection_id, previous = %previous.display_name, "join replaced earlier identity");
    }

    // History failure degrades to an empty snapshot rather than a failed join.
    let mut messages = match state.store.list_messages(None).await {
        Ok(m) => m,
        Err(e) => {
            tracing::error!(connection_id, error = %e, "failed to load message history");
            Vec::new()
        }
    };
    state.ephemeral.decorate(&mut messages).await;
    tracing::info!(
        connection_id,
        display_name = %identity.display_name,
        history = messages.len(),
        "session joined"
    );

    state
        .registry
        .send_to(connection_id, &ServerEvent::MessageHistory { messages })
        .await;

    state
        .registry
        .send_to(
            connection_id,
            &ServerEvent::Joined {
                welcome_text: format!("Welcome {}!", identity.display_name),
                connection_id,
            },
        )
        .await;

    state
        .registry
        .broadcast_all(
            &ServerEvent::UserJoined {
                display_name: identity.display_name,
                user_id: identity.user_id,
            },
            Some(connection_id),
        )
        .await;
}

pub async fn handle_disconnect(state: &AppState, connection_id: ConnectionId) {
    let Some(session) = state.registry.disconnect(connection_id).await else {
        return;
    };

    match session.identity {
        Some(identity) => {
            tracing::info!(connection_id, display_name = %identity.display_name, "session left");
            state
                .registry
                .broadcast_all(
                    &ServerEvent::UserLeft {
                        display_name: identity.display_name,
                    },
                    None,
                )
                .await;
        }
        None => tracing::debug!(connection_id, "connection closed before join"),
    }
}
