use chrono::Utc;
use pairchat_shared::validation::{validate_emoji, validate_identity};

use crate::db::StoreError;
use crate::AppState;
use crate::ws::events::{ConnectionId, ReactionAction, ServerEvent};

/// Reactions and receipts only make sense for messages the store knows.
/// An unreachable store does not block them.
async fn ensure_message_exists(state: &AppState, connection_id: ConnectionId, id: &str) -> bool {
    match state.store.get_message(id).await {
        Ok(_) => true,
        Err(StoreError::StorageUnavailable(e)) => {
            tracing::warn!(connection_id, id, error = %e, "store unavailable; accepting ephemeral update");
            true
        }
        Err(e) => {
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
            false
        }
    }
}

/// Session identity first, then whatever the payload claims.
async fn resolve_actor(state: &AppState, connection_id: ConnectionId, claimed: &str) -> Option<String> {
    if let Some(identity) = state.registry.identity_of(connection_id).await {
        return Some(identity.user_id);
    }
    let claimed = claimed.trim();
    validate_identity(claimed, claimed)
        .ok()
        .map(|_| claimed.to_string())
}

pub async fn handle_reaction(
    state: &AppState,
    connection_id: ConnectionId,
    id: String,
    emoji: String,
    actor: String,
    action: ReactionAction,
) {
    if validate_emoji(&emoji).is_err() {
        return;
    }
    let Some(actor) = resolve_actor(state, connection_id, &actor).await else {
        tracing::warn!(connection_id, %id, "reaction without identity ignored");
        return;
    };
    if !ensure_message_exists(state, connection_id, &id).await {
        return;
    }

    let emoji = emoji.trim().to_string();
    if !state.ephemeral.apply_reaction(&id, &emoji, &actor, action).await {
        return;
    }

    state
        .registry
        .broadcast_all(
            &ServerEvent::MessageReaction {
                id,
                emoji,
                actor,
                action,
            },
            None,
        )
        .await;
}

pub async fn handle_mark_read(
    state: &AppState,
    connection_id: ConnectionId,
    id: String,
    reader: String,
) {
    let Some(reader) = resolve_actor(state, connection_id, &reader).await else {
        tracing::warn!(connection_id, %id, "read receipt without identity ignored");
        return;
    };
    if !ensure_message_exists(state, connection_id, &id).await {
        return;
    }

    let Some(read_by) = state.ephemeral.mark_read(&id, &reader).await else {
        return;
    };

    state
        .registry
        .broadcast_all(
            &ServerEvent::MessageRead {
                id,
                read_by,
                read_at: Utc::now(),
            },
            None,
        )
        .await;
}
