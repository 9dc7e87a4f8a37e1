use chrono::{DateTime, SubsecRound, Utc};
use pairchat_shared::models::{Attachment, ReplyRef};
use pairchat_shared::validation::{
    identity_eq, validate_identity, validate_message_parts, ValidationError,
};

use crate::auth::Identity;
use crate::db::{NewMessage, StoreError};
use crate::AppState;
use crate::ws::events::{ConnectionId, ServerEvent};

/// Inbound `send_message` payload before normalization.
pub struct Draft {
    pub body: Option<String>,
    pub attachment: Option<Attachment>,
    pub reply_ref: Option<ReplyRef>,
    pub timestamp: Option<DateTime<Utc>>,
    pub client_message_id: Option<String>,
    pub author_name: Option<String>,
    pub author_id: Option<String>,
}

/// The joined session's identity wins; payload fields are only consulted
/// for a connection that never joined.
async fn resolve_identity(
    state: &AppState,
    connection_id: ConnectionId,
    claimed_name: Option<&str>,
    claimed_id: Option<&str>,
) -> Result<Identity, ValidationError> {
    if let Some(identity) = state.registry.identity_of(connection_id).await {
        if let Some(claimed) = claimed_id {
            if !identity_eq(claimed, &identity.user_id) {
                tracing::warn!(
                    connection_id,
                    claimed,
                    session = %identity.user_id,
                    "payload identity differs from session; using session"
                );
            }
        }
        return Ok(identity);
    }

    let name = claimed_name.unwrap_or("");
    let id = claimed_id.unwrap_or("");
    validate_identity(name, id)?;
    Ok(Identity {
        display_name: name.trim().to_string(),
        user_id: id.trim().to_string(),
    })
}

async fn reject(state: &AppState, connection_id: ConnectionId, message: String, client_message_id: Option<String>) {
    state
        .registry
        .send_to(connection_id, &ServerEvent::Error { message, client_message_id })
        .await;
}

pub async fn handle_send_message(state: &AppState, connection_id: ConnectionId, draft: Draft) {
    let attachment = draft.attachment.filter(|a| a.is_present());

    match validate_message_parts(draft.body.as_deref(), attachment.as_ref()) {
        Ok(()) => {}
        Err(ValidationError::EmptyMessage) => {
            tracing::debug!(connection_id, "empty message dropped");
            return;
        }
        Err(e) => {
            tracing::warn!(connection_id, error = %e, "message rejected");
            reject(state, connection_id, e.to_string(), draft.client_message_id).await;
            return;
        }
    }

    let identity = match resolve_identity(
        state,
        connection_id,
        draft.author_name.as_deref(),
        draft.author_id.as_deref(),
    )
    .await
    {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!(connection_id, error = %e, "message without author identity rejected");
            reject(state, connection_id, e.to_string(), draft.client_message_id).await;
            return;
        }
    };

    let body = draft
        .body
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty());

    let new_message = NewMessage {
        author_name: identity.display_name,
        author_id: identity.user_id,
        body,
        attachment,
        timestamp: draft.timestamp.unwrap_or_else(Utc::now).trunc_subsecs(3),
        reply_ref: draft.reply_ref,
        client_message_id: draft.client_message_id,
    };

    // Persistence is best-effort relative to delivery.
    let message = match state.store.insert_message(new_message.clone()).await {
        Ok(saved) => {
            tracing::info!(connection_id, id = %saved.id, author = %saved.author_name, "message saved");
            saved
        }
        Err(e) => {
            let provisional = uuid::Uuid::new_v4().to_string();
            tracing::error!(
                connection_id,
                error = %e,
                id = %provisional,
                "failed to save message; broadcasting unsaved copy"
            );
            new_message.with_id(provisional)
        }
    };

    state
        .registry
        .broadcast_all(&ServerEvent::ReceiveMessage { message }, None)
        .await;
}

pub async fn handle_delete_message(state: &AppState, connection_id: ConnectionId, id: String) {
    let id = id.trim().to_string();
    if id.is_empty() {
        state
            .registry
            .send_to(
                connection_id,
                &ServerEvent::DeleteMessageError {
                    id: None,
                    reason: "Message ID is required".into(),
                },
            )
            .await;
        return;
    }

    if let Err(e) = state.store.delete_message(&id).await {
        tracing::warn!(connection_id, %id, error = %e, "delete failed");
        let reason = match e {
            StoreError::NotFound => "Message not found".to_string(),
            other => other.to_string(),
        };
        state
            .registry
            .send_to(
                connection_id,
                &ServerEvent::DeleteMessageError {
                    id: Some(id),
                    reason,
                },
            )
            .await;
        return;
    }

    state.ephemeral.forget(&id).await;
    tracing::info!(connection_id, %id, "message deleted");

    state
        .registry
        .broadcast_all(&ServerEvent::MessageDeleted { id }, None)
        .await;
}

pub async fn handle_edit_message(
    state: &AppState,
    connection_id: ConnectionId,
    id: String,
    new_body: String,
) {
    if let Err(e) = validate_message_parts(Some(&new_body), None) {
        reject(state, connection_id, e.to_string(), None).await;
        return;
    }
    let new_body = new_body.trim().to_string();

    let Some(identity) = state.registry.identity_of(connection_id).await else {
        reject(state, connection_id, "Join the chat before editing".into(), None).await;
        return;
    };

    let existing = match state.store.get_message(&id).await {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(connection_id, %id, error = %e, "edit target unavailable");
            reject(state, connection_id, e.to_string(), None).await;
            return;
        }
    };

    if !existing.is_authored_by(&identity.user_id) {
        reject(state, connection_id, "Not your message".into(), None).await;
        return;
    }

    if let Err(e) = state.store.update_message_body(&id, &new_body).await {
        tracing::warn!(connection_id, %id, error = %e, "edit failed");
        reject(state, connection_id, e.to_string(), None).await;
        return;
    }

    state
        .registry
        .broadcast_all(&ServerEvent::MessageEdited { id, new_body }, None)
        .await;
}

/// Relayed to everyone else as-is. The sender owns the inactivity timeout
/// and must send `is_typing: false` itself.
pub async fn handle_typing(
    state: &AppState,
    connection_id: ConnectionId,
    display_name: String,
    is_typing: bool,
) {
    let display_name = match display_name.trim() {
        "" => match state.registry.identity_of(connection_id).await {
            Some(identity) => identity.display_name,
            None => return,
        },
        name => name.to_string(),
    };

    state
        .registry
        .broadcast_all(
            &ServerEvent::UserTyping {
                display_name,
                is_typing,
            },
            Some(connection_id),
        )
        .await;
}
