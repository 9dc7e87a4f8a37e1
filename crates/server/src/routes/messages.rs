use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use super::store_error_response;
use crate::AppState;

#[derive(Deserialize)]
pub struct MessageQuery {
    pub limit: Option<i64>,
}

/// GET /api/messages
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MessageQuery>,
) -> impl IntoResponse {
    match state.store.list_messages(query.limit).await {
        Ok(mut messages) => {
            state.ephemeral.decorate(&mut messages).await;
            Json(messages).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to list messages");
            store_error_response(&e)
        }
    }
}

/// GET /api/messages/author/:authorId
pub async fn list_author_messages(
    State(state): State<Arc<AppState>>,
    Path(author_id): Path<String>,
    Query(query): Query<MessageQuery>,
) -> impl IntoResponse {
    match state.store.list_messages_by_author(&author_id, query.limit).await {
        Ok(mut messages) => {
            state.ephemeral.decorate(&mut messages).await;
            Json(messages).into_response()
        }
        Err(e) => {
            tracing::error!(%author_id, error = %e, "failed to list author messages");
            store_error_response(&e)
        }
    }
}
