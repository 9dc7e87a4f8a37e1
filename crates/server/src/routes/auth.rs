use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use std::sync::Arc;

use super::error_response;
use crate::auth::AuthError;
use crate::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub secret: String,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> impl IntoResponse {
    match state.allow_list.authenticate(&body.name, &body.secret) {
        Ok(identity) => Json(serde_json::json!({
            "displayName": identity.display_name,
            "userId": identity.user_id,
        }))
        .into_response(),
        Err(e @ AuthError::MissingCredentials) => {
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e @ AuthError::Rejected) => {
            tracing::warn!(name = %body.name, "login rejected");
            error_response(StatusCode::UNAUTHORIZED, e.to_string())
        }
    }
}
