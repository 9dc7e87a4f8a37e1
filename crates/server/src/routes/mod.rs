pub mod auth;
pub mod health;
pub mod messages;
pub mod users;

use crate::db::StoreError;
use crate::ws;
use crate::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};

pub fn build_router(state: Arc<AppState>) -> Router {
    // Base64 inflates the photo by 4/3; leave room for the JSON envelope.
    let photo_body_limit = state.config.max_photo_bytes / 3 * 4 + 4096;

    let api_routes = Router::new()
        .route("/health", get(health::health))
        .route("/auth/login", post(auth::login))
        .route("/messages", get(messages::list_messages))
        .route("/messages/author/{authorId}", get(messages::list_author_messages))
        .route(
            "/user-photo/{username}",
            get(users::get_user_photo)
                .post(users::set_user_photo)
                .layer(DefaultBodyLimit::max(photo_body_limit)),
        );

    let index = state.config.static_dir.join("index.html");
    let static_files = ServeDir::new(&state.config.static_dir).not_found_service(ServeFile::new(index));

    Router::new()
        .nest("/api", api_routes)
        .route("/socket", get(ws::handler::ws_handler))
        .fallback_service(static_files)
        .with_state(state)
}

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({"error": message.into()}))).into_response()
}

pub(crate) fn store_error_response(e: &StoreError) -> Response {
    match e {
        StoreError::StorageUnavailable(_) => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, "Database unavailable")
        }
        StoreError::NotFound => error_response(StatusCode::NOT_FOUND, "Not found"),
        StoreError::InvalidId(_) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
        StoreError::Corrupt(_) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read data")
        }
    }
}
