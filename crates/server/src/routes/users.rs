use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use base64::Engine;
use regex_lite::Regex;
use serde::Deserialize;
use std::sync::{Arc, LazyLock};

use super::{error_response, store_error_response};
use crate::AppState;

static IMAGE_DATA_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^data:image/[A-Za-z0-9.+-]+;base64,([A-Za-z0-9+/]+={0,2})$")
        .expect("static regex")
});

#[derive(Debug, PartialEq, Eq)]
pub enum PhotoError {
    Missing,
    NotImageDataUrl,
    TooLarge,
}

impl PhotoError {
    fn message(&self) -> &'static str {
        match self {
            PhotoError::Missing => "Photo data is required",
            PhotoError::NotImageDataUrl => "Invalid photo format. Must be base64 image data URL.",
            PhotoError::TooLarge => "Photo is too large",
        }
    }
}

/// Checks the data URL shape, that the payload decodes, and its decoded size.
pub fn validate_photo_data_url(photo: &str, max_bytes: usize) -> Result<(), PhotoError> {
    if photo.is_empty() {
        return Err(PhotoError::Missing);
    }
    let payload = IMAGE_DATA_URL
        .captures(photo)
        .and_then(|c| c.get(1))
        .ok_or(PhotoError::NotImageDataUrl)?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(payload.as_str())
        .map_err(|_| PhotoError::NotImageDataUrl)?;
    if decoded.len() > max_bytes {
        return Err(PhotoError::TooLarge);
    }
    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPhotoRequest {
    #[serde(default)]
    pub photo_base64: Option<String>,
}

/// GET /api/user-photo/:username
pub async fn get_user_photo(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> impl IntoResponse {
    match state.store.get_user_photo(&username).await {
        Ok(Some(photo)) => Json(serde_json::json!({ "photo": photo })).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Photo not found"),
        Err(e) => {
            tracing::error!(%username, error = %e, "failed to fetch user photo");
            store_error_response(&e)
        }
    }
}

/// POST /api/user-photo/:username
pub async fn set_user_photo(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
    Json(body): Json<SetPhotoRequest>,
) -> impl IntoResponse {
    if username.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Username is required");
    }
    let photo = body.photo_base64.unwrap_or_default();
    if let Err(e) = validate_photo_data_url(&photo, state.config.max_photo_bytes) {
        return error_response(StatusCode::BAD_REQUEST, e.message());
    }

    match state.store.set_user_photo(&username, &photo).await {
        Ok(()) => {
            tracing::info!(%username, "profile photo updated");
            Json(serde_json::json!({
                "success": true,
                "message": "Profile photo updated successfully",
            }))
            .into_response()
        }
        Err(e) => {
            tracing::error!(%username, error = %e, "failed to save user photo");
            store_error_response(&e)
        }
    }
}
