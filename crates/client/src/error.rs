use pairchat_shared::validation::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("connection timed out")]
    Timeout,
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("malformed event: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("connection closed")]
    Closed,
    #[error(transparent)]
    Validation(#[from] ValidationError),
}
