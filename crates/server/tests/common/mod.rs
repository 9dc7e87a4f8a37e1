#![allow(dead_code)]

pub mod ws_helpers;

use axum::Router;
use pairchat_server::{config::Config, db, routes, AppState};
use sqlx::sqlite::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

/// Create an in-memory SQLite pool with schema applied.
pub async fn setup_test_db() -> SqlitePool {
    db::init_memory_pool()
        .await
        .expect("Failed to create in-memory SQLite pool")
}

pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".into(),
        port: 0,
        database_path: ":memory:".into(),
        history_limit: 100,
        store_timeout: Duration::from_secs(5),
        static_dir: "/tmp/pairchat-test-static".into(),
        allowed_users: Vec::new(),
        retention_days: None,
        max_photo_bytes: 1024,
    }
}

pub fn test_state(pool: SqlitePool, config: Config) -> Arc<AppState> {
    Arc::new(AppState::new(pool, config))
}

/// Build a test Axum app with the given pool.
pub fn create_test_app(pool: SqlitePool) -> Router {
    routes::build_router(test_state(pool, test_config()))
}

pub fn create_test_app_with(pool: SqlitePool, config: Config) -> Router {
    routes::build_router(test_state(pool, config))
}

/// Insert a message directly. Returns its id.
pub async fn insert_message(
    pool: &SqlitePool,
    author_name: &str,
    author_id: &str,
    body: &str,
    timestamp: &str,
) -> String {
    let id = uuid::Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO messages (id, author_name, author_id, body, attachment_kind, timestamp, edited, created_at)
         VALUES (?, ?, ?, ?, 'none', ?, 0, ?)",
    )
    .bind(&id)
    .bind(author_name)
    .bind(author_id)
    .bind(body)
    .bind(timestamp)
    .bind(timestamp)
    .execute(pool)
    .await
    .unwrap();
    id
}

pub async fn count_messages(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages")
        .fetch_one(pool)
        .await
        .unwrap()
}
