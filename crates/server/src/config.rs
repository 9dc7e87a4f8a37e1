use std::env;
use std::path::PathBuf;
use std::time::Duration;

use pairchat_shared::constants::{HISTORY_LIMIT, MAX_PHOTO_BYTES};

#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub history_limit: i64,
    pub store_timeout: Duration,
    pub static_dir: PathBuf,
    /// `(name, secret)` pairs; empty means anyone may join.
    pub allowed_users: Vec<(String, String)>,
    pub retention_days: Option<i64>,
    pub max_photo_bytes: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5000),
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "./pairchat.db".into()),
            history_limit: env::var("HISTORY_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &i64| *v > 0)
                .unwrap_or(HISTORY_LIMIT),
            store_timeout: Duration::from_millis(
                env::var("STORE_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5_000),
            ),
            static_dir: env::var("STATIC_DIR")
                .unwrap_or_else(|_| "./client/build".into())
                .into(),
            allowed_users: env::var("ALLOWED_USERS")
                .map(|v| parse_allowed_users(&v))
                .unwrap_or_default(),
            retention_days: env::var("RETENTION_DAYS").ok().and_then(|v| v.parse().ok()),
            max_photo_bytes: env::var("MAX_PHOTO_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(MAX_PHOTO_BYTES),
        }
    }
}

/// Parses `name:secret,name:secret`. Entries without a colon are skipped.
pub fn parse_allowed_users(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|entry| {
            let (name, secret) = entry.split_once(':')?;
            let (name, secret) = (name.trim(), secret.trim());
            if name.is_empty() || secret.is_empty() {
                return None;
            }
            Some((name.to_string(), secret.to_string()))
        })
        .collect()
}
