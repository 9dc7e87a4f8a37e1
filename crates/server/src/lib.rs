pub mod auth;
pub mod config;
pub mod db;
pub mod routes;
pub mod ws;

use auth::AllowList;
use config::Config;
use db::Store;
use std::sync::Arc;

pub struct AppState {
    pub store: Store,
    pub config: Config,
    pub allow_list: AllowList,
    pub registry: Arc<ws::registry::SessionRegistry>,
    pub ephemeral: ws::ephemeral::EphemeralState,
}

impl AppState {
    pub fn new(pool: sqlx::SqlitePool, config: Config) -> Self {
        Self {
            store: Store::new(pool, config.store_timeout, config.history_limit),
            allow_list: AllowList::new(config.allowed_users.clone()),
            config,
            registry: Arc::new(ws::registry::SessionRegistry::new()),
            ephemeral: ws::ephemeral::EphemeralState::new(),
        }
    }
}
