mod broadcast;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, RwLock};

use crate::auth::Identity;
use crate::ws::events::ConnectionId;

/// One live socket. Identity is filled in by `join`.
pub struct Session {
    pub identity: Option<Identity>,
    pub tx: mpsc::UnboundedSender<String>,
}

/// In-memory map of live connections. Nothing here is persisted; a restart
/// starts empty. All mutation and fan-out go through the one `sessions`
/// lock, so a broadcast never observes a half-applied join or disconnect.
pub struct SessionRegistry {
    next_id: AtomicU64,
    pub sessions: RwLock<HashMap<ConnectionId, Session>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    fn next_connection_id(&self) -> ConnectionId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn connect(&self, tx: mpsc::UnboundedSender<String>) -> ConnectionId {
        let connection_id = self.next_connection_id();
        self.sessions.write().await.insert(
            connection_id,
            Session {
                identity: None,
                tx,
            },
        );
        connection_id
    }

    /// Attach an identity to a connection. A repeated join overwrites the
    /// earlier one and returns it. Returns `None` too if the connection is
    /// already gone.
    pub async fn join(&self, connection_id: ConnectionId, identity: Identity) -> Option<Identity> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&connection_id)?;
        session.identity.replace(identity)
    }

    pub async fn disconnect(&self, connection_id: ConnectionId) -> Option<Session> {
        self.sessions.write().await.remove(&connection_id)
    }

    pub async fn identity_of(&self, connection_id: ConnectionId) -> Option<Identity> {
        self.sessions
            .read()
            .await
            .get(&connection_id)
            .and_then(|s| s.identity.clone())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
