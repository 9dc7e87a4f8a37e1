use super::SessionRegistry;
use crate::ws::events::{ConnectionId, ServerEvent};

impl SessionRegistry {
    /// Best-effort fan-out to every joined session. Connections that never
    /// joined (or whose join was refused) get nothing. Closed sockets are
    /// skipped silently; their reader task removes them on its way out.
    pub async fn broadcast_all(&self, event: &ServerEvent, exclude: Option<ConnectionId>) {
        let msg = match serde_json::to_string(event) {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode broadcast event");
                return;
            }
        };

        let sessions = self.sessions.read().await;
        for (&cid, session) in sessions.iter() {
            if Some(cid) == exclude || session.identity.is_none() {
                continue;
            }
            let _ = session.tx.send(msg.clone());
        }
    }

    pub async fn send_to(&self, connection_id: ConnectionId, event: &ServerEvent) {
        let msg = match serde_json::to_string(event) {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode event");
                return;
            }
        };

        let sessions = self.sessions.read().await;
        if let Some(session) = sessions.get(&connection_id) {
            let _ = session.tx.send(msg);
        }
    }
}
