use chrono::{DateTime, SubsecRound, Utc};
use pairchat_shared::models::{Attachment, AttachmentKind, Message, ReplyRef};

use super::{format_timestamp, parse_timestamp, Store, StoreError};

/// A message as handed to the store, before an id is assigned.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub author_name: String,
    pub author_id: String,
    pub body: Option<String>,
    pub attachment: Option<Attachment>,
    pub timestamp: DateTime<Utc>,
    pub reply_ref: Option<ReplyRef>,
    pub client_message_id: Option<String>,
}

impl NewMessage {
    pub fn with_id(self, id: String) -> Message {
        Message {
            id,
            author_name: self.author_name,
            author_id: self.author_id,
            body: self.body,
            attachment: self.attachment,
            timestamp: self.timestamp,
            reply_ref: self.reply_ref,
            edited: false,
            client_message_id: self.client_message_id,
            reactions: Default::default(),
            read_by: Default::default(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: String,
    author_name: String,
    author_id: String,
    body: Option<String>,
    attachment_kind: String,
    attachment_data: Option<String>,
    reply_ref: Option<String>,
    timestamp: String,
    client_message_id: Option<String>,
    edited: i64,
}

impl TryFrom<MessageRow> for Message {
    type Error = StoreError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let kind = AttachmentKind::from_db(&row.attachment_kind);
        let attachment = match (kind, row.attachment_data) {
            (AttachmentKind::None, _) | (_, None) => None,
            (kind, Some(data)) => Some(Attachment { kind, data }),
        };
        // A broken reply snapshot should not hide the message itself.
        let reply_ref = row.reply_ref.and_then(|raw| match serde_json::from_str(&raw) {
            Ok(r) => Some(r),
            Err(e) => {
                tracing::warn!(id = %row.id, error = %e, "dropping unreadable reply snapshot");
                None
            }
        });

        Ok(Message {
            timestamp: parse_timestamp(&row.timestamp)?,
            id: row.id,
            author_name: row.author_name,
            author_id: row.author_id,
            body: row.body,
            attachment,
            reply_ref,
            edited: row.edited != 0,
            client_message_id: row.client_message_id,
            reactions: Default::default(),
            read_by: Default::default(),
        })
    }
}

const MESSAGE_COLUMNS: &str = "id, author_name, author_id, body, attachment_kind, attachment_data, \
     reply_ref, timestamp, client_message_id, edited";

fn rows_to_messages(rows: Vec<MessageRow>) -> Result<Vec<Message>, StoreError> {
    rows.into_iter().map(Message::try_from).collect()
}

/// Ids are UUIDs minted by `insert_message`; anything else cannot exist.
fn check_id(id: &str) -> Result<(), StoreError> {
    uuid::Uuid::parse_str(id)
        .map(|_| ())
        .map_err(|_| StoreError::InvalidId(id.to_string()))
}

impl Store {
    pub async fn insert_message(&self, mut msg: NewMessage) -> Result<Message, StoreError> {
        // Stored precision is milliseconds; hand back exactly what was written.
        msg.timestamp = msg.timestamp.trunc_subsecs(3);
        let id = uuid::Uuid::new_v4().to_string();
        let now = format_timestamp(&Utc::now());
        let (kind, data) = match &msg.attachment {
            Some(a) if a.is_present() => (a.kind, Some(a.data.as_str())),
            _ => (AttachmentKind::None, None),
        };
        let reply_ref = msg
            .reply_ref
            .as_ref()
            .and_then(|r| serde_json::to_string(r).ok());

        self.run(
            "insert_message",
            sqlx::query(
                r#"INSERT INTO messages (id, author_name, author_id, body, attachment_kind, attachment_data,
                       reply_ref, timestamp, client_message_id, edited, created_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)"#,
            )
            .bind(&id)
            .bind(&msg.author_name)
            .bind(&msg.author_id)
            .bind(&msg.body)
            .bind(kind.as_str())
            .bind(data)
            .bind(&reply_ref)
            .bind(format_timestamp(&msg.timestamp))
            .bind(&msg.client_message_id)
            .bind(&now)
            .execute(&self.pool),
        )
        .await?;

        Ok(msg.with_id(id))
    }

    /// Most recent messages, oldest first. `limit` is clamped to the
    /// configured history limit.
    pub async fn list_messages(&self, limit: Option<i64>) -> Result<Vec<Message>, StoreError> {
        let limit = limit
            .unwrap_or(self.history_limit)
            .clamp(1, self.history_limit);
        let sql = format!(
            "SELECT * FROM (SELECT rowid AS seq, {MESSAGE_COLUMNS} FROM messages \
             ORDER BY timestamp DESC, seq DESC LIMIT ?) ORDER BY timestamp ASC, seq ASC"
        );
        let rows = self
            .run(
                "list_messages",
                sqlx::query_as::<_, MessageRow>(&sql)
                    .bind(limit)
                    .fetch_all(&self.pool),
            )
            .await?;
        rows_to_messages(rows)
    }

    pub async fn list_messages_by_author(
        &self,
        author_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<Message>, StoreError> {
        let limit = limit
            .unwrap_or(self.history_limit)
            .clamp(1, self.history_limit);
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE lower(author_id) = lower(?) \
             ORDER BY timestamp ASC, rowid ASC LIMIT ?"
        );
        let rows = self
            .run(
                "list_messages_by_author",
                sqlx::query_as::<_, MessageRow>(&sql)
                    .bind(author_id.trim())
                    .bind(limit)
                    .fetch_all(&self.pool),
            )
            .await?;
        rows_to_messages(rows)
    }

    pub async fn get_message(&self, id: &str) -> Result<Message, StoreError> {
        check_id(id)?;
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?");
        let row = self
            .run(
                "get_message",
                sqlx::query_as::<_, MessageRow>(&sql)
                    .bind(id)
                    .fetch_one(&self.pool),
            )
            .await?;
        Message::try_from(row)
    }

    pub async fn delete_message(&self, id: &str) -> Result<(), StoreError> {
        check_id(id)?;
        let result = self
            .run(
                "delete_message",
                sqlx::query("DELETE FROM messages WHERE id = ?")
                    .bind(id)
                    .execute(&self.pool),
            )
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Replace the body and flag the message as edited.
    pub async fn update_message_body(&self, id: &str, body: &str) -> Result<(), StoreError> {
        check_id(id)?;
        let result = self
            .run(
                "update_message_body",
                sqlx::query("UPDATE messages SET body = ?, edited = 1 WHERE id = ?")
                    .bind(body)
                    .bind(id)
                    .execute(&self.pool),
            )
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Retention sweep: drop messages whose timestamp is older than `days`.
    pub async fn delete_messages_older_than(&self, days: i64) -> Result<u64, StoreError> {
        let cutoff = format_timestamp(&(Utc::now() - chrono::Duration::days(days)));
        let result = self
            .run(
                "delete_messages_older_than",
                sqlx::query("DELETE FROM messages WHERE timestamp < ?")
                    .bind(&cutoff)
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;
    use std::time::Duration;

    async fn store() -> Store {
        let pool = init_memory_pool().await.unwrap();
        Store::new(pool, Duration::from_secs(5), 100)
    }

    fn new_message(author_id: &str, body: &str, ts: DateTime<Utc>) -> NewMessage {
        NewMessage {
            author_name: "alice".into(),
            author_id: author_id.into(),
            body: Some(body.into()),
            attachment: None,
            timestamp: ts,
            reply_ref: None,
            client_message_id: None,
        }
    }

    #[tokio::test]
    async fn list_orders_by_timestamp_not_insert_order() {
        let store = store().await;
        let now = Utc::now();
        store
            .insert_message(new_message("a1", "second", now))
            .await
            .unwrap();
        store
            .insert_message(new_message("a1", "first", now - chrono::Duration::seconds(10)))
            .await
            .unwrap();

        let list = store.list_messages(None).await.unwrap();
        let bodies: Vec<_> = list.iter().map(|m| m.body.as_deref().unwrap()).collect();
        assert_eq!(bodies, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn list_keeps_most_recent_when_limited() {
        let store = store().await;
        let base = Utc::now();
        for i in 0..5 {
            store
                .insert_message(new_message("a1", &format!("m{i}"), base + chrono::Duration::seconds(i)))
                .await
                .unwrap();
        }
        let list = store.list_messages(Some(2)).await.unwrap();
        let bodies: Vec<_> = list.iter().map(|m| m.body.clone().unwrap()).collect();
        assert_eq!(bodies, vec!["m3", "m4"]);
    }

    #[tokio::test]
    async fn round_trips_attachment_and_reply() {
        let store = store().await;
        let mut msg = new_message("a1", "look", Utc::now());
        msg.attachment = Some(Attachment {
            kind: AttachmentKind::Audio,
            data: "data:audio/webm;base64,AAAA".into(),
        });
        msg.reply_ref = Some(ReplyRef {
            id: "x".into(),
            author_name: "bob".into(),
            body: "earlier".into(),
        });
        msg.client_message_id = Some("c-1".into());
        let saved = store.insert_message(msg).await.unwrap();

        let fetched = store.get_message(&saved.id).await.unwrap();
        assert_eq!(fetched, saved);
    }

    #[tokio::test]
    async fn delete_twice_yields_not_found() {
        let store = store().await;
        let saved = store
            .insert_message(new_message("a1", "bye", Utc::now()))
            .await
            .unwrap();
        store.delete_message(&saved.id).await.unwrap();
        assert!(matches!(
            store.delete_message(&saved.id).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn delete_rejects_malformed_id() {
        let store = store().await;
        assert!(matches!(
            store.delete_message("not-a-uuid").await,
            Err(StoreError::InvalidId(_))
        ));
    }

    #[tokio::test]
    async fn update_body_sets_edited() {
        let store = store().await;
        let saved = store
            .insert_message(new_message("a1", "draft", Utc::now()))
            .await
            .unwrap();
        store.update_message_body(&saved.id, "final").await.unwrap();
        let fetched = store.get_message(&saved.id).await.unwrap();
        assert_eq!(fetched.body.as_deref(), Some("final"));
        assert!(fetched.edited);
    }

    #[tokio::test]
    async fn by_author_matches_case_insensitively() {
        let store = store().await;
        store.insert_message(new_message("A1", "x", Utc::now())).await.unwrap();
        store.insert_message(new_message("b1", "y", Utc::now())).await.unwrap();
        let mine = store.list_messages_by_author("a1", None).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].body.as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn retention_sweep_drops_old_rows() {
        let store = store().await;
        store
            .insert_message(new_message("a1", "ancient", Utc::now() - chrono::Duration::days(40)))
            .await
            .unwrap();
        store.insert_message(new_message("a1", "fresh", Utc::now())).await.unwrap();
        assert_eq!(store.delete_messages_older_than(30).await.unwrap(), 1);
        assert_eq!(store.list_messages(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn closed_pool_reports_unavailable() {
        let store = store().await;
        store.pool().close().await;
        assert!(matches!(
            store.insert_message(new_message("a1", "lost", Utc::now())).await,
            Err(StoreError::StorageUnavailable(_))
        ));
    }
}
