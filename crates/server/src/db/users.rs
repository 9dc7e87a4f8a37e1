use chrono::Utc;
use pairchat_shared::validation::normalize_user_key;

use super::{format_timestamp, Store, StoreError};

impl Store {
    pub async fn get_user_photo(&self, username: &str) -> Result<Option<String>, StoreError> {
        let key = normalize_user_key(username);
        self.run(
            "get_user_photo",
            sqlx::query_scalar::<_, String>(r#"SELECT photo FROM "users" WHERE user_key = ?"#)
                .bind(&key)
                .fetch_optional(&self.pool),
        )
        .await
    }

    pub async fn set_user_photo(&self, username: &str, photo: &str) -> Result<(), StoreError> {
        let key = normalize_user_key(username);
        let now = format_timestamp(&Utc::now());
        self.run(
            "set_user_photo",
            sqlx::query(
                r#"INSERT INTO "users" (user_key, photo, updated_at) VALUES (?, ?, ?)
                   ON CONFLICT(user_key) DO UPDATE SET photo = excluded.photo, updated_at = excluded.updated_at"#,
            )
            .bind(&key)
            .bind(photo)
            .bind(&now)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }
}
