use crate::error::{Error, Result};
use crate::models::history::{HistoryEntry, NewHistoryEntry};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

#[derive(Clone)]
pub struct HistoryService {
    pool: PgPool,
}

impl HistoryService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn record(
        conn: &mut PgConnection,
        application_id: Uuid,
        entries: &[NewHistoryEntry],
    ) -> Result<u64> {
        let mut written = 0;
        for entry in entries {
            let res = sqlx::query(
                r#"
                INSERT INTO application_history (application_id, field_name, old_value, new_value, actor_id)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(application_id)
            .bind(entry.field_name)
            .bind(&entry.old_value)
            .bind(&entry.new_value)
            .bind(entry.actor_id)
            .execute(&mut *conn)
            .await?;
            written += res.rows_affected();
        }
        Ok(written)
    }

    /// Entries of one application, newest first.
    pub async fn list(&self, user_id: Uuid, application_id: Uuid) -> Result<Vec<HistoryEntry>> {
        let owned = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM applications WHERE id = $1 AND user_id = $2)",
        )
        .bind(application_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        if !owned {
            return Err(Error::NotFound("Application not found".to_string()));
        }

        let rows = sqlx::query_as::<_, HistoryEntry>(
            r#"
            SELECT id, application_id, field_name, old_value, new_value, actor_id, recorded_at
            FROM application_history
            WHERE application_id = $1
            ORDER BY recorded_at DESC, id DESC
            "#,
        )
        .bind(application_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
