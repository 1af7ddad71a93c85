use crate::domain::EventLog;
use crate::error::{Error, Result};
use crate::models::status_event::{EventKind, NewStatusEvent, StatusEvent};
use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

const EVENT_COLUMNS: &str = "id, application_id, kind, occurred_at, note, created_at";

#[derive(Clone)]
pub struct StatusEventService {
    pool: PgPool,
}

impl StatusEventService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ensure_owned(&self, user_id: Uuid, application_id: Uuid) -> Result<()> {
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
        Ok(())
    }

    /// Events of one application, latest first.
    pub async fn list(&self, user_id: Uuid, application_id: Uuid) -> Result<Vec<StatusEvent>> {
        self.ensure_owned(user_id, application_id).await?;

        let sql = format!(
            "SELECT {} FROM status_events WHERE application_id = $1 ORDER BY occurred_at DESC, id DESC",
            EVENT_COLUMNS
        );
        let events = sqlx::query_as::<_, StatusEvent>(&sql)
            .bind(application_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(events)
    }

    pub async fn latest_event(
        &self,
        user_id: Uuid,
        application_id: Uuid,
        kinds: &[EventKind],
    ) -> Result<Option<StatusEvent>> {
        self.ensure_owned(user_id, application_id).await?;

        let kinds: Vec<&str> = kinds.iter().map(|kind| kind.as_str()).collect();
        let sql = format!(
            r#"
            SELECT {} FROM status_events
            WHERE application_id = $1 AND kind = ANY($2)
            ORDER BY occurred_at DESC, id DESC
            LIMIT 1
            "#,
            EVENT_COLUMNS
        );
        let event = sqlx::query_as::<_, StatusEvent>(&sql)
            .bind(application_id)
            .bind(&kinds)
            .fetch_optional(&self.pool)
            .await?;
        Ok(event)
    }

    /// Events of several applications at once, grouped in memory by the
    /// caller.
    pub async fn list_for_applications(&self, application_ids: &[Uuid]) -> Result<Vec<StatusEvent>> {
        let sql = format!(
            "SELECT {} FROM status_events WHERE application_id = ANY($1) ORDER BY application_id, occurred_at, id",
            EVENT_COLUMNS
        );
        let events = sqlx::query_as::<_, StatusEvent>(&sql)
            .bind(application_ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(events)
    }

    pub async fn load_log(conn: &mut PgConnection, application_id: Uuid) -> Result<EventLog> {
        let sql = format!(
            "SELECT {} FROM status_events WHERE application_id = $1 ORDER BY id",
            EVENT_COLUMNS
        );
        let events = sqlx::query_as::<_, StatusEvent>(&sql)
            .bind(application_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(EventLog::new(events))
    }

    pub async fn append_event(
        conn: &mut PgConnection,
        application_id: Uuid,
        event: &NewStatusEvent,
    ) -> Result<StatusEvent> {
        let sql = format!(
            r#"
            INSERT INTO status_events (application_id, kind, occurred_at, note)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            EVENT_COLUMNS
        );
        let row = sqlx::query_as::<_, StatusEvent>(&sql)
            .bind(application_id)
            .bind(event.kind)
            .bind(event.occurred_at)
            .bind(&event.note)
            .fetch_one(&mut *conn)
            .await?;
        Ok(row)
    }

    /// Deletes the given events of one application, typically the ids an
    /// [`EventLog::delete_not_in`] call dropped.
    pub async fn delete_events(
        conn: &mut PgConnection,
        application_id: Uuid,
        event_ids: &[i64],
    ) -> Result<u64> {
        if event_ids.is_empty() {
            return Ok(0);
        }
        let res = sqlx::query("DELETE FROM status_events WHERE application_id = $1 AND id = ANY($2)")
            .bind(application_id)
            .bind(event_ids)
            .execute(&mut *conn)
            .await?;

        info!(
            application_id = %application_id,
            removed = res.rows_affected(),
            "status events removed"
        );
        Ok(res.rows_affected())
    }

    pub async fn delete_event(
        conn: &mut PgConnection,
        application_id: Uuid,
        event_id: i64,
    ) -> Result<()> {
        let res = sqlx::query("DELETE FROM status_events WHERE id = $1 AND application_id = $2")
            .bind(event_id)
            .bind(application_id)
            .execute(&mut *conn)
            .await?;

        if res.rows_affected() == 0 {
            return Err(Error::NotFound("Status event not found".to_string()));
        }
        Ok(())
    }
}
