use crate::dto::notification_dto::NotificationListQuery;
use crate::error::{Error, Result};
use crate::models::application::Application;
use crate::models::notification::Notification;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

pub const KIND_INTERVIEW: &str = "interview";
pub const KIND_FOLLOW_UP: &str = "followup";
pub const KIND_DEADLINE: &str = "deadline";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    pub kind: &'static str,
    pub title: String,
    pub message: String,
}

/// Notifications an application qualifies for right now: future interviews
/// and follow-ups, and deadlines that have not passed.
pub fn due_notifications(application: &Application, now: DateTime<Utc>) -> Vec<NotificationDraft> {
    let mut drafts = Vec::new();

    if let Some(at) = application.interview_date.filter(|at| *at > now) {
        drafts.push(NotificationDraft {
            kind: KIND_INTERVIEW,
            title: format!("Upcoming interview: {}", application.title),
            message: format!("Interview scheduled for {}", at.format("%Y-%m-%d %H:%M")),
        });
    }

    if let Some(at) = application.follow_up_date.filter(|at| *at > now) {
        drafts.push(NotificationDraft {
            kind: KIND_FOLLOW_UP,
            title: format!("Follow-up reminder: {}", application.title),
            message: format!("Follow-up scheduled for {}", at.format("%Y-%m-%d %H:%M")),
        });
    }

    if let Some(day) = application
        .application_deadline
        .filter(|day| *day >= now.date_naive())
    {
        drafts.push(NotificationDraft {
            kind: KIND_DEADLINE,
            title: format!("Application deadline: {}", application.title),
            message: format!("Application deadline: {}", day.format("%Y-%m-%d")),
        });
    }

    drafts
}

#[derive(Clone)]
pub struct NotificationService {
    pool: PgPool,
}

impl NotificationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the due notifications for an application, at most one per
    /// kind over the application's lifetime.
    pub async fn sync_for_application(
        conn: &mut PgConnection,
        application: &Application,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let mut created = 0;
        for draft in due_notifications(application, now) {
            let res = sqlx::query(
                r#"
                INSERT INTO notifications (user_id, application_id, kind, title, message)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (user_id, application_id, kind) DO NOTHING
                "#,
            )
            .bind(application.user_id)
            .bind(application.id)
            .bind(draft.kind)
            .bind(&draft.title)
            .bind(&draft.message)
            .execute(&mut *conn)
            .await?;
            created += res.rows_affected();
        }
        Ok(created)
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        query: NotificationListQuery,
    ) -> Result<(Vec<Notification>, i64)> {
        let limit = query.limit.unwrap_or(50).clamp(1, 200);
        let unread_only = query.unread_only.unwrap_or(false);

        let items = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, user_id, application_id, kind, title, message, is_read, created_at
            FROM notifications
            WHERE user_id = $1 AND ($2 = FALSE OR is_read = FALSE)
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let unread = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((items, unread))
    }

    pub async fn mark_read(&self, user_id: Uuid, id: i64) -> Result<Notification> {
        let row = sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications SET is_read = TRUE
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, application_id, kind, title, message, is_read, created_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<u64> {
        let res = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }

    pub async fn delete(&self, user_id: Uuid, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(Error::NotFound("Notification not found".to_string()));
        }
        Ok(())
    }

    pub async fn delete_all(&self, user_id: Uuid) -> Result<u64> {
        let res = sqlx::query("DELETE FROM notifications WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap()
    }

    fn application() -> Application {
        Application::draft(Uuid::nil(), "SRE", "Vandelay", now() - Duration::days(30))
    }

    #[test]
    fn only_future_dates_are_announced() {
        let mut app = application();
        app.interview_date = Some(now() + Duration::days(2));
        app.follow_up_date = Some(now() - Duration::hours(1));

        let drafts = due_notifications(&app, now());

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].kind, KIND_INTERVIEW);
        assert_eq!(drafts[0].title, "Upcoming interview: SRE");
        assert_eq!(drafts[0].message, "Interview scheduled for 2024-06-12 12:00");
    }

    #[test]
    fn a_deadline_today_still_counts() {
        let mut app = application();
        app.application_deadline = NaiveDate::from_ymd_opt(2024, 6, 10);

        let drafts = due_notifications(&app, now());

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].kind, KIND_DEADLINE);

        app.application_deadline = NaiveDate::from_ymd_opt(2024, 6, 9);
        assert!(due_notifications(&app, now()).is_empty());
    }
}
