use crate::domain::{self, event_log, RejectedEvent, SaveRequest};
use crate::dto::application_dto::{
    check_salary_range, ApplicationListQuery, CreateApplicationPayload, UpdateApplicationPayload,
};
use crate::error::{Error, Result};
use crate::models::application::{Application, ApplicationStatus, Priority};
use crate::models::status_event::{NewStatusEvent, StatusEvent};
use crate::services::history_service::HistoryService;
use crate::services::notification_service::NotificationService;
use crate::services::status_event_service::StatusEventService;
use crate::utils::time;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Connection, FromRow, PgConnection, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

const APPLICATION_COLUMNS: &str = "id, user_id, title, employer, job_url, description, address, contact_email, contact_phone, company_website, category_id, priority, work_type, source, salary_min, salary_max, salary_currency, status, submitted, submitted_at, confirmed, confirmed_at, responded, responded_at, rejected, rejected_at, interview_date, follow_up_date, application_deadline, notes, created_at, updated_at";

const TOP_EMPLOYERS: i64 = 10;
const MONTHLY_WINDOWS: i64 = 12;
const WINDOW_DAYS: i64 = 30;

#[derive(Clone)]
pub struct ApplicationService {
    pool: PgPool,
}

pub struct ApplicationList {
    pub items: Vec<Application>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

#[derive(Debug)]
pub struct ApplicationDetail {
    pub application: Application,
    pub tag_ids: Vec<i64>,
    pub events: Vec<StatusEvent>,
    pub rejected: Vec<RejectedEvent>,
}

/// Applications counted over the trailing 7, 30 and 365 days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodCounts {
    pub week: i64,
    pub month: i64,
    pub year: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyCount {
    pub month: String,
    pub count: i64,
}

pub struct ApplicationStats {
    pub total: i64,
    pub by_status: Vec<(ApplicationStatus, i64)>,
    pub submitted: i64,
    pub confirmed: i64,
    pub responded: i64,
    pub rejected: i64,
    pub created: PeriodCounts,
    pub submissions: PeriodCounts,
    pub responses: PeriodCounts,
    pub rejections: PeriodCounts,
    pub by_category: Vec<(Option<String>, i64)>,
    pub by_priority: Vec<(Priority, i64)>,
    pub by_work_type: Vec<(Option<String>, i64)>,
    pub by_source: Vec<(Option<String>, i64)>,
    pub top_employers: Vec<(String, i64)>,
    pub monthly: Vec<MonthlyCount>,
    pub avg_salary_min: Option<Decimal>,
    pub avg_salary_max: Option<Decimal>,
    pub upcoming_interviews: i64,
    pub upcoming_follow_ups: i64,
    pub upcoming_deadlines: i64,
}

impl ApplicationStats {
    pub fn count_for(&self, status: ApplicationStatus) -> i64 {
        self.by_status
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    pub fn response_rate(&self) -> f64 {
        percent(self.responded, self.submitted)
    }

    pub fn success_rate(&self) -> f64 {
        percent(self.count_for(ApplicationStatus::Accepted), self.submitted)
    }

    pub fn rejection_rate(&self) -> f64 {
        percent(self.rejected, self.submitted)
    }
}

/// `part / whole` in percent, one decimal place. Zero when `whole` is zero.
pub fn percent(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 1000.0).round() / 10.0
}

/// Buckets creation times into twelve consecutive 30-day windows ending at
/// `now`, oldest first. Each window is labeled with the month it ends in.
pub fn monthly_counts(now: DateTime<Utc>, created: &[DateTime<Utc>]) -> Vec<MonthlyCount> {
    (0..MONTHLY_WINDOWS)
        .rev()
        .map(|i| {
            let end = now - Duration::days(WINDOW_DAYS * i);
            let start = end - Duration::days(WINDOW_DAYS);
            MonthlyCount {
                month: end.format("%Y-%m").to_string(),
                count: created.iter().filter(|at| **at >= start && **at < end).count() as i64,
            }
        })
        .collect()
}

#[derive(FromRow)]
struct TotalsRow {
    total: i64,
    submitted: i64,
    confirmed: i64,
    responded: i64,
    rejected: i64,
    created_week: i64,
    created_month: i64,
    created_year: i64,
    submitted_week: i64,
    submitted_month: i64,
    submitted_year: i64,
    responded_week: i64,
    responded_month: i64,
    responded_year: i64,
    rejected_week: i64,
    rejected_month: i64,
    rejected_year: i64,
    upcoming_interviews: i64,
    upcoming_follow_ups: i64,
    upcoming_deadlines: i64,
    avg_salary_min: Option<Decimal>,
    avg_salary_max: Option<Decimal>,
}

/// Everything a save of an existing application may carry next to the
/// field edits.
#[derive(Default)]
struct SaveInput {
    new_events: Vec<NewStatusEvent>,
    keep_event_ids: Option<Vec<i64>>,
    remove_event_id: Option<i64>,
    tag_ids: Option<Vec<i64>>,
    /// Fail the whole save when a proposed event is rejected.
    strict_events: bool,
}

enum FilterArg {
    Text(String),
    Int(i64),
    Bool(bool),
}

impl ApplicationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Application> {
        let sql = format!(
            "SELECT {} FROM applications WHERE id = $1 AND user_id = $2",
            APPLICATION_COLUMNS
        );
        let application = sqlx::query_as::<_, Application>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Application not found".to_string()))?;
        Ok(application)
    }

    pub async fn detail(&self, user_id: Uuid, id: Uuid) -> Result<ApplicationDetail> {
        let application = self.get(user_id, id).await?;
        let mut conn = self.pool.acquire().await?;
        let tag_ids = load_tag_ids(&mut conn, id).await?;
        let events = load_events_latest_first(&mut conn, id).await?;

        Ok(ApplicationDetail {
            application,
            tag_ids,
            events,
            rejected: Vec::new(),
        })
    }

    pub async fn list(&self, user_id: Uuid, query: ApplicationListQuery) -> Result<ApplicationList> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;

        let mut filters = vec!["user_id = $1".to_string()];
        let mut args: Vec<FilterArg> = Vec::new();

        if let Some(status) = query.status {
            filters.push(format!("status = ${}", args.len() + 2));
            args.push(FilterArg::Text(status.as_str().to_string()));
        }
        if let Some(priority) = query.priority {
            filters.push(format!("priority = ${}", args.len() + 2));
            args.push(FilterArg::Text(priority.as_str().to_string()));
        }
        if let Some(category_id) = query.category_id {
            filters.push(format!("category_id = ${}", args.len() + 2));
            args.push(FilterArg::Int(category_id));
        }
        if let Some(work_type) = query.work_type.filter(|s| !s.is_empty()) {
            filters.push(format!("work_type = ${}", args.len() + 2));
            args.push(FilterArg::Text(work_type));
        }
        if let Some(source) = query.source.filter(|s| !s.is_empty()) {
            filters.push(format!("source = ${}", args.len() + 2));
            args.push(FilterArg::Text(source));
        }
        if let Some(tag_id) = query.tag_id {
            filters.push(format!(
                "EXISTS (SELECT 1 FROM application_tags t WHERE t.application_id = applications.id AND t.tag_id = ${})",
                args.len() + 2
            ));
            args.push(FilterArg::Int(tag_id));
        }
        for (column, wanted) in [
            ("submitted", query.submitted),
            ("responded", query.responded),
            ("rejected", query.rejected),
        ] {
            if let Some(wanted) = wanted {
                filters.push(format!("{} = ${}", column, args.len() + 2));
                args.push(FilterArg::Bool(wanted));
            }
        }
        if let Some(search) = query.search.filter(|s| !s.trim().is_empty()) {
            let n = args.len() + 2;
            filters.push(format!(
                "(title ILIKE ${0} OR employer ILIKE ${0} OR description ILIKE ${0} \
                 OR address ILIKE ${0} OR notes ILIKE ${0} OR contact_email ILIKE ${0} \
                 OR contact_phone ILIKE ${0})",
                n
            ));
            args.push(FilterArg::Text(format!("%{}%", search.trim())));
        }

        let where_clause = format!("WHERE {}", filters.join(" AND "));

        let items_query = format!(
            "SELECT {} FROM applications {} ORDER BY {} LIMIT ${} OFFSET ${}",
            APPLICATION_COLUMNS,
            where_clause,
            query.sort.unwrap_or_default().order_by(),
            args.len() + 2,
            args.len() + 3
        );
        let total_query = format!("SELECT COUNT(*) FROM applications {}", where_clause);

        let mut items_statement = sqlx::query_as::<_, Application>(&items_query).bind(user_id);
        for value in &args {
            items_statement = match value {
                FilterArg::Text(text) => items_statement.bind(text),
                FilterArg::Int(int) => items_statement.bind(int),
                FilterArg::Bool(flag) => items_statement.bind(flag),
            };
        }
        items_statement = items_statement.bind(per_page).bind(offset);
        let items = items_statement.fetch_all(&self.pool).await?;

        let mut total_statement = sqlx::query_scalar::<_, i64>(&total_query).bind(user_id);
        for value in &args {
            total_statement = match value {
                FilterArg::Text(text) => total_statement.bind(text),
                FilterArg::Int(int) => total_statement.bind(int),
                FilterArg::Bool(flag) => total_statement.bind(flag),
            };
        }
        let total = total_statement.fetch_one(&self.pool).await?;

        let total_pages = ((total as f64) / (per_page as f64)).ceil() as i64;

        Ok(ApplicationList {
            items,
            total,
            page,
            per_page,
            total_pages,
        })
    }

    pub async fn list_all(&self, user_id: Uuid) -> Result<Vec<Application>> {
        let sql = format!(
            "SELECT {} FROM applications WHERE user_id = $1 ORDER BY created_at DESC",
            APPLICATION_COLUMNS
        );
        let items = sqlx::query_as::<_, Application>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    pub async fn stats(&self, user_id: Uuid) -> Result<ApplicationStats> {
        let now = time::now();
        let week_ago = now - Duration::days(7);
        let month_ago = now - Duration::days(30);
        let year_ago = now - Duration::days(365);

        let totals = sqlx::query_as::<_, TotalsRow>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE submitted) AS submitted,
                COUNT(*) FILTER (WHERE confirmed) AS confirmed,
                COUNT(*) FILTER (WHERE responded) AS responded,
                COUNT(*) FILTER (WHERE rejected) AS rejected,
                COUNT(*) FILTER (WHERE created_at >= $2) AS created_week,
                COUNT(*) FILTER (WHERE created_at >= $3) AS created_month,
                COUNT(*) FILTER (WHERE created_at >= $4) AS created_year,
                COUNT(*) FILTER (WHERE submitted AND submitted_at >= $2) AS submitted_week,
                COUNT(*) FILTER (WHERE submitted AND submitted_at >= $3) AS submitted_month,
                COUNT(*) FILTER (WHERE submitted AND submitted_at >= $4) AS submitted_year,
                COUNT(*) FILTER (WHERE responded AND responded_at >= $2) AS responded_week,
                COUNT(*) FILTER (WHERE responded AND responded_at >= $3) AS responded_month,
                COUNT(*) FILTER (WHERE responded AND responded_at >= $4) AS responded_year,
                COUNT(*) FILTER (WHERE rejected AND rejected_at >= $2) AS rejected_week,
                COUNT(*) FILTER (WHERE rejected AND rejected_at >= $3) AS rejected_month,
                COUNT(*) FILTER (WHERE rejected AND rejected_at >= $4) AS rejected_year,
                COUNT(*) FILTER (WHERE interview_date >= $5) AS upcoming_interviews,
                COUNT(*) FILTER (WHERE follow_up_date >= $5) AS upcoming_follow_ups,
                COUNT(*) FILTER (WHERE application_deadline >= $6) AS upcoming_deadlines,
                AVG(salary_min) FILTER (WHERE salary_min IS NOT NULL) AS avg_salary_min,
                AVG(salary_max) FILTER (WHERE salary_min IS NOT NULL) AS avg_salary_max
            FROM applications
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(week_ago)
        .bind(month_ago)
        .bind(year_ago)
        .bind(now)
        .bind(now.date_naive())
        .fetch_one(&self.pool)
        .await?;

        let by_status = sqlx::query_as::<_, (ApplicationStatus, i64)>(
            "SELECT status, COUNT(*) FROM applications WHERE user_id = $1 GROUP BY status",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let by_category = sqlx::query_as::<_, (Option<String>, i64)>(
            r#"
            SELECT c.name, COUNT(a.id)
            FROM applications a
            LEFT JOIN categories c ON c.id = a.category_id
            WHERE a.user_id = $1
            GROUP BY c.name
            ORDER BY COUNT(a.id) DESC, c.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut by_priority = sqlx::query_as::<_, (Priority, i64)>(
            "SELECT priority, COUNT(*) FROM applications WHERE user_id = $1 GROUP BY priority",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        by_priority.sort_by_key(|(priority, _)| *priority as u8);

        let by_work_type = sqlx::query_as::<_, (Option<String>, i64)>(
            "SELECT work_type, COUNT(*) FROM applications WHERE user_id = $1 GROUP BY work_type ORDER BY COUNT(*) DESC, work_type",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let by_source = sqlx::query_as::<_, (Option<String>, i64)>(
            "SELECT source, COUNT(*) FROM applications WHERE user_id = $1 GROUP BY source ORDER BY COUNT(*) DESC, source",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let top_employers = sqlx::query_as::<_, (String, i64)>(
            "SELECT employer, COUNT(*) FROM applications WHERE user_id = $1 GROUP BY employer ORDER BY COUNT(*) DESC, employer LIMIT $2",
        )
        .bind(user_id)
        .bind(TOP_EMPLOYERS)
        .fetch_all(&self.pool)
        .await?;

        let created = sqlx::query_scalar::<_, DateTime<Utc>>(
            "SELECT created_at FROM applications WHERE user_id = $1 AND created_at >= $2",
        )
        .bind(user_id)
        .bind(now - Duration::days(WINDOW_DAYS * MONTHLY_WINDOWS))
        .fetch_all(&self.pool)
        .await?;

        Ok(ApplicationStats {
            total: totals.total,
            by_status,
            submitted: totals.submitted,
            confirmed: totals.confirmed,
            responded: totals.responded,
            rejected: totals.rejected,
            created: PeriodCounts {
                week: totals.created_week,
                month: totals.created_month,
                year: totals.created_year,
            },
            submissions: PeriodCounts {
                week: totals.submitted_week,
                month: totals.submitted_month,
                year: totals.submitted_year,
            },
            responses: PeriodCounts {
                week: totals.responded_week,
                month: totals.responded_month,
                year: totals.responded_year,
            },
            rejections: PeriodCounts {
                week: totals.rejected_week,
                month: totals.rejected_month,
                year: totals.rejected_year,
            },
            by_category,
            by_priority,
            by_work_type,
            by_source,
            top_employers,
            monthly: monthly_counts(now, &created),
            avg_salary_min: totals.avg_salary_min,
            avg_salary_max: totals.avg_salary_max,
            upcoming_interviews: totals.upcoming_interviews,
            upcoming_follow_ups: totals.upcoming_follow_ups,
            upcoming_deadlines: totals.upcoming_deadlines,
        })
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        payload: CreateApplicationPayload,
    ) -> Result<ApplicationDetail> {
        payload.check_salary()?;
        let now = time::now();

        let baseline = Application::draft(
            user_id,
            payload.title.trim(),
            payload.employer.trim(),
            now,
        );
        let mut application = baseline.clone();
        payload.apply(&mut application);

        let request = SaveRequest::between(&baseline, &application, payload.events.clone());
        let reconciliation =
            domain::reconcile_on_save(&application, &domain::EventLog::default(), &request, now);
        reconciliation.apply_to(&mut application);
        domain::clamp_dates(&mut application);

        let mut tx = self.pool.begin().await?;

        if let Some(category_id) = application.category_id {
            ensure_category(&mut tx, category_id).await?;
        }

        let sql = format!(
            r#"
            INSERT INTO applications ({cols})
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,
                    $17,$18,$19,$20,$21,$22,$23,$24,$25,$26,$27,$28,$29,$30,$31,$32)
            RETURNING {cols}
            "#,
            cols = APPLICATION_COLUMNS
        );
        let application = sqlx::query_as::<_, Application>(&sql)
            .bind(application.id)
            .bind(application.user_id)
            .bind(&application.title)
            .bind(&application.employer)
            .bind(&application.job_url)
            .bind(&application.description)
            .bind(&application.address)
            .bind(&application.contact_email)
            .bind(&application.contact_phone)
            .bind(&application.company_website)
            .bind(application.category_id)
            .bind(application.priority)
            .bind(&application.work_type)
            .bind(&application.source)
            .bind(application.salary_min)
            .bind(application.salary_max)
            .bind(&application.salary_currency)
            .bind(application.status)
            .bind(application.submitted)
            .bind(application.submitted_at)
            .bind(application.confirmed)
            .bind(application.confirmed_at)
            .bind(application.responded)
            .bind(application.responded_at)
            .bind(application.rejected)
            .bind(application.rejected_at)
            .bind(application.interview_date)
            .bind(application.follow_up_date)
            .bind(application.application_deadline)
            .bind(&application.notes)
            .bind(application.created_at)
            .bind(application.updated_at)
            .fetch_one(&mut *tx)
            .await?;

        for event in reconciliation.events_to_insert() {
            StatusEventService::append_event(&mut tx, application.id, event).await?;
        }
        if !payload.tag_ids.is_empty() {
            replace_tags(&mut tx, application.id, &payload.tag_ids).await?;
        }
        NotificationService::sync_for_application(&mut tx, &application, now).await?;

        let tag_ids = load_tag_ids(&mut tx, application.id).await?;
        let events = load_events_latest_first(&mut tx, application.id).await?;
        tx.commit().await?;

        info!(
            application_id = %application.id,
            status = %application.status,
            signal = reconciliation.signal.name(),
            "application created"
        );

        Ok(ApplicationDetail {
            application,
            tag_ids,
            events,
            rejected: reconciliation.rejected,
        })
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        payload: UpdateApplicationPayload,
    ) -> Result<ApplicationDetail> {
        payload.check_salary()?;
        let input = SaveInput {
            new_events: payload.new_events.clone(),
            keep_event_ids: payload.keep_ids().map(<[i64]>::to_vec),
            tag_ids: payload.tag_ids.clone(),
            ..SaveInput::default()
        };
        self.save_existing(user_id, id, input, |application| {
            payload.apply(application);
            check_salary_range(application.salary_min, application.salary_max)
        })
        .await
    }

    /// Appends one user-entered event. Unlike a full save, a date before the
    /// application's creation fails the request.
    pub async fn add_event(
        &self,
        user_id: Uuid,
        id: Uuid,
        event: NewStatusEvent,
    ) -> Result<ApplicationDetail> {
        let input = SaveInput {
            new_events: vec![event],
            strict_events: true,
            ..SaveInput::default()
        };
        self.save_existing(user_id, id, input, |_| Ok(())).await
    }

    pub async fn remove_event(
        &self,
        user_id: Uuid,
        id: Uuid,
        event_id: i64,
    ) -> Result<ApplicationDetail> {
        let input = SaveInput {
            remove_event_id: Some(event_id),
            ..SaveInput::default()
        };
        self.save_existing(user_id, id, input, |_| Ok(())).await
    }

    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<()> {
        let res = sqlx::query("DELETE FROM applications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(Error::NotFound("Application not found".to_string()));
        }
        info!(application_id = %id, "application deleted");
        Ok(())
    }

    async fn save_existing<F>(
        &self,
        user_id: Uuid,
        id: Uuid,
        input: SaveInput,
        edit: F,
    ) -> Result<ApplicationDetail>
    where
        F: FnOnce(&mut Application) -> Result<()>,
    {
        let now = time::now();
        let mut tx = self.pool.begin().await?;

        let previous = lock_application(&mut tx, user_id, id).await?;

        if let Some(event_id) = input.remove_event_id {
            StatusEventService::delete_event(&mut tx, id, event_id).await?;
        }
        let mut log = StatusEventService::load_log(&mut tx, id).await?;
        if let Some(keep) = &input.keep_event_ids {
            let removed = log.delete_not_in(keep);
            StatusEventService::delete_events(&mut tx, id, &removed).await?;
        }

        let mut application = previous.clone();
        edit(&mut application)?;
        domain::date_guard::validate_application_dates(&application)?;
        if let Some(category_id) = application
            .category_id
            .filter(|c| Some(*c) != previous.category_id)
        {
            ensure_category(&mut tx, category_id).await?;
        }

        let new_events = if input.strict_events {
            input
                .new_events
                .into_iter()
                .map(|e| event_log::append(&previous, e.kind, e.occurred_at, e.note))
                .collect::<std::result::Result<Vec<_>, _>>()?
        } else {
            input.new_events
        };

        let request = SaveRequest::between(&previous, &application, new_events);
        let reconciliation = domain::reconcile_on_save(&application, &log, &request, now);
        reconciliation.apply_to(&mut application);
        let clamped = domain::clamp_dates(&mut application);
        if !clamped.is_empty() {
            warn!(application_id = %id, fields = ?clamped, "dates raised to creation time");
        }
        application.updated_at = now;

        record_history_best_effort(&mut tx, &application, user_id).await;

        for event in reconciliation.events_to_insert() {
            StatusEventService::append_event(&mut tx, id, event).await?;
        }
        if let Some(tag_ids) = &input.tag_ids {
            replace_tags(&mut tx, id, tag_ids).await?;
        }

        let application = write_application(&mut tx, &application).await?;
        NotificationService::sync_for_application(&mut tx, &application, now).await?;

        let tag_ids = load_tag_ids(&mut tx, id).await?;
        let events = load_events_latest_first(&mut tx, id).await?;
        tx.commit().await?;

        info!(
            application_id = %id,
            status = %application.status,
            signal = reconciliation.signal.name(),
            synthesized = reconciliation.synthesized.len(),
            rejected = reconciliation.rejected.len(),
            "application saved"
        );

        Ok(ApplicationDetail {
            application,
            tag_ids,
            events,
            rejected: reconciliation.rejected,
        })
    }
}

async fn lock_application(conn: &mut PgConnection, user_id: Uuid, id: Uuid) -> Result<Application> {
    let sql = format!(
        "SELECT {} FROM applications WHERE id = $1 AND user_id = $2 FOR UPDATE",
        APPLICATION_COLUMNS
    );
    sqlx::query_as::<_, Application>(&sql)
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::NotFound("Application not found".to_string()))
}

/// Diffs against the row as stored right now and writes the entries inside
/// a savepoint. Failures are logged and never abort the save.
async fn record_history_best_effort(conn: &mut PgConnection, application: &Application, actor: Uuid) {
    let sql = format!("SELECT {} FROM applications WHERE id = $1", APPLICATION_COLUMNS);
    let stored = match sqlx::query_as::<_, Application>(&sql)
        .bind(application.id)
        .fetch_optional(&mut *conn)
        .await
    {
        Ok(Some(stored)) => stored,
        Ok(None) => {
            warn!(application_id = %application.id, "stored row gone, history skipped");
            return;
        }
        Err(e) => {
            warn!(application_id = %application.id, error = ?e, "history skipped");
            return;
        }
    };

    let entries = domain::record_history(Some(&stored), application, Some(actor));
    if entries.is_empty() {
        return;
    }

    let outcome = async {
        let mut savepoint = conn.begin().await?;
        HistoryService::record(&mut savepoint, application.id, &entries).await?;
        savepoint.commit().await?;
        Ok::<_, Error>(())
    }
    .await;

    if let Err(e) = outcome {
        warn!(application_id = %application.id, error = ?e, "history not recorded");
    }
}

async fn write_application(conn: &mut PgConnection, application: &Application) -> Result<Application> {
    let sql = format!(
        r#"
        UPDATE applications SET
            title = $2, employer = $3, job_url = $4, description = $5,
            address = $6, contact_email = $7, contact_phone = $8, company_website = $9,
            category_id = $10, priority = $11, work_type = $12, source = $13,
            salary_min = $14, salary_max = $15, salary_currency = $16, status = $17,
            submitted = $18, submitted_at = $19, confirmed = $20, confirmed_at = $21,
            responded = $22, responded_at = $23, rejected = $24, rejected_at = $25,
            interview_date = $26, follow_up_date = $27, application_deadline = $28,
            notes = $29, updated_at = $30
        WHERE id = $1
        RETURNING {}
        "#,
        APPLICATION_COLUMNS
    );
    let row = sqlx::query_as::<_, Application>(&sql)
        .bind(application.id)
        .bind(&application.title)
        .bind(&application.employer)
        .bind(&application.job_url)
        .bind(&application.description)
        .bind(&application.address)
        .bind(&application.contact_email)
        .bind(&application.contact_phone)
        .bind(&application.company_website)
        .bind(application.category_id)
        .bind(application.priority)
        .bind(&application.work_type)
        .bind(&application.source)
        .bind(application.salary_min)
        .bind(application.salary_max)
        .bind(&application.salary_currency)
        .bind(application.status)
        .bind(application.submitted)
        .bind(application.submitted_at)
        .bind(application.confirmed)
        .bind(application.confirmed_at)
        .bind(application.responded)
        .bind(application.responded_at)
        .bind(application.rejected)
        .bind(application.rejected_at)
        .bind(application.interview_date)
        .bind(application.follow_up_date)
        .bind(application.application_deadline)
        .bind(&application.notes)
        .bind(application.updated_at)
        .fetch_one(&mut *conn)
        .await?;
    Ok(row)
}

async fn ensure_category(conn: &mut PgConnection, category_id: i64) -> Result<()> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM categories WHERE id = $1)")
        .bind(category_id)
        .fetch_one(&mut *conn)
        .await?;
    if !exists {
        return Err(Error::BadRequest(format!("Unknown category: {}", category_id)));
    }
    Ok(())
}

async fn replace_tags(conn: &mut PgConnection, application_id: Uuid, tag_ids: &[i64]) -> Result<()> {
    sqlx::query("DELETE FROM application_tags WHERE application_id = $1")
        .bind(application_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query(
        r#"
        INSERT INTO application_tags (application_id, tag_id)
        SELECT $1, id FROM tags WHERE id = ANY($2)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(application_id)
    .bind(tag_ids)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn load_tag_ids(conn: &mut PgConnection, application_id: Uuid) -> Result<Vec<i64>> {
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT tag_id FROM application_tags WHERE application_id = $1 ORDER BY tag_id",
    )
    .bind(application_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(ids)
}

async fn load_events_latest_first(
    conn: &mut PgConnection,
    application_id: Uuid,
) -> Result<Vec<StatusEvent>> {
    let mut events = StatusEventService::load_log(conn, application_id)
        .await?
        .into_events();
    events.sort_by(|a, b| (b.occurred_at, b.id).cmp(&(a.occurred_at, a.id)));
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rates_round_to_one_decimal() {
        assert_eq!(percent(1, 3), 33.3);
        assert_eq!(percent(2, 3), 66.7);
        assert_eq!(percent(5, 0), 0.0);
    }

    #[test]
    fn monthly_windows_end_at_now() {
        let now = Utc.with_ymd_and_hms(2024, 12, 15, 12, 0, 0).unwrap();
        let created = [
            now - Duration::days(1),
            now - Duration::days(2),
            now - Duration::days(45),
            now - Duration::days(400),
            now,
        ];

        let months = monthly_counts(now, &created);

        assert_eq!(months.len(), 12);
        assert_eq!(months[11].month, "2024-12");
        assert_eq!(months[11].count, 2);
        assert_eq!(months[10].count, 1);
        assert_eq!(months.iter().map(|m| m.count).sum::<i64>(), 3);
    }
}
