use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};
use uuid::Uuid;

use crate::error::Result;
use crate::models::application::Application;
use crate::models::profile::UserProfile;
use crate::services::profile_service::ProfileService;
use crate::services::notification_service::{KIND_DEADLINE, KIND_FOLLOW_UP, KIND_INTERVIEW};
use crate::utils::time;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderItem {
    pub application_id: Uuid,
    pub kind: &'static str,
    pub title: String,
    pub employer: String,
    pub when: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Digest {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub day: NaiveDate,
    pub items: Vec<ReminderItem>,
}

/// Per-user reminder settings. Users without a stored profile are reminded
/// `default_days` ahead; users who switched notifications off are skipped.
#[derive(Debug, Clone)]
pub struct ReminderWindows {
    default_days: i64,
    profiles: HashMap<Uuid, UserProfile>,
}

impl ReminderWindows {
    pub fn new(default_days: i64, profiles: Vec<UserProfile>) -> Self {
        Self {
            default_days,
            profiles: profiles.into_iter().map(|p| (p.user_id, p)).collect(),
        }
    }

    pub fn days_for(&self, user_id: Uuid) -> Option<i64> {
        match self.profiles.get(&user_id) {
            None => Some(self.default_days),
            Some(profile) if profile.email_notifications_enabled => {
                Some(i64::from(profile.reminder_days_before.max(1)))
            }
            Some(_) => None,
        }
    }

    /// The longest window any recipient asked for; bounds the scan query.
    pub fn widest(&self) -> i64 {
        self.profiles
            .values()
            .filter_map(|profile| self.days_for(profile.user_id))
            .fold(self.default_days, i64::max)
    }

    pub fn email_for(&self, user_id: Uuid) -> Option<String> {
        self.profiles.get(&user_id).and_then(|p| p.email.clone())
    }
}

/// Groups the upcoming interviews, follow-ups and deadlines of `applications`
/// into one digest per user. Timed entries count when they fall in
/// `(now, now + days]` for the owner's window, deadlines when their day is
/// within the same window.
pub fn plan_digests(
    applications: &[Application],
    now: DateTime<Utc>,
    windows: &ReminderWindows,
) -> Vec<Digest> {
    let mut per_user: BTreeMap<Uuid, Vec<(DateTime<Utc>, ReminderItem)>> = BTreeMap::new();

    for app in applications {
        let Some(days) = windows.days_for(app.user_id) else {
            continue;
        };
        let end = time::window_end(now, days);
        let in_window = |at: &DateTime<Utc>| *at > now && *at <= end;

        let item = |kind: &'static str, when: String| ReminderItem {
            application_id: app.id,
            kind,
            title: app.title.clone(),
            employer: app.employer.clone(),
            when,
        };
        let entries = per_user.entry(app.user_id).or_default();

        if let Some(at) = app.interview_date.filter(in_window) {
            entries.push((at, item(KIND_INTERVIEW, at.format("%d.%m.%Y %H:%M").to_string())));
        }
        if let Some(at) = app.follow_up_date.filter(in_window) {
            entries.push((at, item(KIND_FOLLOW_UP, at.format("%d.%m.%Y %H:%M").to_string())));
        }
        if let Some(day) = app
            .application_deadline
            .filter(|day| *day >= now.date_naive() && *day <= end.date_naive())
        {
            let at = day.and_time(chrono::NaiveTime::MIN).and_utc();
            entries.push((at, item(KIND_DEADLINE, day.format("%d.%m.%Y").to_string())));
        }
    }

    per_user
        .into_iter()
        .filter(|(_, entries)| !entries.is_empty())
        .map(|(user_id, mut entries)| {
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Digest {
                user_id,
                email: windows.email_for(user_id),
                day: now.date_naive(),
                items: entries.into_iter().map(|(_, item)| item).collect(),
            }
        })
        .collect()
}

/// Side effects of sending digests: claiming the `(user, day)` slot,
/// delivering, and giving the slot back when delivery fails.
pub(crate) trait DigestOutbox {
    async fn claim(&self, digest: &Digest) -> Result<bool>;
    async fn deliver(&self, digest: &Digest) -> Result<()>;
    async fn release(&self, digest: &Digest) -> Result<()>;
}

/// Sends each digest at most once per user and day. A failed delivery or a
/// failed release is logged and the remaining users are still served.
pub(crate) async fn dispatch<O: DigestOutbox>(outbox: &O, digests: Vec<Digest>) -> Result<usize> {
    let mut delivered = 0;
    for digest in digests {
        if !outbox.claim(&digest).await? {
            continue;
        }
        match outbox.deliver(&digest).await {
            Ok(()) => delivered += 1,
            Err(e) => {
                error!(error = ?e, user_id = %digest.user_id, "reminder delivery failed");
                if let Err(e) = outbox.release(&digest).await {
                    error!(error = ?e, user_id = %digest.user_id, "reminder claim not released");
                }
            }
        }
    }
    Ok(delivered)
}

#[derive(Clone)]
pub struct ReminderService {
    pool: PgPool,
    profiles: ProfileService,
    http: Client,
    webhook_url: Option<String>,
    days_before: i64,
}

impl ReminderService {
    pub fn new(
        pool: PgPool,
        profiles: ProfileService,
        http: Client,
        webhook_url: Option<String>,
        days_before: i64,
    ) -> Self {
        Self {
            pool,
            profiles,
            http,
            webhook_url,
            days_before,
        }
    }

    /// One scan. Returns the number of digests delivered.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<usize> {
        let windows = ReminderWindows::new(self.days_before, self.profiles.all().await?);
        let end = time::window_end(now, windows.widest());
        let applications = sqlx::query_as::<_, Application>(
            r#"
            SELECT * FROM applications
            WHERE (interview_date > $1 AND interview_date <= $2)
               OR (follow_up_date > $1 AND follow_up_date <= $2)
               OR (application_deadline BETWEEN $3 AND $4)
            "#,
        )
        .bind(now)
        .bind(end)
        .bind(now.date_naive())
        .bind(end.date_naive())
        .fetch_all(&self.pool)
        .await?;

        let delivered = dispatch(self, plan_digests(&applications, now, &windows)).await?;
        if delivered > 0 {
            info!(delivered, "reminder digests sent");
        }
        Ok(delivered)
    }
}

impl DigestOutbox for ReminderService {
    async fn claim(&self, digest: &Digest) -> Result<bool> {
        let res = sqlx::query(
            r#"
            INSERT INTO reminder_dispatches (user_id, day, item_count)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, day) DO NOTHING
            "#,
        )
        .bind(digest.user_id)
        .bind(digest.day)
        .bind(digest.items.len() as i32)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn release(&self, digest: &Digest) -> Result<()> {
        sqlx::query("DELETE FROM reminder_dispatches WHERE user_id = $1 AND day = $2")
            .bind(digest.user_id)
            .bind(digest.day)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn deliver(&self, digest: &Digest) -> Result<()> {
        let Some(url) = &self.webhook_url else {
            info!(
                user_id = %digest.user_id,
                items = digest.items.len(),
                "reminder digest (no webhook configured)"
            );
            return Ok(());
        };

        self.http
            .post(url)
            .json(&json!({
                "type": "reminder_digest",
                "user_id": digest.user_id,
                "email": digest.email,
                "day": digest.day,
                "items": digest.items,
            }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Starts the cron job that runs [`ReminderService::run_once`]. The returned
/// scheduler must be kept alive for the job to keep firing.
pub async fn start_scheduler(service: ReminderService, cron: &str) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;
    let job = Job::new_async(cron, move |_id, _scheduler| {
        let service = service.clone();
        Box::pin(async move {
            if let Err(e) = service.run_once(time::now()).await {
                error!(error = ?e, "reminder scan failed");
            }
        })
    })?;
    scheduler.add(job).await?;
    scheduler.start().await?;
    info!(cron, "reminder scheduler started");
    Ok(scheduler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::sync::Mutex;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 7, 0, 0).unwrap()
    }

    fn application(user: Uuid, title: &str) -> Application {
        Application::draft(user, title, "Globex", now() - Duration::days(10))
    }

    #[test]
    fn digests_are_grouped_per_user_and_sorted() {
        let alice = Uuid::from_u128(1);
        let bob = Uuid::from_u128(2);

        let mut a1 = application(alice, "Platform");
        a1.interview_date = Some(now() + Duration::hours(20));
        let mut a2 = application(alice, "Tooling");
        a2.follow_up_date = Some(now() + Duration::hours(3));
        let mut b1 = application(bob, "Data");
        b1.application_deadline = Some(now().date_naive());

        let digests = plan_digests(&[a1, a2, b1], now(), &ReminderWindows::new(1, Vec::new()));

        assert_eq!(digests.len(), 2);
        assert_eq!(digests[0].user_id, alice);
        let kinds: Vec<_> = digests[0].items.iter().map(|i| i.kind).collect();
        assert_eq!(kinds, vec![KIND_FOLLOW_UP, KIND_INTERVIEW]);
        assert_eq!(digests[1].items[0].kind, KIND_DEADLINE);
        assert_eq!(digests[1].items[0].when, "10.06.2024");
    }

    #[test]
    fn entries_outside_the_window_are_skipped() {
        let user = Uuid::from_u128(3);
        let mut app = application(user, "Ops");
        app.interview_date = Some(now() + Duration::days(3));
        app.follow_up_date = Some(now() - Duration::hours(1));
        app.application_deadline = Some(now().date_naive() - Duration::days(1));

        assert!(plan_digests(&[app], now(), &ReminderWindows::new(1, Vec::new())).is_empty());
    }

    fn profile(user_id: Uuid, enabled: bool, days: i32) -> UserProfile {
        UserProfile {
            user_id,
            first_name: String::new(),
            last_name: String::new(),
            email: Some(format!("{}@example.com", user_id.as_u128())),
            email_notifications_enabled: enabled,
            reminder_days_before: days,
            created_at: now(),
            updated_at: now(),
        }
    }

    #[test]
    fn profiles_opt_out_and_size_their_window() {
        let muted = Uuid::from_u128(4);
        let early = Uuid::from_u128(5);
        let plain = Uuid::from_u128(6);
        let windows = ReminderWindows::new(
            1,
            vec![profile(muted, false, 7), profile(early, true, 3)],
        );
        assert_eq!(windows.widest(), 3);

        let in_two_days = Some(now() + Duration::days(2));
        let mut a = application(muted, "Muted");
        a.interview_date = in_two_days;
        let mut b = application(early, "Early");
        b.interview_date = in_two_days;
        let mut c = application(plain, "Plain");
        c.interview_date = in_two_days;

        let digests = plan_digests(&[a, b, c], now(), &windows);

        assert_eq!(digests.len(), 1);
        assert_eq!(digests[0].user_id, early);
        assert_eq!(digests[0].email.as_deref(), Some("5@example.com"));
    }

    #[derive(Default)]
    struct FlakyOutbox {
        failing: Vec<Uuid>,
        delivered: Mutex<Vec<Uuid>>,
        released: Mutex<Vec<Uuid>>,
    }

    impl DigestOutbox for FlakyOutbox {
        async fn claim(&self, _digest: &Digest) -> Result<bool> {
            Ok(true)
        }

        async fn deliver(&self, digest: &Digest) -> Result<()> {
            if self.failing.contains(&digest.user_id) {
                return Err(crate::error::Error::Internal("webhook down".to_string()));
            }
            self.delivered.lock().unwrap().push(digest.user_id);
            Ok(())
        }

        async fn release(&self, digest: &Digest) -> Result<()> {
            self.released.lock().unwrap().push(digest.user_id);
            Err(crate::error::Error::Internal("database gone".to_string()))
        }
    }

    fn digest(user_id: Uuid) -> Digest {
        Digest {
            user_id,
            email: None,
            day: now().date_naive(),
            items: Vec::new(),
        }
    }

    #[test]
    fn failed_release_does_not_stop_the_remaining_users() {
        let first = Uuid::from_u128(7);
        let second = Uuid::from_u128(8);
        let outbox = FlakyOutbox {
            failing: vec![first],
            ..FlakyOutbox::default()
        };

        let delivered =
            tokio_test::block_on(dispatch(&outbox, vec![digest(first), digest(second)])).unwrap();

        assert_eq!(delivered, 1);
        assert_eq!(*outbox.released.lock().unwrap(), vec![first]);
        assert_eq!(*outbox.delivered.lock().unwrap(), vec![second]);
    }
}
