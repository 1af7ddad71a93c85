use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::dto::event_dto::{RejectedEventResponse, StatusEventResponse};
use crate::error::{Error, Result};
use crate::models::application::{Application, ApplicationStatus, Priority};
use crate::models::status_event::NewStatusEvent;
use crate::services::application_service::{
    ApplicationDetail, ApplicationList, ApplicationStats, MonthlyCount, PeriodCounts,
};

/// Tells a field sent as `null` (`Some(None)`) apart from one left out
/// (`None`).
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateApplicationPayload {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1, max = 255))]
    pub employer: String,
    #[validate(url)]
    pub job_url: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    #[validate(email)]
    pub contact_email: Option<String>,
    #[validate(length(max = 50))]
    pub contact_phone: Option<String>,
    #[validate(url)]
    pub company_website: Option<String>,
    pub category_id: Option<i64>,
    pub priority: Option<Priority>,
    pub work_type: Option<String>,
    pub source: Option<String>,
    pub salary_min: Option<Decimal>,
    pub salary_max: Option<Decimal>,
    #[validate(length(equal = 3))]
    pub salary_currency: Option<String>,
    pub status: Option<ApplicationStatus>,
    #[serde(default)]
    pub submitted: bool,
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub confirmed: bool,
    pub confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub responded: bool,
    pub responded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejected: bool,
    pub rejected_at: Option<DateTime<Utc>>,
    pub interview_date: Option<DateTime<Utc>>,
    pub follow_up_date: Option<DateTime<Utc>>,
    pub application_deadline: Option<NaiveDate>,
    pub notes: Option<String>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
    #[serde(default)]
    pub events: Vec<NewStatusEvent>,
}

impl CreateApplicationPayload {
    /// Fills a fresh draft with the submitted values. Status and flags are
    /// left for the reconciler to settle.
    pub fn apply(&self, application: &mut Application) {
        application.job_url = self.job_url.clone();
        application.description = self.description.clone();
        application.address = self.address.clone().unwrap_or_default();
        application.contact_email = self.contact_email.clone();
        application.contact_phone = self.contact_phone.clone().unwrap_or_default();
        application.company_website = self.company_website.clone();
        application.category_id = self.category_id;
        application.priority = self.priority.unwrap_or_default();
        application.work_type = self.work_type.clone();
        application.source = self.source.clone();
        application.salary_min = self.salary_min;
        application.salary_max = self.salary_max;
        if let Some(currency) = &self.salary_currency {
            application.salary_currency = currency.to_uppercase();
        }
        application.status = self.status.unwrap_or_default();
        application.submitted = self.submitted;
        application.submitted_at = self.submitted_at;
        application.confirmed = self.confirmed;
        application.confirmed_at = self.confirmed_at;
        application.responded = self.responded;
        application.responded_at = self.responded_at;
        application.rejected = self.rejected;
        application.rejected_at = self.rejected_at;
        application.interview_date = self.interview_date;
        application.follow_up_date = self.follow_up_date;
        application.application_deadline = self.application_deadline;
        application.notes = self.notes.clone().unwrap_or_default();
    }

    pub fn check_salary(&self) -> Result<()> {
        check_salary_range(self.salary_min, self.salary_max)
    }
}

/// Partial update. Fields left out keep their stored value; nullable fields
/// sent as `null` are cleared.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateApplicationPayload {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub employer: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[validate(url)]
    pub job_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub address: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[validate(email)]
    pub contact_email: Option<Option<String>>,
    #[validate(length(max = 50))]
    pub contact_phone: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[validate(url)]
    pub company_website: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub category_id: Option<Option<i64>>,
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "nullable")]
    pub work_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub source: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub salary_min: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "nullable")]
    pub salary_max: Option<Option<Decimal>>,
    #[validate(length(equal = 3))]
    pub salary_currency: Option<String>,
    pub status: Option<ApplicationStatus>,
    pub submitted: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub submitted_at: Option<Option<DateTime<Utc>>>,
    pub confirmed: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub confirmed_at: Option<Option<DateTime<Utc>>>,
    pub responded: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub responded_at: Option<Option<DateTime<Utc>>>,
    pub rejected: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub rejected_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "nullable")]
    pub interview_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "nullable")]
    pub follow_up_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "nullable")]
    pub application_deadline: Option<Option<NaiveDate>>,
    pub notes: Option<String>,
    pub tag_ids: Option<Vec<i64>>,
    /// Events to append in this save.
    #[serde(default)]
    pub new_events: Vec<NewStatusEvent>,
    /// The full set of stored events the client still shows. Anything else
    /// is deleted. Ignored when absent or empty.
    pub keep_event_ids: Option<Vec<i64>>,
}

fn overwrite<T: Clone>(target: &mut T, sent: &Option<T>) {
    if let Some(value) = sent {
        *target = value.clone();
    }
}

impl UpdateApplicationPayload {
    /// Overwrites every field that was sent.
    pub fn apply(&self, application: &mut Application) {
        overwrite(&mut application.title, &self.title);
        overwrite(&mut application.employer, &self.employer);
        overwrite(&mut application.job_url, &self.job_url);
        overwrite(&mut application.description, &self.description);
        overwrite(&mut application.address, &self.address);
        overwrite(&mut application.contact_email, &self.contact_email);
        overwrite(&mut application.contact_phone, &self.contact_phone);
        overwrite(&mut application.company_website, &self.company_website);
        overwrite(&mut application.category_id, &self.category_id);
        overwrite(&mut application.priority, &self.priority);
        overwrite(&mut application.work_type, &self.work_type);
        overwrite(&mut application.source, &self.source);
        overwrite(&mut application.salary_min, &self.salary_min);
        overwrite(&mut application.salary_max, &self.salary_max);
        if let Some(currency) = &self.salary_currency {
            application.salary_currency = currency.to_uppercase();
        }
        overwrite(&mut application.status, &self.status);
        overwrite(&mut application.submitted, &self.submitted);
        overwrite(&mut application.submitted_at, &self.submitted_at);
        overwrite(&mut application.confirmed, &self.confirmed);
        overwrite(&mut application.confirmed_at, &self.confirmed_at);
        overwrite(&mut application.responded, &self.responded);
        overwrite(&mut application.responded_at, &self.responded_at);
        overwrite(&mut application.rejected, &self.rejected);
        overwrite(&mut application.rejected_at, &self.rejected_at);
        overwrite(&mut application.interview_date, &self.interview_date);
        overwrite(&mut application.follow_up_date, &self.follow_up_date);
        overwrite(&mut application.application_deadline, &self.application_deadline);
        overwrite(&mut application.notes, &self.notes);
    }

    /// Ids to keep when the client sent a non-empty list.
    pub fn keep_ids(&self) -> Option<&[i64]> {
        self.keep_event_ids
            .as_deref()
            .filter(|ids| !ids.is_empty())
    }

    /// Checks the range as far as this payload sets it; the stored values
    /// are checked again once applied.
    pub fn check_salary(&self) -> Result<()> {
        check_salary_range(self.salary_min.flatten(), self.salary_max.flatten())
    }
}

pub fn check_salary_range(min: Option<Decimal>, max: Option<Decimal>) -> Result<()> {
    match (min, max) {
        (Some(min), Some(max)) if min > max => Err(Error::BadRequest(
            "salary_min cannot exceed salary_max".to_string(),
        )),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationResponse {
    pub id: Uuid,
    pub title: String,
    pub employer: String,
    pub job_url: Option<String>,
    pub description: Option<String>,
    pub address: String,
    pub contact_email: Option<String>,
    pub contact_phone: String,
    pub company_website: Option<String>,
    pub category_id: Option<i64>,
    pub priority: Priority,
    pub work_type: Option<String>,
    pub source: Option<String>,
    pub salary_min: Option<Decimal>,
    pub salary_max: Option<Decimal>,
    pub salary_currency: String,
    pub status: ApplicationStatus,
    pub status_label: String,
    pub submitted: bool,
    pub submitted_at: Option<DateTime<Utc>>,
    pub confirmed: bool,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub responded: bool,
    pub responded_at: Option<DateTime<Utc>>,
    pub rejected: bool,
    pub rejected_at: Option<DateTime<Utc>>,
    pub interview_date: Option<DateTime<Utc>>,
    pub follow_up_date: Option<DateTime<Utc>>,
    pub application_deadline: Option<NaiveDate>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Application> for ApplicationResponse {
    fn from(value: Application) -> Self {
        Self {
            id: value.id,
            title: value.title,
            employer: value.employer,
            job_url: value.job_url,
            description: value.description,
            address: value.address,
            contact_email: value.contact_email,
            contact_phone: value.contact_phone,
            company_website: value.company_website,
            category_id: value.category_id,
            priority: value.priority,
            work_type: value.work_type,
            source: value.source,
            salary_min: value.salary_min,
            salary_max: value.salary_max,
            salary_currency: value.salary_currency,
            status: value.status,
            status_label: value.status.label().to_string(),
            submitted: value.submitted,
            submitted_at: value.submitted_at,
            confirmed: value.confirmed,
            confirmed_at: value.confirmed_at,
            responded: value.responded,
            responded_at: value.responded_at,
            rejected: value.rejected,
            rejected_at: value.rejected_at,
            interview_date: value.interview_date,
            follow_up_date: value.follow_up_date,
            application_deadline: value.application_deadline,
            notes: value.notes,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationDetailResponse {
    #[serde(flatten)]
    pub application: ApplicationResponse,
    pub tag_ids: Vec<i64>,
    pub events: Vec<StatusEventResponse>,
    /// Proposed events that were not saved, with the reason.
    pub rejected_events: Vec<RejectedEventResponse>,
}

impl From<ApplicationDetail> for ApplicationDetailResponse {
    fn from(value: ApplicationDetail) -> Self {
        Self {
            application: value.application.into(),
            tag_ids: value.tag_ids,
            events: value.events.into_iter().map(Into::into).collect(),
            rejected_events: value.rejected.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationListResponse {
    pub items: Vec<ApplicationResponse>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl From<ApplicationList> for ApplicationListResponse {
    fn from(value: ApplicationList) -> Self {
        Self {
            items: value.items.into_iter().map(Into::into).collect(),
            total: value.total,
            page: value.page,
            per_page: value.per_page,
            total_pages: value.total_pages,
        }
    }
}

/// Sort keys accepted by the list endpoint; a leading `-` sorts descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ApplicationSort {
    #[serde(rename = "created_at")]
    CreatedAsc,
    #[default]
    #[serde(rename = "-created_at")]
    CreatedDesc,
    #[serde(rename = "title")]
    TitleAsc,
    #[serde(rename = "-title")]
    TitleDesc,
    #[serde(rename = "employer")]
    EmployerAsc,
    #[serde(rename = "-employer")]
    EmployerDesc,
    #[serde(rename = "priority")]
    PriorityAsc,
    #[serde(rename = "-priority")]
    PriorityDesc,
}

const PRIORITY_ORDER: &str = "CASE priority WHEN 'high' THEN 0 WHEN 'medium' THEN 1 ELSE 2 END";

impl ApplicationSort {
    /// `ORDER BY` body. Ties fall back to newest first. Ascending priority
    /// puts `high` first.
    pub fn order_by(self) -> String {
        let primary = match self {
            ApplicationSort::CreatedAsc => return "created_at ASC, id".to_string(),
            ApplicationSort::CreatedDesc => return "created_at DESC, id".to_string(),
            ApplicationSort::TitleAsc => "title ASC".to_string(),
            ApplicationSort::TitleDesc => "title DESC".to_string(),
            ApplicationSort::EmployerAsc => "employer ASC".to_string(),
            ApplicationSort::EmployerDesc => "employer DESC".to_string(),
            ApplicationSort::PriorityAsc => format!("{} ASC", PRIORITY_ORDER),
            ApplicationSort::PriorityDesc => format!("{} DESC", PRIORITY_ORDER),
        };
        format!("{}, created_at DESC, id", primary)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ApplicationListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<ApplicationStatus>,
    pub priority: Option<Priority>,
    pub category_id: Option<i64>,
    pub work_type: Option<String>,
    pub source: Option<String>,
    pub tag_id: Option<i64>,
    pub submitted: Option<bool>,
    pub responded: Option<bool>,
    pub rejected: Option<bool>,
    /// Matches title, employer, description, address, notes and contacts.
    pub search: Option<String>,
    pub sort: Option<ApplicationSort>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusCountResponse {
    pub status: ApplicationStatus,
    pub label: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupCountResponse {
    /// `None` groups applications with the value unset.
    pub key: Option<String>,
    pub label: String,
    pub count: i64,
}

impl GroupCountResponse {
    fn from_pairs(pairs: Vec<(Option<String>, i64)>, unset: &str) -> Vec<Self> {
        pairs
            .into_iter()
            .map(|(key, count)| Self {
                label: key.clone().unwrap_or_else(|| unset.to_string()),
                key,
                count,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployerCountResponse {
    pub employer: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpcomingResponse {
    pub interviews: i64,
    pub follow_ups: i64,
    pub deadlines: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationStatsResponse {
    pub total: i64,
    pub by_status: Vec<StatusCountResponse>,
    pub submitted: i64,
    pub confirmed: i64,
    pub responded: i64,
    pub rejected: i64,
    /// Shares of submitted applications, in percent.
    pub response_rate: f64,
    pub success_rate: f64,
    pub rejection_rate: f64,
    pub created: PeriodCounts,
    pub submissions: PeriodCounts,
    pub responses: PeriodCounts,
    pub rejections: PeriodCounts,
    pub by_category: Vec<GroupCountResponse>,
    pub by_priority: Vec<GroupCountResponse>,
    pub by_work_type: Vec<GroupCountResponse>,
    pub by_source: Vec<GroupCountResponse>,
    pub top_employers: Vec<EmployerCountResponse>,
    pub monthly: Vec<MonthlyCount>,
    pub avg_salary_min: Option<Decimal>,
    pub avg_salary_max: Option<Decimal>,
    pub upcoming: UpcomingResponse,
}

impl From<ApplicationStats> for ApplicationStatsResponse {
    fn from(value: ApplicationStats) -> Self {
        let by_status = ApplicationStatus::ALL
            .into_iter()
            .map(|status| StatusCountResponse {
                status,
                label: status.label().to_string(),
                count: value.count_for(status),
            })
            .collect();
        let by_priority = value
            .by_priority
            .iter()
            .map(|(priority, count)| GroupCountResponse {
                key: Some(priority.as_str().to_string()),
                label: priority.label().to_string(),
                count: *count,
            })
            .collect();

        Self {
            total: value.total,
            by_status,
            submitted: value.submitted,
            confirmed: value.confirmed,
            responded: value.responded,
            rejected: value.rejected,
            response_rate: value.response_rate(),
            success_rate: value.success_rate(),
            rejection_rate: value.rejection_rate(),
            created: value.created,
            submissions: value.submissions,
            responses: value.responses,
            rejections: value.rejections,
            by_category: GroupCountResponse::from_pairs(value.by_category, "Uncategorized"),
            by_priority,
            by_work_type: GroupCountResponse::from_pairs(value.by_work_type, "Not specified"),
            by_source: GroupCountResponse::from_pairs(value.by_source, "Not specified"),
            top_employers: value
                .top_employers
                .into_iter()
                .map(|(employer, count)| EmployerCountResponse { employer, count })
                .collect(),
            monthly: value.monthly,
            avg_salary_min: value.avg_salary_min,
            avg_salary_max: value.avg_salary_max,
            upcoming: UpcomingResponse {
                interviews: value.upcoming_interviews,
                follow_ups: value.upcoming_follow_ups,
                deadlines: value.upcoming_deadlines,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn draft() -> Application {
        let created = Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap();
        Application::draft(Uuid::nil(), "Rust Developer", "Umbrella", created)
    }

    #[test]
    fn update_only_touches_sent_fields() {
        let mut app = draft();
        app.notes = "keep me".to_string();
        let payload: UpdateApplicationPayload = serde_json::from_value(serde_json::json!({
            "employer": "Umbrella Corp",
            "submitted": true,
            "status": "applied",
            "salary_currency": "eur"
        }))
        .unwrap();

        payload.apply(&mut app);

        assert_eq!(app.employer, "Umbrella Corp");
        assert_eq!(app.title, "Rust Developer");
        assert_eq!(app.notes, "keep me");
        assert!(app.submitted);
        assert_eq!(app.status, ApplicationStatus::Applied);
        assert_eq!(app.salary_currency, "EUR");
    }

    #[test]
    fn null_clears_and_omission_keeps() {
        let mut app = draft();
        let interview = Utc.with_ymd_and_hms(2024, 2, 10, 9, 0, 0).unwrap();
        app.interview_date = Some(interview);
        app.follow_up_date = Some(interview);
        app.category_id = Some(4);
        app.job_url = Some("https://jobs.example.com/42".to_string());

        let payload: UpdateApplicationPayload = serde_json::from_value(serde_json::json!({
            "interview_date": null,
            "category_id": null,
            "job_url": null
        }))
        .unwrap();
        assert_eq!(payload.interview_date, Some(None));
        assert_eq!(payload.follow_up_date, None);

        payload.apply(&mut app);

        assert_eq!(app.interview_date, None);
        assert_eq!(app.category_id, None);
        assert_eq!(app.job_url, None);
        assert_eq!(app.follow_up_date, Some(interview));
    }

    #[test]
    fn contact_fields_are_validated() {
        let payload: UpdateApplicationPayload = serde_json::from_value(serde_json::json!({
            "contact_email": "not-an-email",
            "company_website": "example"
        }))
        .unwrap();

        let errors = payload.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("contact_email"));
        assert!(fields.contains_key("company_website"));

        let cleared: UpdateApplicationPayload =
            serde_json::from_value(serde_json::json!({ "contact_email": null })).unwrap();
        assert!(cleared.validate().is_ok());
    }

    #[test]
    fn sort_keys_parse_from_the_query_string() {
        let query: ApplicationListQuery =
            serde_json::from_value(serde_json::json!({ "sort": "-employer", "tag_id": 3 }))
                .unwrap();
        assert_eq!(query.sort, Some(ApplicationSort::EmployerDesc));
        assert_eq!(query.tag_id, Some(3));
        assert!(ApplicationSort::PriorityAsc.order_by().starts_with("CASE priority"));
        assert_eq!(ApplicationSort::default().order_by(), "created_at DESC, id");
    }

    #[test]
    fn empty_keep_list_is_ignored() {
        let mut payload = UpdateApplicationPayload::default();
        assert_eq!(payload.keep_ids(), None);

        payload.keep_event_ids = Some(Vec::new());
        assert_eq!(payload.keep_ids(), None);

        payload.keep_event_ids = Some(vec![3, 4]);
        assert_eq!(payload.keep_ids(), Some(&[3, 4][..]));
    }

    #[test]
    fn blank_title_fails_validation() {
        let payload: CreateApplicationPayload = serde_json::from_value(serde_json::json!({
            "title": "",
            "employer": "Acme",
            "job_url": "not a url"
        }))
        .unwrap();

        let errors = payload.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("job_url"));
    }

    #[test]
    fn inverted_salary_range_is_rejected() {
        let payload = UpdateApplicationPayload {
            salary_min: Some(Some(Decimal::new(5000, 0))),
            salary_max: Some(Some(Decimal::new(4000, 0))),
            ..UpdateApplicationPayload::default()
        };

        assert!(matches!(payload.check_salary(), Err(Error::BadRequest(_))));
    }
}
