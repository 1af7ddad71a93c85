//! Field-level change tracking for applications.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::models::application::{Application, ApplicationStatus, Priority};
use crate::models::history::NewHistoryEntry;
use crate::models::UnknownVariant;

const MOMENT_FORMAT: &str = "%d.%m.%Y %H:%M";
const DAY_FORMAT: &str = "%d.%m.%Y";
const STORED_DAY_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackedField {
    Status,
    Title,
    Employer,
    Priority,
    Category,
    Submitted,
    Confirmed,
    Responded,
    Rejected,
    InterviewDate,
    FollowUpDate,
    ApplicationDeadline,
}

/// A watched value in comparable form. The variant decides how the value is
/// stored and how it is shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Flag(bool),
    Moment(Option<DateTime<Utc>>),
    Day(Option<NaiveDate>),
    Choice(&'static str),
    Text(String),
    Reference(Option<i64>),
}

impl FieldValue {
    pub fn stored(&self) -> String {
        match self {
            FieldValue::Flag(value) => value.to_string(),
            FieldValue::Moment(value) => value.map(|v| v.to_rfc3339()).unwrap_or_default(),
            FieldValue::Day(value) => value
                .map(|v| v.format(STORED_DAY_FORMAT).to_string())
                .unwrap_or_default(),
            FieldValue::Choice(value) => value.to_string(),
            FieldValue::Text(value) => value.clone(),
            FieldValue::Reference(value) => value.map(|v| v.to_string()).unwrap_or_default(),
        }
    }
}

impl TrackedField {
    pub const ALL: [TrackedField; 12] = [
        TrackedField::Status,
        TrackedField::Title,
        TrackedField::Employer,
        TrackedField::Priority,
        TrackedField::Category,
        TrackedField::Submitted,
        TrackedField::Confirmed,
        TrackedField::Responded,
        TrackedField::Rejected,
        TrackedField::InterviewDate,
        TrackedField::FollowUpDate,
        TrackedField::ApplicationDeadline,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TrackedField::Status => "status",
            TrackedField::Title => "title",
            TrackedField::Employer => "employer",
            TrackedField::Priority => "priority",
            TrackedField::Category => "category",
            TrackedField::Submitted => "submitted",
            TrackedField::Confirmed => "confirmed",
            TrackedField::Responded => "responded",
            TrackedField::Rejected => "rejected",
            TrackedField::InterviewDate => "interview_date",
            TrackedField::FollowUpDate => "follow_up_date",
            TrackedField::ApplicationDeadline => "application_deadline",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TrackedField::Status => "Status",
            TrackedField::Title => "Job Title",
            TrackedField::Employer => "Employer",
            TrackedField::Priority => "Priority",
            TrackedField::Category => "Category",
            TrackedField::Submitted => "Resume Submitted",
            TrackedField::Confirmed => "Application Confirmed",
            TrackedField::Responded => "Response Received",
            TrackedField::Rejected => "Rejection Received",
            TrackedField::InterviewDate => "Interview Date",
            TrackedField::FollowUpDate => "Follow-up Date",
            TrackedField::ApplicationDeadline => "Application Deadline",
        }
    }

    pub fn read(self, application: &Application) -> FieldValue {
        match self {
            TrackedField::Status => FieldValue::Choice(application.status.as_str()),
            TrackedField::Title => FieldValue::Text(application.title.clone()),
            TrackedField::Employer => FieldValue::Text(application.employer.clone()),
            TrackedField::Priority => FieldValue::Choice(application.priority.as_str()),
            TrackedField::Category => FieldValue::Reference(application.category_id),
            TrackedField::Submitted => FieldValue::Flag(application.submitted),
            TrackedField::Confirmed => FieldValue::Flag(application.confirmed),
            TrackedField::Responded => FieldValue::Flag(application.responded),
            TrackedField::Rejected => FieldValue::Flag(application.rejected),
            TrackedField::InterviewDate => FieldValue::Moment(application.interview_date),
            TrackedField::FollowUpDate => FieldValue::Moment(application.follow_up_date),
            TrackedField::ApplicationDeadline => FieldValue::Day(application.application_deadline),
        }
    }

    /// Human-readable form of a stored value; `None` when there is nothing
    /// to show. `category_name` resolves category ids.
    pub fn display<F>(self, stored: &str, category_name: F) -> Option<String>
    where
        F: Fn(i64) -> Option<String>,
    {
        if stored.is_empty() || stored == "None" {
            return None;
        }

        let shown = match self {
            TrackedField::Submitted
            | TrackedField::Confirmed
            | TrackedField::Responded
            | TrackedField::Rejected => match stored.to_ascii_lowercase().as_str() {
                "true" => "Yes".to_string(),
                "false" => "No".to_string(),
                _ => stored.to_string(),
            },
            TrackedField::InterviewDate | TrackedField::FollowUpDate => {
                DateTime::parse_from_rfc3339(stored)
                    .map(|v| v.with_timezone(&Utc).format(MOMENT_FORMAT).to_string())
                    .unwrap_or_else(|_| stored.to_string())
            }
            TrackedField::ApplicationDeadline => {
                NaiveDate::parse_from_str(stored, STORED_DAY_FORMAT)
                    .map(|v| v.format(DAY_FORMAT).to_string())
                    .unwrap_or_else(|_| stored.to_string())
            }
            TrackedField::Status => stored
                .parse::<ApplicationStatus>()
                .map(|v| v.label().to_string())
                .unwrap_or_else(|_| stored.to_string()),
            TrackedField::Priority => stored
                .parse::<Priority>()
                .map(|v| v.label().to_string())
                .unwrap_or_else(|_| stored.to_string()),
            TrackedField::Category => stored
                .parse::<i64>()
                .ok()
                .and_then(category_name)
                .unwrap_or_else(|| stored.to_string()),
            TrackedField::Title | TrackedField::Employer => stored.to_string(),
        };

        Some(shown)
    }
}

impl FromStr for TrackedField {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TrackedField::ALL
            .into_iter()
            .find(|field| field.name() == s)
            .ok_or_else(|| UnknownVariant::new("tracked field", s))
    }
}

/// Diffs two versions of an application over the watch-list. A missing
/// `old` row means the application is new, which is never recorded.
pub fn record_history(
    old: Option<&Application>,
    new: &Application,
    actor: Option<Uuid>,
) -> Vec<NewHistoryEntry> {
    let Some(old) = old else {
        return Vec::new();
    };

    TrackedField::ALL
        .into_iter()
        .filter_map(|field| {
            let before = field.read(old);
            let after = field.read(new);
            (before != after).then(|| NewHistoryEntry {
                field_name: field.name(),
                old_value: before.stored(),
                new_value: after.stored(),
                actor_id: actor,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn application() -> Application {
        let created = Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap();
        Application::draft(Uuid::nil(), "QA Engineer", "Hooli", created)
    }

    fn no_categories(_: i64) -> Option<String> {
        None
    }

    #[test]
    fn status_change_records_one_entry() {
        let mut old = application();
        old.status = ApplicationStatus::Applied;
        let mut new = old.clone();
        new.status = ApplicationStatus::Rejected;
        let actor = Uuid::new_v4();

        let entries = record_history(Some(&old), &new, Some(actor));

        assert_eq!(
            entries,
            vec![NewHistoryEntry {
                field_name: "status",
                old_value: "applied".to_string(),
                new_value: "rejected".to_string(),
                actor_id: Some(actor),
            }]
        );
    }

    #[test]
    fn unwatched_fields_are_ignored() {
        let old = application();
        let mut new = old.clone();
        new.notes = "called the recruiter".to_string();
        new.job_url = Some("https://example.com/job/1".to_string());
        new.submitted_at = Some(Utc::now());

        assert!(record_history(Some(&old), &new, None).is_empty());
    }

    #[test]
    fn new_applications_have_no_history() {
        assert!(record_history(None, &application(), None).is_empty());
    }

    #[test]
    fn several_fields_produce_one_entry_each() {
        let old = application();
        let mut new = old.clone();
        new.submitted = true;
        new.category_id = Some(3);
        new.application_deadline = NaiveDate::from_ymd_opt(2024, 4, 1);

        let entries = record_history(Some(&old), &new, None);
        let names: Vec<_> = entries.iter().map(|e| e.field_name).collect();

        assert_eq!(names, vec!["category", "submitted", "application_deadline"]);
        assert_eq!(entries[0].old_value, "");
        assert_eq!(entries[0].new_value, "3");
        assert_eq!(entries[1].new_value, "true");
        assert_eq!(entries[2].new_value, "2024-04-01");
    }

    #[test]
    fn stored_values_render_for_display() {
        assert_eq!(
            TrackedField::Submitted.display("true", no_categories).as_deref(),
            Some("Yes")
        );
        assert_eq!(
            TrackedField::Rejected.display("false", no_categories).as_deref(),
            Some("No")
        );
        assert_eq!(
            TrackedField::InterviewDate
                .display("2024-05-06T14:30:00+00:00", no_categories)
                .as_deref(),
            Some("06.05.2024 14:30")
        );
        assert_eq!(
            TrackedField::ApplicationDeadline
                .display("2024-04-01", no_categories)
                .as_deref(),
            Some("01.04.2024")
        );
        assert_eq!(
            TrackedField::Status
                .display("documents_requested", no_categories)
                .as_deref(),
            Some("Documents Requested")
        );
        assert_eq!(TrackedField::Title.display("", no_categories), None);
    }

    #[test]
    fn category_ids_resolve_through_the_lookup() {
        let lookup = |id: i64| (id == 7).then(|| "Backend".to_string());

        assert_eq!(
            TrackedField::Category.display("7", lookup).as_deref(),
            Some("Backend")
        );
        assert_eq!(TrackedField::Category.display("8", lookup).as_deref(), Some("8"));
    }

    #[test]
    fn field_names_parse_back() {
        for field in TrackedField::ALL {
            assert_eq!(field.name().parse::<TrackedField>(), Ok(field));
        }
        assert!("notes".parse::<TrackedField>().is_err());
    }
}
