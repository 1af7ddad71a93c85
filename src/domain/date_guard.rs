//! Keeps status-related timestamps from preceding the creation time of the
//! application they belong to.
//!
//! Two policies exist. [`validate`] and friends reject a value and hand back
//! a message for the caller to surface; [`clamp_dates`] silently pulls stored
//! values up to the creation time and runs on every save.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use validator::{ValidationError, ValidationErrors};

use crate::domain::event_log::EventLog;
use crate::models::application::Application;
use crate::models::status_event::EventKind;

const CREATED_FORMAT: &str = "%d.%m.%Y %H:%M";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct DateViolation {
    pub field: &'static str,
    pub message: String,
}

impl DateViolation {
    fn new(field: &'static str, label: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            field,
            message: format!(
                "{} cannot be earlier than the application creation date ({})",
                label,
                created_at.format(CREATED_FORMAT)
            ),
        }
    }

    pub fn into_validation_error(self) -> ValidationError {
        let mut error = ValidationError::new("before_creation");
        error.message = Some(Cow::Owned(self.message));
        error
    }
}

/// Checks a single timestamp against `created_at`.
pub fn validate(
    field: &'static str,
    label: &str,
    timestamp: DateTime<Utc>,
    created_at: DateTime<Utc>,
) -> Result<(), DateViolation> {
    if timestamp < created_at {
        return Err(DateViolation::new(field, label, created_at));
    }
    Ok(())
}

pub fn validate_event_date(
    timestamp: DateTime<Utc>,
    application: &Application,
) -> Result<(), DateViolation> {
    validate("occurred_at", "Event date", timestamp, application.created_at)
}

const GUARDED_FIELDS: [(&str, &str); 5] = [
    ("submitted_at", "Resume Submitted Date"),
    ("confirmed_at", "Confirmation Date"),
    ("responded_at", "Response Date"),
    ("rejected_at", "Rejection Date"),
    ("interview_date", "Interview Date"),
];

fn slot<'a>(application: &'a mut Application, field: &str) -> &'a mut Option<DateTime<Utc>> {
    match field {
        "submitted_at" => &mut application.submitted_at,
        "confirmed_at" => &mut application.confirmed_at,
        "responded_at" => &mut application.responded_at,
        "rejected_at" => &mut application.rejected_at,
        _ => &mut application.interview_date,
    }
}

fn value_of(application: &Application, field: &str) -> Option<DateTime<Utc>> {
    match field {
        "submitted_at" => application.submitted_at,
        "confirmed_at" => application.confirmed_at,
        "responded_at" => application.responded_at,
        "rejected_at" => application.rejected_at,
        _ => application.interview_date,
    }
}

/// Collects one error per date field that precedes the creation time.
pub fn validate_application_dates(application: &Application) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    for (field, label) in GUARDED_FIELDS {
        if let Some(timestamp) = value_of(application, field) {
            if let Err(violation) = validate(field, label, timestamp, application.created_at) {
                errors.add(field, violation.into_validation_error());
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Raises every guarded field that precedes `created_at` to `created_at`.
/// Returns the names of the fields that were changed.
pub fn clamp_dates(application: &mut Application) -> Vec<&'static str> {
    let created_at = application.created_at;
    let mut clamped = Vec::new();

    for (field, _) in GUARDED_FIELDS {
        let value = slot(application, field);
        if matches!(*value, Some(timestamp) if timestamp < created_at) {
            *value = Some(created_at);
            clamped.push(field);
        }
    }

    clamped
}

/// Timestamp to adopt for a flag tied to `kind`: the latest logged event of
/// that kind (never earlier than creation), then `fallback` when it is valid,
/// then the later of creation and `now`.
pub fn resolve_for_kind(
    application: &Application,
    log: &EventLog,
    kind: EventKind,
    fallback: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let created_at = application.created_at;

    if let Some(event) = log.latest_of_kind(&[kind]) {
        return event.occurred_at.max(created_at);
    }

    match fallback {
        Some(timestamp) if timestamp >= created_at => timestamp,
        _ => created_at.max(now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::status_event::StatusEvent;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 30, 0).unwrap()
    }

    fn application() -> Application {
        Application::draft(Uuid::nil(), "Backend Developer", "Initech", created())
    }

    fn log_with(kind: EventKind, occurred_at: DateTime<Utc>) -> EventLog {
        EventLog::new(vec![StatusEvent {
            id: 1,
            application_id: Uuid::nil(),
            kind,
            occurred_at,
            note: String::new(),
            created_at: occurred_at,
        }])
    }

    #[test]
    fn event_before_creation_is_rejected_with_the_creation_date() {
        let err = validate_event_date(created() - Duration::days(1), &application()).unwrap_err();

        assert_eq!(err.field, "occurred_at");
        assert!(err.message.contains("01.01.2024 09:30"), "{}", err.message);
    }

    #[test]
    fn event_at_creation_time_is_accepted() {
        assert!(validate_event_date(created(), &application()).is_ok());
    }

    #[test]
    fn application_dates_are_reported_per_field() {
        let mut app = application();
        app.submitted_at = Some(created() - Duration::hours(2));
        app.interview_date = Some(created() - Duration::days(3));
        app.confirmed_at = Some(created() + Duration::days(1));

        let errors = validate_application_dates(&app).unwrap_err();
        let fields = errors.field_errors();

        assert!(fields.contains_key("submitted_at"));
        assert!(fields.contains_key("interview_date"));
        assert!(!fields.contains_key("confirmed_at"));
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn clamp_raises_only_early_values() {
        let later = created() + Duration::days(5);
        let mut app = application();
        app.rejected_at = Some(created() - Duration::days(10));
        app.responded_at = Some(later);

        let clamped = clamp_dates(&mut app);

        assert_eq!(clamped, vec!["rejected_at"]);
        assert_eq!(app.rejected_at, Some(created()));
        assert_eq!(app.responded_at, Some(later));
        assert_eq!(app.submitted_at, None);
        assert!(validate_application_dates(&app).is_ok());
    }

    #[test]
    fn resolve_prefers_the_logged_event() {
        let logged = created() + Duration::days(2);
        let log = log_with(EventKind::ResumeSent, logged);

        let resolved = resolve_for_kind(
            &application(),
            &log,
            EventKind::ResumeSent,
            Some(created() + Duration::days(7)),
            created() + Duration::days(9),
        );

        assert_eq!(resolved, logged);
    }

    #[test]
    fn resolve_clamps_a_logged_event_that_predates_creation() {
        let log = log_with(EventKind::RejectionReceived, created() - Duration::days(1));

        let resolved = resolve_for_kind(
            &application(),
            &log,
            EventKind::RejectionReceived,
            None,
            created() + Duration::days(9),
        );

        assert_eq!(resolved, created());
    }

    #[test]
    fn resolve_falls_back_then_uses_now() {
        let now = created() + Duration::days(9);
        let fallback = created() + Duration::days(1);
        let empty = EventLog::default();
        let app = application();

        assert_eq!(
            resolve_for_kind(&app, &empty, EventKind::ConfirmationReceived, Some(fallback), now),
            fallback
        );
        assert_eq!(
            resolve_for_kind(
                &app,
                &empty,
                EventKind::ConfirmationReceived,
                Some(created() - Duration::days(1)),
                now
            ),
            now
        );
        assert_eq!(
            resolve_for_kind(
                &app,
                &empty,
                EventKind::ConfirmationReceived,
                None,
                created() - Duration::days(4)
            ),
            created()
        );
    }
}
