//! In-memory view over the status events of a single application.
//!
//! "Latest" always means the greatest `occurred_at`; two events at the same
//! instant are ordered by id, so the most recently inserted one wins.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::date_guard::{self, DateViolation};
use crate::models::application::Application;
use crate::models::status_event::{EventKind, NewStatusEvent, StatusEvent};

#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<StatusEvent>,
}

/// Validates a proposed event against the owning application. The returned
/// value still has to be written by the caller, and the caller is
/// responsible for running the reconciler afterwards.
pub fn append(
    application: &Application,
    kind: EventKind,
    occurred_at: DateTime<Utc>,
    note: impl Into<String>,
) -> Result<NewStatusEvent, DateViolation> {
    date_guard::validate_event_date(occurred_at, application)?;
    Ok(NewStatusEvent {
        kind,
        occurred_at,
        note: note.into(),
    })
}

impl EventLog {
    pub fn new(events: Vec<StatusEvent>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[StatusEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<StatusEvent> {
        self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn latest(&self) -> Option<&StatusEvent> {
        self.events
            .iter()
            .max_by_key(|event| (event.occurred_at, event.id))
    }

    pub fn latest_of_kind(&self, kinds: &[EventKind]) -> Option<&StatusEvent> {
        self.events
            .iter()
            .filter(|event| kinds.contains(&event.kind))
            .max_by_key(|event| (event.occurred_at, event.id))
    }

    pub fn has_kind_on_day(&self, kind: EventKind, day: NaiveDate) -> bool {
        self.events
            .iter()
            .any(|event| event.kind == kind && event.occurred_at.date_naive() == day)
    }

    /// Drops every event whose id is not listed and returns the removed ids.
    pub fn delete_not_in(&mut self, keep_ids: &[i64]) -> Vec<i64> {
        let mut removed = Vec::new();
        self.events.retain(|event| {
            let keep = keep_ids.contains(&event.id);
            if !keep {
                removed.push(event.id);
            }
            keep
        });
        removed
    }

    /// Adds a not-yet-persisted event under a provisional id that sorts after
    /// every stored one, so it behaves as the newest insert.
    pub fn stage(
        &mut self,
        application_id: Uuid,
        event: &NewStatusEvent,
        now: DateTime<Utc>,
    ) -> &StatusEvent {
        let id = self.events.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        self.events.push(StatusEvent {
            id,
            application_id,
            kind: event.kind,
            occurred_at: event.occurred_at,
            note: event.note.clone(),
            created_at: now,
        });
        &self.events[self.events.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    fn event(id: i64, kind: EventKind, occurred_at: DateTime<Utc>) -> StatusEvent {
        StatusEvent {
            id,
            application_id: Uuid::nil(),
            kind,
            occurred_at,
            note: String::new(),
            created_at: occurred_at,
        }
    }

    #[test]
    fn latest_prefers_the_later_timestamp_over_insertion_order() {
        let log = EventLog::new(vec![
            event(1, EventKind::RejectionReceived, at(10, 9)),
            event(2, EventKind::ResumeSent, at(3, 9)),
        ]);

        assert_eq!(log.latest().map(|e| e.id), Some(1));
    }

    #[test]
    fn ties_on_timestamp_go_to_the_most_recent_insert() {
        let log = EventLog::new(vec![
            event(4, EventKind::ResumeSent, at(5, 12)),
            event(7, EventKind::ConfirmationReceived, at(5, 12)),
            event(6, EventKind::ResumeSent, at(5, 12)),
        ]);

        assert_eq!(log.latest().map(|e| e.id), Some(7));
        assert_eq!(
            log.latest_of_kind(&[EventKind::ResumeSent]).map(|e| e.id),
            Some(6)
        );
    }

    #[test]
    fn latest_of_kind_accepts_several_kinds() {
        let log = EventLog::new(vec![
            event(1, EventKind::InterviewScheduled, at(4, 10)),
            event(2, EventKind::AnotherInterviewScheduled, at(8, 10)),
            event(3, EventKind::RejectionReceived, at(9, 10)),
        ]);

        let found = log.latest_of_kind(&[
            EventKind::InterviewScheduled,
            EventKind::AnotherInterviewScheduled,
        ]);
        assert_eq!(found.map(|e| e.id), Some(2));
        assert!(log.latest_of_kind(&[EventKind::DocumentsRequested]).is_none());
    }

    #[test]
    fn delete_not_in_removes_everything_unlisted() {
        let mut log = EventLog::new(vec![
            event(1, EventKind::ResumeSent, at(2, 9)),
            event(2, EventKind::ConfirmationReceived, at(3, 9)),
            event(3, EventKind::InterviewScheduled, at(4, 9)),
        ]);

        let removed = log.delete_not_in(&[2]);

        assert_eq!(removed, vec![1, 3]);
        assert_eq!(log.len(), 1);
        assert_eq!(log.events()[0].kind, EventKind::ConfirmationReceived);
    }

    #[test]
    fn staged_events_sort_after_stored_ones() {
        let mut log = EventLog::new(vec![event(41, EventKind::ResumeSent, at(2, 9))]);
        let staged = NewStatusEvent::new(EventKind::ConfirmationReceived, at(2, 9));

        let id = log.stage(Uuid::nil(), &staged, at(2, 9)).id;

        assert_eq!(id, 42);
        assert_eq!(log.latest().map(|e| e.kind), Some(EventKind::ConfirmationReceived));
    }

    #[test]
    fn append_rejects_a_time_before_creation() {
        let app = Application::draft(Uuid::nil(), "Engineer", "Acme", at(10, 8));

        let err = append(&app, EventKind::ResumeSent, at(10, 8) - Duration::days(1), "")
            .unwrap_err();
        assert_eq!(err.field, "occurred_at");

        let ok = append(&app, EventKind::ResumeSent, at(11, 8), "sent by mail").unwrap();
        assert_eq!(ok.note, "sent by mail");
    }

    #[test]
    fn same_day_lookup_ignores_time_of_day() {
        let log = EventLog::new(vec![event(1, EventKind::ResumeSent, at(2, 9))]);

        assert!(log.has_kind_on_day(EventKind::ResumeSent, at(2, 23).date_naive()));
        assert!(!log.has_kind_on_day(EventKind::ResumeSent, at(3, 0).date_naive()));
        assert!(!log.has_kind_on_day(EventKind::RejectionReceived, at(2, 9).date_naive()));
    }
}
