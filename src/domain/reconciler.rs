//! Decides the final status, milestone flags and synthesized events for one
//! save of an application.
//!
//! The inputs of a save are reduced to a single [`Signal`], picked by an
//! ordered list of rules (highest priority first):
//!
//! 1. valid events proposed in this save,
//! 2. the latest stored event,
//! 3. a status chosen by hand,
//! 4. flags switched on or off,
//! 5. nothing at all.
//!
//! Rule 2 never overrides an `accepted` status, so a hand-picked acceptance
//! survives a save on an application that already has events. It also stands
//! aside whenever the save proposed events, even if the date guard dropped
//! all of them.
//!
//! Flags switched on get their mapped event whichever rule fired.
//!
//! Everything here is pure: the caller loads the event log, persists the
//! returned events and writes the application back.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::domain::date_guard::{self, DateViolation};
use crate::domain::event_log::EventLog;
use crate::models::application::{Application, ApplicationStatus, Milestone, Milestones};
use crate::models::status_event::{EventKind, NewStatusEvent, StatusEvent};

/// What a save carries besides the plain field values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveRequest {
    pub new_events: Vec<NewStatusEvent>,
    pub changed_flags: Vec<Milestone>,
    pub manual_status: Option<ApplicationStatus>,
}

impl SaveRequest {
    /// Builds the request from the stored row and the row as edited by the
    /// user, before any reconciliation has touched it.
    pub fn between(
        previous: &Application,
        edited: &Application,
        new_events: Vec<NewStatusEvent>,
    ) -> Self {
        Self {
            new_events,
            changed_flags: previous.milestones().flipped(&edited.milestones()),
            manual_status: (edited.status != previous.status).then_some(edited.status),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    NewEvent(Vec<NewStatusEvent>),
    PreexistingLatestEvent(StatusEvent),
    ManualStatusChange(ApplicationStatus),
    FlagChange(Vec<Milestone>),
    NoChange,
}

impl Signal {
    pub fn name(&self) -> &'static str {
        match self {
            Signal::NewEvent(_) => "new_event",
            Signal::PreexistingLatestEvent(_) => "preexisting_latest_event",
            Signal::ManualStatusChange(_) => "manual_status_change",
            Signal::FlagChange(_) => "flag_change",
            Signal::NoChange => "no_change",
        }
    }
}

/// A proposed event that failed the date guard and was left out.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedEvent {
    pub event: NewStatusEvent,
    pub violation: DateViolation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub signal: Signal,
    pub status: ApplicationStatus,
    pub milestones: Milestones,
    pub interview_date: Option<DateTime<Utc>>,
    /// User-proposed events that passed the date guard, in request order.
    pub appended: Vec<NewStatusEvent>,
    /// Events created on behalf of the user for a manual status or a flag
    /// switched on.
    pub synthesized: Vec<NewStatusEvent>,
    pub rejected: Vec<RejectedEvent>,
}

impl Reconciliation {
    /// Every event that still has to be written, proposals first.
    pub fn events_to_insert(&self) -> impl Iterator<Item = &NewStatusEvent> {
        self.appended.iter().chain(self.synthesized.iter())
    }

    pub fn apply_to(&self, application: &mut Application) {
        application.status = self.status;
        application.set_milestones(&self.milestones);
        application.interview_date = self.interview_date;
    }
}

struct Working<'a> {
    application: &'a Application,
    log: EventLog,
    status: ApplicationStatus,
    milestones: Milestones,
    interview_date: Option<DateTime<Utc>>,
    synthesized: Vec<NewStatusEvent>,
    now: DateTime<Utc>,
}

impl Working<'_> {
    fn resolve(&self, kind: EventKind, fallback: Option<DateTime<Utc>>) -> DateTime<Utc> {
        date_guard::resolve_for_kind(self.application, &self.log, kind, fallback, self.now)
    }

    /// Sets status and flags the way an event of `kind` dictates.
    fn drive(&mut self, kind: EventKind) {
        let effect = kind.effect();
        self.status = effect.status;

        for milestone in effect.milestones {
            self.milestones.get_mut(*milestone).reached = true;
        }

        if let Some(dated) = effect.dated_milestone() {
            let current = self.milestones.get(dated).at;
            self.milestones.get_mut(dated).at = Some(self.resolve(kind, current));
        }
    }

    /// Stages an event unless one of the same kind already sits on that day.
    fn synthesize(&mut self, kind: EventKind, fallback: Option<DateTime<Utc>>) {
        let occurred_at = self.resolve(kind, fallback);
        if self.log.has_kind_on_day(kind, occurred_at.date_naive()) {
            return;
        }

        let event = NewStatusEvent::new(kind, occurred_at);
        self.log.stage(self.application.id, &event, self.now);
        self.synthesized.push(event);
    }

    /// Stages the mapped event of every flag in `flags` the user switched on.
    fn synthesize_switched_on(&mut self, flags: &[Milestone]) {
        let edited = self.application.milestones();
        for milestone in flags {
            if !edited.get(*milestone).reached {
                continue;
            }
            if let Some(kind) = milestone.event_kind() {
                let at = self.milestones.get(*milestone).at;
                self.synthesize(kind, at);
            }
        }
    }

    fn finish(
        mut self,
        signal: Signal,
        appended: Vec<NewStatusEvent>,
        rejected: Vec<RejectedEvent>,
    ) -> Reconciliation {
        for milestone in Milestone::ALL {
            let state = self.milestones.get(milestone);
            if state.reached && state.at.is_none() {
                let at = match milestone.event_kind() {
                    Some(kind) => self.resolve(kind, None),
                    None => self.application.created_at.max(self.now),
                };
                self.milestones.get_mut(milestone).at = Some(at);
            }
        }

        Reconciliation {
            signal,
            status: self.status,
            milestones: self.milestones,
            interview_date: self.interview_date,
            appended,
            synthesized: self.synthesized,
            rejected,
        }
    }
}

/// Runs the rule evaluator for one save.
///
/// `application` is the row as edited by the user and `log` holds the events
/// stored for it once any deletions requested in the same save are applied.
pub fn reconcile_on_save(
    application: &Application,
    log: &EventLog,
    request: &SaveRequest,
    now: DateTime<Utc>,
) -> Reconciliation {
    let mut working = Working {
        application,
        log: log.clone(),
        status: application.status,
        milestones: application.milestones(),
        interview_date: application.interview_date,
        synthesized: Vec::new(),
        now,
    };

    for milestone in &request.changed_flags {
        let state = working.milestones.get_mut(*milestone);
        if state.reached && state.at.is_none() {
            state.at = Some(now);
        }
    }

    let mut appended = Vec::new();
    let mut rejected = Vec::new();
    for proposal in &request.new_events {
        match date_guard::validate_event_date(proposal.occurred_at, application) {
            Ok(()) => {
                working.log.stage(application.id, proposal, now);
                appended.push(proposal.clone());
            }
            Err(violation) => {
                warn!(
                    application_id = %application.id,
                    kind = %proposal.kind,
                    "status event rejected: {}",
                    violation
                );
                rejected.push(RejectedEvent {
                    event: proposal.clone(),
                    violation,
                });
            }
        }
    }

    let signal = select_signal(application, log, request, &appended);

    match &signal {
        Signal::NewEvent(events) => {
            for event in events {
                working.drive(event.kind);
                if event.kind.schedules_interview() && working.interview_date.is_none() {
                    working.interview_date = Some(event.occurred_at);
                }
            }
            working.synthesize_switched_on(&request.changed_flags);
        }
        Signal::PreexistingLatestEvent(event) => {
            working.synthesize_switched_on(&request.changed_flags);
            // A synthesized event may now be the newest one.
            let kind = working.log.latest().map_or(event.kind, |latest| latest.kind);
            working.drive(kind);
        }
        Signal::ManualStatusChange(status) => {
            working.status = *status;
            if let Some(kind) = status.event_kind() {
                let dated = kind.effect().dated_milestone();
                let current = dated.and_then(|m| working.milestones.get(m).at);
                let at = working.resolve(kind, current);
                if let Some(milestone) = dated {
                    let state = working.milestones.get_mut(milestone);
                    state.reached = true;
                    state.at = Some(at);
                }
                working.synthesize(kind, Some(at));
            }
            working.synthesize_switched_on(&request.changed_flags);
        }
        Signal::FlagChange(flags) => {
            let auto = working.milestones.auto_status();
            if auto.rank() >= working.status.rank()
                || working.status == ApplicationStatus::NotApplied
            {
                working.status = auto;
            }
            working.synthesize_switched_on(flags);
        }
        Signal::NoChange => {
            if working.status == ApplicationStatus::NotApplied {
                working.status = working.milestones.auto_status();
            }
        }
    }

    working.finish(signal, appended, rejected)
}

fn select_signal(
    application: &Application,
    log: &EventLog,
    request: &SaveRequest,
    appended: &[NewStatusEvent],
) -> Signal {
    if !appended.is_empty() {
        return Signal::NewEvent(appended.to_vec());
    }

    let accepted = application.status == ApplicationStatus::Accepted;
    let proposed = !request.new_events.is_empty();
    if let Some(latest) = log.latest().filter(|_| !accepted && !proposed) {
        return Signal::PreexistingLatestEvent(latest.clone());
    }

    if let Some(status) = request.manual_status {
        return Signal::ManualStatusChange(status);
    }

    if !request.changed_flags.is_empty() {
        return Signal::FlagChange(request.changed_flags.clone());
    }

    Signal::NoChange
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap()
    }

    fn day(n: i64) -> DateTime<Utc> {
        t0() + Duration::days(n)
    }

    fn application() -> Application {
        Application::draft(Uuid::nil(), "Data Engineer", "Globex", t0())
    }

    fn stored(id: i64, kind: EventKind, occurred_at: DateTime<Utc>) -> StatusEvent {
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
    fn rejection_event_wins_over_everything() {
        let mut app = application();
        app.status = ApplicationStatus::InterviewPassed;
        let request = SaveRequest {
            new_events: vec![NewStatusEvent::new(EventKind::RejectionReceived, day(9))],
            changed_flags: vec![Milestone::Submitted],
            manual_status: Some(ApplicationStatus::Confirmed),
        };

        let result = reconcile_on_save(&app, &EventLog::default(), &request, day(20));

        assert_eq!(result.signal.name(), "new_event");
        assert_eq!(result.status, ApplicationStatus::Rejected);
        assert!(result.milestones.rejected.reached);
        assert_eq!(result.milestones.rejected.at, Some(day(9)));
        assert_eq!(result.appended.len(), 1);
        assert!(result.synthesized.is_empty());
    }

    #[test]
    fn several_new_events_apply_in_order() {
        let request = SaveRequest {
            new_events: vec![
                NewStatusEvent::new(EventKind::ResumeSent, day(1)),
                NewStatusEvent::new(EventKind::InterviewScheduled, day(6)),
            ],
            ..SaveRequest::default()
        };

        let result = reconcile_on_save(&application(), &EventLog::default(), &request, day(7));

        assert_eq!(result.status, ApplicationStatus::InterviewScheduled);
        assert_eq!(result.milestones.submitted.at, Some(day(1)));
        assert_eq!(result.milestones.responded.at, Some(day(6)));
        assert!(result.milestones.confirmed.reached);
        assert_eq!(result.interview_date, Some(day(6)));
    }

    #[test]
    fn interview_event_keeps_an_existing_interview_date() {
        let mut app = application();
        app.interview_date = Some(day(12));
        let request = SaveRequest {
            new_events: vec![NewStatusEvent::new(EventKind::AnotherInterviewScheduled, day(5))],
            ..SaveRequest::default()
        };

        let result = reconcile_on_save(&app, &EventLog::default(), &request, day(5));

        assert_eq!(result.interview_date, Some(day(12)));
    }

    #[test]
    fn invalid_proposal_is_dropped_and_the_rest_still_applies() {
        let request = SaveRequest {
            new_events: vec![NewStatusEvent::new(EventKind::ResumeSent, t0() - Duration::days(1))],
            ..SaveRequest::default()
        };

        let result = reconcile_on_save(&application(), &EventLog::default(), &request, day(1));

        assert_eq!(result.rejected.len(), 1);
        assert!(result.rejected[0].violation.message.contains("01.01.2024 08:00"));
        assert!(result.appended.is_empty());
        assert_eq!(result.signal, Signal::NoChange);
        assert_eq!(result.status, ApplicationStatus::NotApplied);
    }

    #[test]
    fn stored_latest_event_re_drives_flags() {
        let mut app = application();
        app.status = ApplicationStatus::Applied;
        let log = EventLog::new(vec![
            stored(1, EventKind::ResumeSent, day(1)),
            stored(2, EventKind::DocumentsRequested, day(4)),
        ]);

        let result = reconcile_on_save(&app, &log, &SaveRequest::default(), day(10));

        assert_eq!(result.signal.name(), "preexisting_latest_event");
        assert_eq!(result.status, ApplicationStatus::DocumentsRequested);
        assert!(result.milestones.responded.reached);
        assert_eq!(result.milestones.responded.at, Some(day(4)));
    }

    #[test]
    fn stored_events_outrank_a_manual_change() {
        let mut app = application();
        app.status = ApplicationStatus::ResponseReceived;
        let log = EventLog::new(vec![stored(1, EventKind::ConfirmationReceived, day(2))]);
        let request = SaveRequest {
            manual_status: Some(ApplicationStatus::ResponseReceived),
            ..SaveRequest::default()
        };

        let result = reconcile_on_save(&app, &log, &request, day(10));

        assert_eq!(result.status, ApplicationStatus::Confirmed);
    }

    #[test]
    fn accepted_survives_stored_events() {
        let mut app = application();
        app.status = ApplicationStatus::Accepted;
        let log = EventLog::new(vec![stored(1, EventKind::InterviewPassed, day(3))]);
        let request = SaveRequest {
            manual_status: Some(ApplicationStatus::Accepted),
            ..SaveRequest::default()
        };

        let result = reconcile_on_save(&app, &log, &request, day(10));

        assert_eq!(result.signal, Signal::ManualStatusChange(ApplicationStatus::Accepted));
        assert_eq!(result.status, ApplicationStatus::Accepted);
        assert!(result.synthesized.is_empty());
    }

    #[test]
    fn manual_status_sets_its_flag_and_synthesizes_an_event() {
        let mut app = application();
        app.status = ApplicationStatus::Applied;
        let request = SaveRequest {
            manual_status: Some(ApplicationStatus::Applied),
            ..SaveRequest::default()
        };

        let result = reconcile_on_save(&app, &EventLog::default(), &request, day(3));

        assert_eq!(result.status, ApplicationStatus::Applied);
        assert!(result.milestones.submitted.reached);
        assert_eq!(result.milestones.submitted.at, Some(day(3)));
        assert_eq!(result.synthesized, vec![NewStatusEvent::new(EventKind::ResumeSent, day(3))]);
    }

    #[test]
    fn manual_status_without_event_mapping_synthesizes_nothing() {
        let mut app = application();
        app.status = ApplicationStatus::ResponseReceived;
        let request = SaveRequest {
            manual_status: Some(ApplicationStatus::ResponseReceived),
            ..SaveRequest::default()
        };

        let result = reconcile_on_save(&app, &EventLog::default(), &request, day(3));

        assert_eq!(result.status, ApplicationStatus::ResponseReceived);
        assert!(result.synthesized.is_empty());
        assert_eq!(result.milestones, Milestones::default());
    }

    #[test]
    fn flag_edits_never_downgrade() {
        let mut app = application();
        app.status = ApplicationStatus::ResponseReceived;
        app.submitted = true;
        let request = SaveRequest {
            changed_flags: vec![Milestone::Submitted],
            ..SaveRequest::default()
        };

        let result = reconcile_on_save(&app, &EventLog::default(), &request, day(2));

        assert_eq!(result.status, ApplicationStatus::ResponseReceived);
        assert_eq!(result.milestones.submitted.at, Some(day(2)));
        assert_eq!(result.synthesized.len(), 1);
    }

    #[test]
    fn two_flags_from_scratch_reach_confirmed() {
        let mut app = application();
        app.submitted = true;
        app.confirmed = true;
        let request = SaveRequest {
            changed_flags: vec![Milestone::Submitted, Milestone::Confirmed],
            ..SaveRequest::default()
        };

        let result = reconcile_on_save(&app, &EventLog::default(), &request, day(1));

        assert_eq!(result.status, ApplicationStatus::Confirmed);
        let kinds: Vec<_> = result.synthesized.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::ResumeSent, EventKind::ConfirmationReceived]);
        assert!(result.synthesized.iter().all(|e| e.occurred_at == day(1)));
    }

    #[test]
    fn responded_flag_has_no_event() {
        let mut app = application();
        app.responded = true;
        app.responded_at = Some(day(2));
        let request = SaveRequest {
            changed_flags: vec![Milestone::Responded],
            ..SaveRequest::default()
        };

        let result = reconcile_on_save(&app, &EventLog::default(), &request, day(3));

        assert_eq!(result.status, ApplicationStatus::ResponseReceived);
        assert!(result.synthesized.is_empty());
        assert_eq!(result.milestones.responded.at, Some(day(2)));
    }

    #[test]
    fn switching_a_flag_off_creates_no_event() {
        let mut app = application();
        app.status = ApplicationStatus::Confirmed;
        app.submitted = true;
        app.submitted_at = Some(day(1));
        let request = SaveRequest {
            changed_flags: vec![Milestone::Confirmed],
            ..SaveRequest::default()
        };

        let result = reconcile_on_save(&app, &EventLog::default(), &request, day(3));

        assert!(result.synthesized.is_empty());
        assert_eq!(result.status, ApplicationStatus::Confirmed);
    }

    #[test]
    fn no_change_fills_in_an_unset_status() {
        let mut app = application();
        app.submitted = true;
        app.submitted_at = Some(day(1));

        let result = reconcile_on_save(&app, &EventLog::default(), &SaveRequest::default(), day(3));

        assert_eq!(result.signal, Signal::NoChange);
        assert_eq!(result.status, ApplicationStatus::Applied);
    }

    #[test]
    fn reconciling_twice_is_stable() {
        let mut app = application();
        app.submitted = true;
        let request = SaveRequest {
            changed_flags: vec![Milestone::Submitted],
            ..SaveRequest::default()
        };
        let first = reconcile_on_save(&app, &EventLog::default(), &request, day(2));
        first.apply_to(&mut app);

        let mut log = EventLog::default();
        for event in first.events_to_insert() {
            log.stage(app.id, event, day(2));
        }
        let second = reconcile_on_save(&app, &log, &request, day(2));

        assert_eq!(second.status, first.status);
        assert_eq!(second.milestones, first.milestones);
        assert!(second.synthesized.is_empty());
    }

    #[test]
    fn synthesized_events_skip_a_kind_already_logged_that_day() {
        let mut app = application();
        app.status = ApplicationStatus::Accepted;
        app.rejected = true;
        let log = EventLog::new(vec![stored(5, EventKind::RejectionReceived, day(4))]);
        let request = SaveRequest {
            changed_flags: vec![Milestone::Rejected],
            ..SaveRequest::default()
        };

        let result = reconcile_on_save(&app, &log, &request, day(4));

        assert_eq!(result.signal.name(), "flag_change");
        assert!(result.synthesized.is_empty());
        assert_eq!(result.status, ApplicationStatus::Accepted);
        assert_eq!(result.milestones.rejected.at, Some(day(4)));
    }

    #[test]
    fn flag_switched_on_beside_stored_events_gets_its_event() {
        let mut app = application();
        app.status = ApplicationStatus::Applied;
        app.submitted = true;
        app.submitted_at = Some(day(1));
        app.confirmed = true;
        let log = EventLog::new(vec![stored(1, EventKind::ResumeSent, day(1))]);
        let request = SaveRequest {
            changed_flags: vec![Milestone::Confirmed],
            ..SaveRequest::default()
        };

        let first = reconcile_on_save(&app, &log, &request, day(5));

        assert_eq!(first.signal.name(), "preexisting_latest_event");
        assert_eq!(
            first.synthesized,
            vec![NewStatusEvent::new(EventKind::ConfirmationReceived, day(5))]
        );
        assert_eq!(first.status, ApplicationStatus::Confirmed);
        assert_eq!(first.milestones.confirmed.at, Some(day(5)));

        first.apply_to(&mut app);
        let mut log = log;
        for event in first.events_to_insert() {
            log.stage(app.id, event, day(5));
        }
        let second = reconcile_on_save(&app, &log, &SaveRequest::default(), day(6));

        assert_eq!(second.status, ApplicationStatus::Confirmed);
        assert!(second.synthesized.is_empty());
    }

    #[test]
    fn flag_switched_on_with_a_new_event_gets_its_event_too() {
        let mut app = application();
        app.submitted = true;
        app.submitted_at = Some(day(1));
        let request = SaveRequest {
            new_events: vec![NewStatusEvent::new(EventKind::InterviewScheduled, day(2))],
            changed_flags: vec![Milestone::Submitted],
            ..SaveRequest::default()
        };

        let result = reconcile_on_save(&app, &EventLog::default(), &request, day(3));

        assert_eq!(result.status, ApplicationStatus::InterviewScheduled);
        assert_eq!(
            result.synthesized,
            vec![NewStatusEvent::new(EventKind::ResumeSent, day(1))]
        );
    }

    #[test]
    fn dropped_proposals_leave_a_manual_change_in_force() {
        let mut app = application();
        app.status = ApplicationStatus::Rejected;
        let log = EventLog::new(vec![stored(1, EventKind::ResumeSent, day(1))]);
        let request = SaveRequest {
            new_events: vec![NewStatusEvent::new(
                EventKind::InterviewScheduled,
                t0() - Duration::days(3),
            )],
            manual_status: Some(ApplicationStatus::Rejected),
            ..SaveRequest::default()
        };

        let result = reconcile_on_save(&app, &log, &request, day(4));

        assert_eq!(result.rejected.len(), 1);
        assert_eq!(result.signal, Signal::ManualStatusChange(ApplicationStatus::Rejected));
        assert_eq!(result.status, ApplicationStatus::Rejected);
        assert!(result.milestones.rejected.reached);
    }

    #[test]
    fn between_detects_flag_flips_and_status_edits() {
        let previous = application();
        let mut edited = previous.clone();
        edited.rejected = true;
        edited.status = ApplicationStatus::Rejected;

        let request = SaveRequest::between(&previous, &edited, Vec::new());

        assert_eq!(request.changed_flags, vec![Milestone::Rejected]);
        assert_eq!(request.manual_status, Some(ApplicationStatus::Rejected));
    }
}
