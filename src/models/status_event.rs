use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

use super::application::{ApplicationStatus, Milestone};
use super::UnknownVariant;

/// Fine-grained lifecycle transition recorded against an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ResumeSent,
    ConfirmationReceived,
    InterviewScheduled,
    InterviewPassed,
    AnotherInterviewScheduled,
    DocumentsRequested,
    RejectionReceived,
}

/// What an event of a given kind does to the aggregate: the status it
/// drives and the flags it switches on. The first flag carries the event's
/// date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventEffect {
    pub status: ApplicationStatus,
    pub milestones: &'static [Milestone],
}

impl EventEffect {
    pub fn dated_milestone(&self) -> Option<Milestone> {
        self.milestones.first().copied()
    }
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::ResumeSent,
        EventKind::ConfirmationReceived,
        EventKind::InterviewScheduled,
        EventKind::InterviewPassed,
        EventKind::AnotherInterviewScheduled,
        EventKind::DocumentsRequested,
        EventKind::RejectionReceived,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::ResumeSent => "resume_sent",
            EventKind::ConfirmationReceived => "confirmation_received",
            EventKind::InterviewScheduled => "interview_scheduled",
            EventKind::InterviewPassed => "interview_passed",
            EventKind::AnotherInterviewScheduled => "another_interview_scheduled",
            EventKind::DocumentsRequested => "documents_requested",
            EventKind::RejectionReceived => "rejection_received",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EventKind::ResumeSent => "Resume Sent",
            EventKind::ConfirmationReceived => "Confirmation of Receipt Received",
            EventKind::InterviewScheduled => "Interview Scheduled",
            EventKind::InterviewPassed => "Interview Passed",
            EventKind::AnotherInterviewScheduled => "Another Interview Scheduled",
            EventKind::DocumentsRequested => "Additional Documents Requested",
            EventKind::RejectionReceived => "Rejection Received",
        }
    }

    pub fn effect(self) -> EventEffect {
        use Milestone::*;

        match self {
            EventKind::ResumeSent => EventEffect {
                status: ApplicationStatus::Applied,
                milestones: &[Submitted],
            },
            EventKind::ConfirmationReceived => EventEffect {
                status: ApplicationStatus::Confirmed,
                milestones: &[Confirmed],
            },
            EventKind::InterviewScheduled | EventKind::AnotherInterviewScheduled => EventEffect {
                status: ApplicationStatus::InterviewScheduled,
                milestones: &[Responded, Confirmed],
            },
            EventKind::InterviewPassed => EventEffect {
                status: ApplicationStatus::InterviewPassed,
                milestones: &[Responded],
            },
            EventKind::DocumentsRequested => EventEffect {
                status: ApplicationStatus::DocumentsRequested,
                milestones: &[Responded],
            },
            EventKind::RejectionReceived => EventEffect {
                status: ApplicationStatus::Rejected,
                milestones: &[Rejected],
            },
        }
    }

    pub fn schedules_interview(self) -> bool {
        matches!(
            self,
            EventKind::InterviewScheduled | EventKind::AnotherInterviewScheduled
        )
    }
}

impl FromStr for EventKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("event kind", s))
    }
}

text_column!(EventKind);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StatusEvent {
    pub id: i64,
    pub application_id: Uuid,
    pub kind: EventKind,
    pub occurred_at: DateTime<Utc>,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

/// An event that has been validated but not yet written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStatusEvent {
    pub kind: EventKind,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub note: String,
}

impl NewStatusEvent {
    pub fn new(kind: EventKind, occurred_at: DateTime<Utc>) -> Self {
        Self {
            kind,
            occurred_at,
            note: String::new(),
        }
    }
}
