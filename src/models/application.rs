use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

use super::status_event::EventKind;
use super::UnknownVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    #[default]
    NotApplied,
    Applied,
    Confirmed,
    InterviewScheduled,
    InterviewPassed,
    DocumentsRequested,
    ResponseReceived,
    Rejected,
    Accepted,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 9] = [
        ApplicationStatus::NotApplied,
        ApplicationStatus::Applied,
        ApplicationStatus::Confirmed,
        ApplicationStatus::InterviewScheduled,
        ApplicationStatus::InterviewPassed,
        ApplicationStatus::DocumentsRequested,
        ApplicationStatus::ResponseReceived,
        ApplicationStatus::Rejected,
        ApplicationStatus::Accepted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::NotApplied => "not_applied",
            ApplicationStatus::Applied => "applied",
            ApplicationStatus::Confirmed => "confirmed",
            ApplicationStatus::InterviewScheduled => "interview_scheduled",
            ApplicationStatus::InterviewPassed => "interview_passed",
            ApplicationStatus::DocumentsRequested => "documents_requested",
            ApplicationStatus::ResponseReceived => "response_received",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Accepted => "accepted",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ApplicationStatus::NotApplied => "Not Applied",
            ApplicationStatus::Applied => "Applied",
            ApplicationStatus::Confirmed => "Application Confirmed",
            ApplicationStatus::InterviewScheduled => "Interview Scheduled",
            ApplicationStatus::InterviewPassed => "Interview Passed",
            ApplicationStatus::DocumentsRequested => "Documents Requested",
            ApplicationStatus::ResponseReceived => "Response Received",
            ApplicationStatus::Rejected => "Rejected",
            ApplicationStatus::Accepted => "Accepted",
        }
    }

    /// Precedence used by the non-downgrade rule. `InterviewPassed` and
    /// `DocumentsRequested` share a rank.
    pub fn rank(self) -> u8 {
        match self {
            ApplicationStatus::NotApplied => 0,
            ApplicationStatus::Applied => 1,
            ApplicationStatus::Confirmed => 2,
            ApplicationStatus::InterviewScheduled => 3,
            ApplicationStatus::InterviewPassed | ApplicationStatus::DocumentsRequested => 4,
            ApplicationStatus::ResponseReceived => 5,
            ApplicationStatus::Rejected => 6,
            ApplicationStatus::Accepted => 7,
        }
    }

    /// Event synthesized when a user picks this status by hand.
    pub fn event_kind(self) -> Option<EventKind> {
        match self {
            ApplicationStatus::Applied => Some(EventKind::ResumeSent),
            ApplicationStatus::Confirmed => Some(EventKind::ConfirmationReceived),
            ApplicationStatus::Rejected => Some(EventKind::RejectionReceived),
            _ => None,
        }
    }
}

impl FromStr for ApplicationStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ApplicationStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("application status", s))
    }
}

text_column!(ApplicationStatus);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }
}

impl FromStr for Priority {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(UnknownVariant::new("priority", other)),
        }
    }
}

text_column!(Priority);

/// One of the four boolean progress markers kept on an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    Submitted,
    Confirmed,
    Responded,
    Rejected,
}

impl Milestone {
    pub const ALL: [Milestone; 4] = [
        Milestone::Submitted,
        Milestone::Confirmed,
        Milestone::Responded,
        Milestone::Rejected,
    ];

    /// Event kind synthesized when this flag is switched on. A response has
    /// no dedicated kind.
    pub fn event_kind(self) -> Option<EventKind> {
        match self {
            Milestone::Submitted => Some(EventKind::ResumeSent),
            Milestone::Confirmed => Some(EventKind::ConfirmationReceived),
            Milestone::Responded => None,
            Milestone::Rejected => Some(EventKind::RejectionReceived),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MilestoneState {
    pub reached: bool,
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Milestones {
    pub submitted: MilestoneState,
    pub confirmed: MilestoneState,
    pub responded: MilestoneState,
    pub rejected: MilestoneState,
}

impl Milestones {
    pub fn get(&self, milestone: Milestone) -> MilestoneState {
        match milestone {
            Milestone::Submitted => self.submitted,
            Milestone::Confirmed => self.confirmed,
            Milestone::Responded => self.responded,
            Milestone::Rejected => self.rejected,
        }
    }

    pub fn get_mut(&mut self, milestone: Milestone) -> &mut MilestoneState {
        match milestone {
            Milestone::Submitted => &mut self.submitted,
            Milestone::Confirmed => &mut self.confirmed,
            Milestone::Responded => &mut self.responded,
            Milestone::Rejected => &mut self.rejected,
        }
    }

    /// Status implied by the flags alone, first match wins. Never yields
    /// `Accepted` and never one of the interview stages.
    pub fn auto_status(&self) -> ApplicationStatus {
        if self.rejected.reached {
            ApplicationStatus::Rejected
        } else if self.responded.reached {
            ApplicationStatus::ResponseReceived
        } else if self.confirmed.reached {
            ApplicationStatus::Confirmed
        } else if self.submitted.reached {
            ApplicationStatus::Applied
        } else {
            ApplicationStatus::NotApplied
        }
    }

    /// Flags whose on/off value differs between `self` and `other`, in
    /// declaration order.
    pub fn flipped(&self, other: &Milestones) -> Vec<Milestone> {
        Milestone::ALL
            .into_iter()
            .filter(|m| self.get(*m).reached != other.get(*m).reached)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Application {
    pub id: Uuid,
    pub user_id: Uuid,
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

impl Application {
    /// A fresh, not-yet-persisted application with every tracked value at
    /// its default.
    pub fn draft(
        user_id: Uuid,
        title: impl Into<String>,
        employer: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            title: title.into(),
            employer: employer.into(),
            job_url: None,
            description: None,
            address: String::new(),
            contact_email: None,
            contact_phone: String::new(),
            company_website: None,
            category_id: None,
            priority: Priority::default(),
            work_type: None,
            source: None,
            salary_min: None,
            salary_max: None,
            salary_currency: "USD".to_string(),
            status: ApplicationStatus::NotApplied,
            submitted: false,
            submitted_at: None,
            confirmed: false,
            confirmed_at: None,
            responded: false,
            responded_at: None,
            rejected: false,
            rejected_at: None,
            interview_date: None,
            follow_up_date: None,
            application_deadline: None,
            notes: String::new(),
            created_at,
            updated_at: created_at,
        }
    }

    pub fn milestones(&self) -> Milestones {
        Milestones {
            submitted: MilestoneState {
                reached: self.submitted,
                at: self.submitted_at,
            },
            confirmed: MilestoneState {
                reached: self.confirmed,
                at: self.confirmed_at,
            },
            responded: MilestoneState {
                reached: self.responded,
                at: self.responded_at,
            },
            rejected: MilestoneState {
                reached: self.rejected,
                at: self.rejected_at,
            },
        }
    }

    pub fn set_milestones(&mut self, milestones: &Milestones) {
        self.submitted = milestones.submitted.reached;
        self.submitted_at = milestones.submitted.at;
        self.confirmed = milestones.confirmed.reached;
        self.confirmed_at = milestones.confirmed.at;
        self.responded = milestones.responded.reached;
        self.responded_at = milestones.responded.at;
        self.rejected = milestones.rejected.reached;
        self.rejected_at = milestones.rejected.at;
    }
}
