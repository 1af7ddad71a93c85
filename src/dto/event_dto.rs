use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::RejectedEvent;
use crate::error::{Error, Result};
use crate::models::status_event::{EventKind, NewStatusEvent, StatusEvent};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateEventPayload {
    pub kind: EventKind,
    pub occurred_at: DateTime<Utc>,
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub note: String,
}

impl From<CreateEventPayload> for NewStatusEvent {
    fn from(value: CreateEventPayload) -> Self {
        Self {
            kind: value.kind,
            occurred_at: value.occurred_at,
            note: value.note,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEventResponse {
    pub id: i64,
    pub application_id: Uuid,
    pub kind: EventKind,
    pub kind_label: String,
    pub occurred_at: DateTime<Utc>,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

impl From<StatusEvent> for StatusEventResponse {
    fn from(value: StatusEvent) -> Self {
        Self {
            id: value.id,
            application_id: value.application_id,
            kind: value.kind,
            kind_label: value.kind.label().to_string(),
            occurred_at: value.occurred_at,
            note: value.note,
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedEventResponse {
    pub kind: EventKind,
    pub occurred_at: DateTime<Utc>,
    pub field: String,
    pub message: String,
}

impl From<RejectedEvent> for RejectedEventResponse {
    fn from(value: RejectedEvent) -> Self {
        Self {
            kind: value.event.kind,
            occurred_at: value.event.occurred_at,
            field: value.violation.field.to_string(),
            message: value.violation.message,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEventListResponse {
    pub items: Vec<StatusEventResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LatestEventQuery {
    /// Comma-separated event kinds. Every kind matches when absent.
    pub kinds: Option<String>,
}

impl LatestEventQuery {
    pub fn parse_kinds(&self) -> Result<Vec<EventKind>> {
        let Some(raw) = self.kinds.as_deref().filter(|raw| !raw.trim().is_empty()) else {
            return Ok(EventKind::ALL.to_vec());
        };

        raw.split(',')
            .map(str::trim)
            .filter(|kind| !kind.is_empty())
            .map(|kind| {
                kind.parse::<EventKind>()
                    .map_err(|e| Error::BadRequest(e.to_string()))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestEventResponse {
    pub event: Option<StatusEventResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_parse_from_a_comma_list() {
        let query = LatestEventQuery {
            kinds: Some("interview_scheduled, another_interview_scheduled".to_string()),
        };

        assert_eq!(
            query.parse_kinds().unwrap(),
            vec![
                EventKind::InterviewScheduled,
                EventKind::AnotherInterviewScheduled
            ]
        );
    }

    #[test]
    fn missing_kinds_match_everything() {
        let kinds = LatestEventQuery::default().parse_kinds().unwrap();
        assert_eq!(kinds.len(), EventKind::ALL.len());
    }

    #[test]
    fn unknown_kind_is_a_bad_request() {
        let query = LatestEventQuery {
            kinds: Some("resume_sent,offer_made".to_string()),
        };

        match query.parse_kinds() {
            Err(Error::BadRequest(message)) => assert!(message.contains("offer_made")),
            other => panic!("unexpected result: {:?}", other.map(|k| k.len())),
        }
    }
}
