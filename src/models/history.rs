use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HistoryEntry {
    pub id: i64,
    pub application_id: Uuid,
    pub field_name: String,
    pub old_value: String,
    pub new_value: String,
    pub actor_id: Option<Uuid>,
    pub recorded_at: DateTime<Utc>,
}

/// A history row computed for a save but not yet written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewHistoryEntry {
    pub field_name: &'static str,
    pub old_value: String,
    pub new_value: String,
    pub actor_id: Option<Uuid>,
}
