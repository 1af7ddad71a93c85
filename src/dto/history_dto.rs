use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::TrackedField;
use crate::models::history::HistoryEntry;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntryResponse {
    pub id: i64,
    pub field_name: String,
    pub field_label: String,
    pub old_value: String,
    pub new_value: String,
    pub old_display: Option<String>,
    pub new_display: Option<String>,
    pub actor_id: Option<Uuid>,
    pub recorded_at: DateTime<Utc>,
}

impl HistoryEntryResponse {
    /// Renders an entry for display. `categories` maps ids to names.
    pub fn render(entry: HistoryEntry, categories: &HashMap<i64, String>) -> Self {
        let lookup = |id: i64| categories.get(&id).cloned();
        let field = entry.field_name.parse::<TrackedField>().ok();

        let (field_label, old_display, new_display) = match field {
            Some(field) => (
                field.label().to_string(),
                field.display(&entry.old_value, lookup),
                field.display(&entry.new_value, lookup),
            ),
            None => (
                entry.field_name.replace('_', " "),
                Some(entry.old_value.clone()).filter(|v| !v.is_empty()),
                Some(entry.new_value.clone()).filter(|v| !v.is_empty()),
            ),
        };

        Self {
            id: entry.id,
            field_name: entry.field_name,
            field_label,
            old_value: entry.old_value,
            new_value: entry.new_value,
            old_display,
            new_display,
            actor_id: entry.actor_id,
            recorded_at: entry.recorded_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryListResponse {
    pub items: Vec<HistoryEntryResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(field_name: &str, old_value: &str, new_value: &str) -> HistoryEntry {
        HistoryEntry {
            id: 1,
            application_id: Uuid::nil(),
            field_name: field_name.to_string(),
            old_value: old_value.to_string(),
            new_value: new_value.to_string(),
            actor_id: None,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn category_changes_show_names() {
        let categories = HashMap::from([(2, "Data".to_string())]);

        let rendered = HistoryEntryResponse::render(entry("category", "", "2"), &categories);

        assert_eq!(rendered.field_label, "Category");
        assert_eq!(rendered.old_display, None);
        assert_eq!(rendered.new_display.as_deref(), Some("Data"));
    }

    #[test]
    fn flag_changes_show_yes_and_no() {
        let rendered =
            HistoryEntryResponse::render(entry("confirmed", "false", "true"), &HashMap::new());

        assert_eq!(rendered.field_label, "Application Confirmed");
        assert_eq!(rendered.old_display.as_deref(), Some("No"));
        assert_eq!(rendered.new_display.as_deref(), Some("Yes"));
    }
}
