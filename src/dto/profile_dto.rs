use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::dto::application_dto::nullable;
use crate::models::profile::UserProfile;

/// Partial update. `email: null` clears the stored address.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateProfilePayload {
    #[validate(length(max = 150))]
    pub first_name: Option<String>,
    #[validate(length(max = 150))]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[validate(email)]
    pub email: Option<Option<String>>,
    pub email_notifications_enabled: Option<bool>,
    #[validate(range(min = 1, max = 30))]
    pub reminder_days_before: Option<i32>,
}

impl UpdateProfilePayload {
    pub fn apply(&self, profile: &mut UserProfile) {
        if let Some(first_name) = &self.first_name {
            profile.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = &self.last_name {
            profile.last_name = last_name.trim().to_string();
        }
        if let Some(email) = &self.email {
            profile.email = email.clone();
        }
        if let Some(enabled) = self.email_notifications_enabled {
            profile.email_notifications_enabled = enabled;
        }
        if let Some(days) = self.reminder_days_before {
            profile.reminder_days_before = days;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub full_name: Option<String>,
}

impl From<UserProfile> for ProfileResponse {
    fn from(profile: UserProfile) -> Self {
        Self {
            full_name: profile.full_name(),
            profile,
        }
    }
}
