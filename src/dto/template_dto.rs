use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::template::ApplicationTemplate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTemplatePayload {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 255))]
    pub title: Option<String>,
    #[validate(length(max = 255))]
    pub employer: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateTemplatePayload {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(max = 255))]
    pub title: Option<String>,
    #[validate(length(max = 255))]
    pub employer: Option<String>,
    pub description: Option<String>,
}

impl UpdateTemplatePayload {
    pub fn apply(&self, template: &mut ApplicationTemplate) {
        if let Some(name) = &self.name {
            template.name = name.trim().to_string();
        }
        if let Some(title) = &self.title {
            template.title = title.trim().to_string();
        }
        if let Some(employer) = &self.employer {
            template.employer = employer.trim().to_string();
        }
        if let Some(description) = &self.description {
            template.description = description.clone();
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateListResponse {
    pub items: Vec<ApplicationTemplate>,
}
