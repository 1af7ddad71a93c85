use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::reference::{Category, Tag};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateCategoryPayload {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// `#rrggbb`; defaults to the stock accent color.
    #[validate(length(equal = 7))]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTagPayload {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryListResponse {
    pub items: Vec<Category>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagListResponse {
    pub items: Vec<Tag>,
}
