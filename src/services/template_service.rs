use serde_json::{Map, Value};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::dto::application_dto::CreateApplicationPayload;
use crate::dto::template_dto::{CreateTemplatePayload, UpdateTemplatePayload};
use crate::error::{Error, Result};
use crate::models::template::ApplicationTemplate;

const TEMPLATE_COLUMNS: &str =
    "id, user_id, name, title, employer, description, created_at, updated_at";

#[derive(Clone)]
pub struct TemplateService {
    pool: PgPool,
}

impl TemplateService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<ApplicationTemplate>> {
        let sql = format!(
            "SELECT {TEMPLATE_COLUMNS} FROM application_templates \
             WHERE user_id = $1 ORDER BY updated_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, ApplicationTemplate>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn get(&self, user_id: Uuid, id: i64) -> Result<ApplicationTemplate> {
        let sql = format!(
            "SELECT {TEMPLATE_COLUMNS} FROM application_templates WHERE id = $1 AND user_id = $2"
        );
        sqlx::query_as::<_, ApplicationTemplate>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Template not found".to_string()))
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        payload: CreateTemplatePayload,
    ) -> Result<ApplicationTemplate> {
        let sql = format!(
            "INSERT INTO application_templates (user_id, name, title, employer, description) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {TEMPLATE_COLUMNS}"
        );
        let template = sqlx::query_as::<_, ApplicationTemplate>(&sql)
            .bind(user_id)
            .bind(payload.name.trim())
            .bind(payload.title.as_deref().map(str::trim).unwrap_or_default())
            .bind(payload.employer.as_deref().map(str::trim).unwrap_or_default())
            .bind(payload.description.unwrap_or_default())
            .fetch_one(&self.pool)
            .await?;

        info!(template_id = template.id, %user_id, "template created");
        Ok(template)
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        id: i64,
        payload: UpdateTemplatePayload,
    ) -> Result<ApplicationTemplate> {
        let mut template = self.get(user_id, id).await?;
        payload.apply(&mut template);

        let sql = format!(
            "UPDATE application_templates SET name = $3, title = $4, employer = $5, \
             description = $6, updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 RETURNING {TEMPLATE_COLUMNS}"
        );
        sqlx::query_as::<_, ApplicationTemplate>(&sql)
            .bind(id)
            .bind(user_id)
            .bind(&template.name)
            .bind(&template.title)
            .bind(&template.employer)
            .bind(&template.description)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Template not found".to_string()))
    }

    pub async fn delete(&self, user_id: Uuid, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM application_templates WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(Error::NotFound("Template not found".to_string()));
        }
        Ok(())
    }
}

/// Builds a create payload from `overrides`, taking title, employer and
/// description from the template wherever the overrides leave them blank.
pub fn prefill(template: &ApplicationTemplate, overrides: Value) -> Result<CreateApplicationPayload> {
    let mut fields = match overrides {
        Value::Null => Map::new(),
        Value::Object(map) => map,
        _ => {
            return Err(Error::BadRequest(
                "Template overrides must be a JSON object".to_string(),
            ))
        }
    };

    for (key, stored) in [
        ("title", &template.title),
        ("employer", &template.employer),
        ("description", &template.description),
    ] {
        let blank = match fields.get(key) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        };
        if blank && !stored.is_empty() {
            fields.insert(key.to_string(), Value::String(stored.clone()));
        }
    }

    Ok(serde_json::from_value(Value::Object(fields))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use validator::Validate;

    fn template() -> ApplicationTemplate {
        ApplicationTemplate {
            id: 1,
            user_id: Uuid::new_v4(),
            name: "Backend roles".to_string(),
            title: "Backend Engineer".to_string(),
            employer: "Acme".to_string(),
            description: "Rust, Postgres".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn blank_fields_come_from_the_template() {
        let payload = prefill(&template(), json!({ "title": "  ", "priority": "high" })).unwrap();
        assert_eq!(payload.title, "Backend Engineer");
        assert_eq!(payload.employer, "Acme");
        assert_eq!(payload.description.as_deref(), Some("Rust, Postgres"));
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn sent_fields_win_over_the_template() {
        let payload = prefill(&template(), json!({ "employer": "Globex" })).unwrap();
        assert_eq!(payload.title, "Backend Engineer");
        assert_eq!(payload.employer, "Globex");
    }

    #[test]
    fn empty_template_fields_leave_the_payload_invalid() {
        let mut empty = template();
        empty.employer.clear();
        assert!(prefill(&empty, Value::Null).is_err());
    }

    #[test]
    fn non_object_overrides_are_rejected() {
        assert!(matches!(
            prefill(&template(), json!([1, 2])),
            Err(Error::BadRequest(_))
        ));
    }
}
