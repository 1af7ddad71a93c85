use std::collections::HashMap;
use std::time::Duration;

use crate::dto::reference_dto::{CreateCategoryPayload, CreateTagPayload};
use crate::error::{Error, Result};
use crate::models::reference::{Category, Tag};
use crate::utils::cache::ListCache;
use sqlx::PgPool;
use tracing::info;

const DEFAULT_COLOR: &str = "#667eea";

/// Categories and tags are shared by every user and change rarely, so reads
/// go through a cache that each write invalidates.
#[derive(Clone)]
pub struct ReferenceService {
    pool: PgPool,
    categories: ListCache<Vec<Category>>,
    tags: ListCache<Vec<Tag>>,
}

impl ReferenceService {
    pub fn new(pool: PgPool, ttl: Duration) -> Self {
        Self {
            pool,
            categories: ListCache::new(ttl),
            tags: ListCache::new(ttl),
        }
    }

    pub async fn categories(&self) -> Result<Vec<Category>> {
        let rows = self
            .categories
            .get_or_try_load(async {
                sqlx::query_as::<_, Category>(
                    "SELECT id, name, color, created_at FROM categories ORDER BY name",
                )
                .fetch_all(&self.pool)
                .await
                .map_err(Error::from)
            })
            .await?;
        Ok(rows)
    }

    pub async fn category_names(&self) -> Result<HashMap<i64, String>> {
        Ok(self
            .categories()
            .await?
            .into_iter()
            .map(|category| (category.id, category.name))
            .collect())
    }

    pub async fn tags(&self) -> Result<Vec<Tag>> {
        let rows = self
            .tags
            .get_or_try_load(async {
                sqlx::query_as::<_, Tag>("SELECT id, name, created_at FROM tags ORDER BY name")
                    .fetch_all(&self.pool)
                    .await
                    .map_err(Error::from)
            })
            .await?;
        Ok(rows)
    }

    pub async fn create_category(&self, payload: CreateCategoryPayload) -> Result<Category> {
        let color = payload.color.unwrap_or_else(|| DEFAULT_COLOR.to_string());
        if !is_hex_color(&color) {
            return Err(Error::BadRequest(format!("Invalid color: {}", color)));
        }

        let row = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (name, color) VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET color = EXCLUDED.color
            RETURNING id, name, color, created_at
            "#,
        )
        .bind(payload.name.trim())
        .bind(&color)
        .fetch_one(&self.pool)
        .await?;

        self.categories.invalidate();
        info!(category_id = row.id, "category saved");
        Ok(row)
    }

    pub async fn delete_category(&self, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(Error::NotFound("Category not found".to_string()));
        }
        self.categories.invalidate();
        Ok(())
    }

    pub async fn create_tag(&self, payload: CreateTagPayload) -> Result<Tag> {
        let row = sqlx::query_as::<_, Tag>(
            r#"
            INSERT INTO tags (name) VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, name, created_at
            "#,
        )
        .bind(payload.name.trim())
        .fetch_one(&self.pool)
        .await?;

        self.tags.invalidate();
        info!(tag_id = row.id, "tag saved");
        Ok(row)
    }

    pub async fn delete_tag(&self, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(Error::NotFound("Tag not found".to_string()));
        }
        self.tags.invalidate();
        Ok(())
    }
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}
