use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::dto::profile_dto::UpdateProfilePayload;
use crate::error::Result;
use crate::models::profile::UserProfile;

const PROFILE_COLUMNS: &str = "user_id, first_name, last_name, email, \
    email_notifications_enabled, reminder_days_before, created_at, updated_at";

#[derive(Clone)]
pub struct ProfileService {
    pool: PgPool,
}

impl ProfileService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the stored profile, creating one with default settings on
    /// first access.
    pub async fn get_or_create(&self, user_id: Uuid) -> Result<UserProfile> {
        let sql = format!(
            "INSERT INTO user_profiles (user_id) VALUES ($1) \
             ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id \
             RETURNING {PROFILE_COLUMNS}"
        );
        let profile = sqlx::query_as::<_, UserProfile>(&sql)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(profile)
    }

    pub async fn update(&self, user_id: Uuid, payload: UpdateProfilePayload) -> Result<UserProfile> {
        let mut profile = self.get_or_create(user_id).await?;
        payload.apply(&mut profile);

        let sql = format!(
            "UPDATE user_profiles SET first_name = $2, last_name = $3, email = $4, \
             email_notifications_enabled = $5, reminder_days_before = $6, updated_at = NOW() \
             WHERE user_id = $1 RETURNING {PROFILE_COLUMNS}"
        );
        let saved = sqlx::query_as::<_, UserProfile>(&sql)
            .bind(user_id)
            .bind(&profile.first_name)
            .bind(&profile.last_name)
            .bind(&profile.email)
            .bind(profile.email_notifications_enabled)
            .bind(profile.reminder_days_before)
            .fetch_one(&self.pool)
            .await?;

        info!(%user_id, "profile updated");
        Ok(saved)
    }

    /// Every stored profile, for the reminder scan.
    pub async fn all(&self) -> Result<Vec<UserProfile>> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM user_profiles");
        let rows = sqlx::query_as::<_, UserProfile>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
