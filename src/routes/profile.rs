use axum::{
    extract::State,
    response::{IntoResponse, Json},
};
use validator::Validate;

use crate::{
    dto::profile_dto::{ProfileResponse, UpdateProfilePayload},
    error::Result,
    middleware::auth::ActingUser,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/profile",
    responses(
        (status = 200, description = "Profile of the current user", body = Json<ProfileResponse>)
    )
)]
#[axum::debug_handler]
pub async fn get_profile(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
) -> Result<impl IntoResponse> {
    let profile = state.profile_service.get_or_create(user_id).await?;
    Ok(Json(ProfileResponse::from(profile)))
}

#[utoipa::path(
    patch,
    path = "/api/profile",
    request_body = UpdateProfilePayload,
    responses(
        (status = 200, description = "Profile updated", body = Json<ProfileResponse>),
        (status = 400, description = "Invalid payload")
    )
)]
#[axum::debug_handler]
pub async fn update_profile(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Json(payload): Json<UpdateProfilePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let profile = state.profile_service.update(user_id, payload).await?;
    Ok(Json(ProfileResponse::from(profile)))
}
