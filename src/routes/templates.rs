use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::Value;
use validator::Validate;

use crate::{
    dto::{
        application_dto::ApplicationDetailResponse,
        template_dto::{CreateTemplatePayload, TemplateListResponse, UpdateTemplatePayload},
    },
    error::Result,
    middleware::auth::ActingUser,
    services::template_service,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/templates",
    responses(
        (status = 200, description = "Templates of the current user, most recently edited first", body = Json<TemplateListResponse>)
    )
)]
#[axum::debug_handler]
pub async fn list_templates(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
) -> Result<impl IntoResponse> {
    let items = state.template_service.list(user_id).await?;
    Ok(Json(TemplateListResponse { items }))
}

#[utoipa::path(
    post,
    path = "/api/templates",
    request_body = CreateTemplatePayload,
    responses(
        (status = 201, description = "Template created"),
        (status = 400, description = "Invalid payload")
    )
)]
#[axum::debug_handler]
pub async fn create_template(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Json(payload): Json<CreateTemplatePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let template = state.template_service.create(user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

#[utoipa::path(
    get,
    path = "/api/templates/{id}",
    params(
        ("id" = i64, Path, description = "Template ID")
    ),
    responses(
        (status = 200, description = "Template"),
        (status = 404, description = "Template not found")
    )
)]
#[axum::debug_handler]
pub async fn get_template(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let template = state.template_service.get(user_id, id).await?;
    Ok(Json(template))
}

#[utoipa::path(
    patch,
    path = "/api/templates/{id}",
    params(
        ("id" = i64, Path, description = "Template ID")
    ),
    request_body = UpdateTemplatePayload,
    responses(
        (status = 200, description = "Template updated"),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Template not found")
    )
)]
#[axum::debug_handler]
pub async fn update_template(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTemplatePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let template = state.template_service.update(user_id, id, payload).await?;
    Ok(Json(template))
}

#[utoipa::path(
    delete,
    path = "/api/templates/{id}",
    params(
        ("id" = i64, Path, description = "Template ID")
    ),
    responses(
        (status = 204, description = "Template deleted"),
        (status = 404, description = "Template not found")
    )
)]
#[axum::debug_handler]
pub async fn delete_template(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.template_service.delete(user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Creates an application from a template. The optional body holds create
/// fields that take precedence over the template's values.
#[utoipa::path(
    post,
    path = "/api/templates/{id}/applications",
    params(
        ("id" = i64, Path, description = "Template ID")
    ),
    responses(
        (status = 201, description = "Application created", body = Json<ApplicationDetailResponse>),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Template not found")
    )
)]
#[axum::debug_handler]
pub async fn create_from_template(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<i64>,
    overrides: Option<Json<Value>>,
) -> Result<impl IntoResponse> {
    let template = state.template_service.get(user_id, id).await?;
    let overrides = overrides.map_or(Value::Null, |Json(value)| value);
    let payload = template_service::prefill(&template, overrides)?;
    payload.validate()?;
    let detail = state.application_service.create(user_id, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApplicationDetailResponse::from(detail)),
    ))
}
