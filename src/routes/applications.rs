use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::application_dto::{
        ApplicationDetailResponse, ApplicationListQuery, ApplicationListResponse,
        ApplicationStatsResponse, CreateApplicationPayload, UpdateApplicationPayload,
    },
    error::Result,
    middleware::auth::ActingUser,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/applications",
    params(
        ("page" = Option<i64>, Query, description = "Page number"),
        ("per_page" = Option<i64>, Query, description = "Items per page (max 100)"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("priority" = Option<String>, Query, description = "Filter by priority"),
        ("category_id" = Option<i64>, Query, description = "Filter by category"),
        ("work_type" = Option<String>, Query, description = "Filter by work type"),
        ("source" = Option<String>, Query, description = "Filter by source"),
        ("tag_id" = Option<i64>, Query, description = "Only applications carrying this tag"),
        ("submitted" = Option<bool>, Query, description = "Filter by the submitted flag"),
        ("responded" = Option<bool>, Query, description = "Filter by the responded flag"),
        ("rejected" = Option<bool>, Query, description = "Filter by the rejected flag"),
        ("search" = Option<String>, Query, description = "Search title, company, description, address, notes and contacts"),
        ("sort" = Option<String>, Query, description = "created_at, title, employer or priority; prefix with - for descending (default -created_at)")
    ),
    responses(
        (status = 200, description = "Applications of the current user", body = Json<ApplicationListResponse>)
    )
)]
#[axum::debug_handler]
pub async fn list_applications(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Query(query): Query<ApplicationListQuery>,
) -> Result<impl IntoResponse> {
    let list = state.application_service.list(user_id, query).await?;
    Ok(Json(ApplicationListResponse::from(list)))
}

#[utoipa::path(
    post,
    path = "/api/applications",
    request_body = CreateApplicationPayload,
    responses(
        (status = 201, description = "Application created", body = Json<ApplicationDetailResponse>),
        (status = 400, description = "Invalid payload")
    )
)]
#[axum::debug_handler]
pub async fn create_application(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Json(payload): Json<CreateApplicationPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let detail = state.application_service.create(user_id, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApplicationDetailResponse::from(detail)),
    ))
}

#[utoipa::path(
    get,
    path = "/api/applications/{id}",
    params(
        ("id" = Uuid, Path, description = "Application ID")
    ),
    responses(
        (status = 200, description = "Application with its events", body = Json<ApplicationDetailResponse>),
        (status = 404, description = "Application not found")
    )
)]
#[axum::debug_handler]
pub async fn get_application(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let detail = state.application_service.detail(user_id, id).await?;
    Ok(Json(ApplicationDetailResponse::from(detail)))
}

#[utoipa::path(
    patch,
    path = "/api/applications/{id}",
    params(
        ("id" = Uuid, Path, description = "Application ID")
    ),
    request_body = UpdateApplicationPayload,
    responses(
        (status = 200, description = "Application saved; rejected proposed events are listed", body = Json<ApplicationDetailResponse>),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Application not found")
    )
)]
#[axum::debug_handler]
pub async fn update_application(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateApplicationPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let detail = state.application_service.update(user_id, id, payload).await?;
    Ok(Json(ApplicationDetailResponse::from(detail)))
}

#[utoipa::path(
    delete,
    path = "/api/applications/{id}",
    params(
        ("id" = Uuid, Path, description = "Application ID")
    ),
    responses(
        (status = 204, description = "Application deleted"),
        (status = 404, description = "Application not found")
    )
)]
#[axum::debug_handler]
pub async fn delete_application(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.application_service.delete(user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/applications/stats",
    responses(
        (status = 200, description = "Status and milestone counts", body = Json<ApplicationStatsResponse>)
    )
)]
#[axum::debug_handler]
pub async fn application_stats(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
) -> Result<impl IntoResponse> {
    let stats = state.application_service.stats(user_id).await?;
    Ok(Json(ApplicationStatsResponse::from(stats)))
}
