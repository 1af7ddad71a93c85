use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        application_dto::ApplicationDetailResponse,
        event_dto::{
            CreateEventPayload, LatestEventQuery, LatestEventResponse, StatusEventListResponse,
        },
    },
    error::Result,
    middleware::auth::ActingUser,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/applications/{id}/events",
    params(
        ("id" = Uuid, Path, description = "Application ID")
    ),
    responses(
        (status = 200, description = "Status events, latest first", body = Json<StatusEventListResponse>),
        (status = 404, description = "Application not found")
    )
)]
#[axum::debug_handler]
pub async fn list_events(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let events = state.status_event_service.list(user_id, id).await?;
    Ok(Json(StatusEventListResponse {
        items: events.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/applications/{id}/events",
    params(
        ("id" = Uuid, Path, description = "Application ID")
    ),
    request_body = CreateEventPayload,
    responses(
        (status = 201, description = "Event logged and application reconciled", body = Json<ApplicationDetailResponse>),
        (status = 400, description = "Event date precedes the application"),
        (status = 404, description = "Application not found")
    )
)]
#[axum::debug_handler]
pub async fn create_event(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateEventPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let detail = state
        .application_service
        .add_event(user_id, id, payload.into())
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApplicationDetailResponse::from(detail)),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/applications/{id}/events/{event_id}",
    params(
        ("id" = Uuid, Path, description = "Application ID"),
        ("event_id" = i64, Path, description = "Status event ID")
    ),
    responses(
        (status = 200, description = "Event removed and application reconciled", body = Json<ApplicationDetailResponse>),
        (status = 404, description = "Application or event not found")
    )
)]
#[axum::debug_handler]
pub async fn delete_event(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path((id, event_id)): Path<(Uuid, i64)>,
) -> Result<impl IntoResponse> {
    let detail = state
        .application_service
        .remove_event(user_id, id, event_id)
        .await?;
    Ok(Json(ApplicationDetailResponse::from(detail)))
}

#[utoipa::path(
    get,
    path = "/api/applications/{id}/events/latest",
    params(
        ("id" = Uuid, Path, description = "Application ID"),
        ("kinds" = Option<String>, Query, description = "Comma-separated event kinds")
    ),
    responses(
        (status = 200, description = "Latest event of the given kinds, if any", body = Json<LatestEventResponse>),
        (status = 400, description = "Unknown event kind"),
        (status = 404, description = "Application not found")
    )
)]
#[axum::debug_handler]
pub async fn latest_event(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<Uuid>,
    Query(query): Query<LatestEventQuery>,
) -> Result<impl IntoResponse> {
    let kinds = query.parse_kinds()?;
    let event = state
        .status_event_service
        .latest_event(user_id, id, &kinds)
        .await?;
    Ok(Json(LatestEventResponse {
        event: event.map(Into::into),
    }))
}
