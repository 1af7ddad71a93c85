use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};

use crate::{
    dto::notification_dto::{AffectedResponse, NotificationListQuery, NotificationListResponse},
    error::Result,
    middleware::auth::ActingUser,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/notifications",
    params(
        ("unread_only" = Option<bool>, Query, description = "Only unread notifications"),
        ("limit" = Option<i64>, Query, description = "Maximum items (max 200)")
    ),
    responses(
        (status = 200, description = "Notifications, newest first", body = Json<NotificationListResponse>)
    )
)]
#[axum::debug_handler]
pub async fn list_notifications(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Query(query): Query<NotificationListQuery>,
) -> Result<impl IntoResponse> {
    let (items, unread_count) = state.notification_service.list(user_id, query).await?;
    Ok(Json(NotificationListResponse {
        items,
        unread_count,
    }))
}

#[utoipa::path(
    post,
    path = "/api/notifications/{id}/read",
    params(
        ("id" = i64, Path, description = "Notification ID")
    ),
    responses(
        (status = 200, description = "Notification marked as read"),
        (status = 404, description = "Notification not found")
    )
)]
#[axum::debug_handler]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let notification = state.notification_service.mark_read(user_id, id).await?;
    Ok(Json(notification))
}

#[utoipa::path(
    post,
    path = "/api/notifications/read-all",
    responses(
        (status = 200, description = "Unread notifications marked as read", body = Json<AffectedResponse>)
    )
)]
#[axum::debug_handler]
pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
) -> Result<impl IntoResponse> {
    let affected = state.notification_service.mark_all_read(user_id).await?;
    Ok(Json(AffectedResponse { affected }))
}

#[utoipa::path(
    delete,
    path = "/api/notifications/{id}",
    params(
        ("id" = i64, Path, description = "Notification ID")
    ),
    responses(
        (status = 204, description = "Notification deleted"),
        (status = 404, description = "Notification not found")
    )
)]
#[axum::debug_handler]
pub async fn delete_notification(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.notification_service.delete(user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/api/notifications",
    responses(
        (status = 200, description = "All notifications deleted", body = Json<AffectedResponse>)
    )
)]
#[axum::debug_handler]
pub async fn delete_all_notifications(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
) -> Result<impl IntoResponse> {
    let affected = state.notification_service.delete_all(user_id).await?;
    Ok(Json(AffectedResponse { affected }))
}
