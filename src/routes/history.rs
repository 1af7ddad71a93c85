use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json},
};
use uuid::Uuid;

use crate::{
    dto::history_dto::{HistoryEntryResponse, HistoryListResponse},
    error::Result,
    middleware::auth::ActingUser,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/applications/{id}/history",
    params(
        ("id" = Uuid, Path, description = "Application ID")
    ),
    responses(
        (status = 200, description = "Field changes, newest first", body = Json<HistoryListResponse>),
        (status = 404, description = "Application not found")
    )
)]
#[axum::debug_handler]
pub async fn list_history(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let entries = state.history_service.list(user_id, id).await?;
    let categories = state.reference_service.category_names().await?;

    Ok(Json(HistoryListResponse {
        items: entries
            .into_iter()
            .map(|entry| HistoryEntryResponse::render(entry, &categories))
            .collect(),
    }))
}
