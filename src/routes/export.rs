use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
};
use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    error::Result,
    middleware::auth::ActingUser,
    models::{application::Application, status_event::StatusEvent},
    services::export_service::ExportService,
    AppState,
};

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

async fn render(state: &AppState, applications: &[Application]) -> Result<Vec<u8>> {
    let ids: Vec<Uuid> = applications.iter().map(|a| a.id).collect();
    let mut events_by_application: HashMap<Uuid, Vec<StatusEvent>> = HashMap::new();
    for event in state.status_event_service.list_for_applications(&ids).await? {
        events_by_application
            .entry(event.application_id)
            .or_default()
            .push(event);
    }
    let category_names = state.reference_service.category_names().await?;

    ExportService::generate_applications_xlsx(applications, &category_names, &events_by_application)
}

fn attachment(filename: String, buffer: Vec<u8>) -> impl IntoResponse {
    let disposition = format!("attachment; filename=\"{}\"", filename);
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, XLSX_MIME.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        buffer,
    )
}

/// Export a single application as XLSX
#[utoipa::path(
    get,
    path = "/api/applications/{id}/export",
    params(
        ("id" = Uuid, Path, description = "Application ID")
    ),
    responses(
        (status = 200, description = "XLSX workbook"),
        (status = 404, description = "Application not found")
    )
)]
#[axum::debug_handler]
pub async fn export_application(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let application = state.application_service.get(user_id, id).await?;
    let buffer = render(&state, std::slice::from_ref(&application)).await?;

    let filename = format!(
        "application_{}_{}.xlsx",
        application.employer.replace(' ', "_"),
        chrono::Utc::now().format("%Y%m%d")
    );
    Ok(attachment(filename, buffer))
}

/// Export every application of the current user as XLSX
#[utoipa::path(
    get,
    path = "/api/applications/export",
    responses(
        (status = 200, description = "XLSX workbook")
    )
)]
#[axum::debug_handler]
pub async fn export_applications(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
) -> Result<impl IntoResponse> {
    let applications = state.application_service.list_all(user_id).await?;
    let buffer = render(&state, &applications).await?;

    let filename = format!(
        "applications_export_{}.xlsx",
        chrono::Utc::now().format("%Y%m%d_%H%M")
    );
    Ok(attachment(filename, buffer))
}
