use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use validator::Validate;

use crate::{
    dto::reference_dto::{
        CategoryListResponse, CreateCategoryPayload, CreateTagPayload, TagListResponse,
    },
    error::Result,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/categories",
    responses(
        (status = 200, description = "All categories", body = Json<CategoryListResponse>)
    )
)]
#[axum::debug_handler]
pub async fn list_categories(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let items = state.reference_service.categories().await?;
    Ok(Json(CategoryListResponse { items }))
}

#[utoipa::path(
    post,
    path = "/api/categories",
    request_body = CreateCategoryPayload,
    responses(
        (status = 201, description = "Category created or recolored"),
        (status = 400, description = "Invalid payload")
    )
)]
#[axum::debug_handler]
pub async fn create_category(
    State(state): State<AppState>,
    Json(payload): Json<CreateCategoryPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let category = state.reference_service.create_category(payload).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

#[utoipa::path(
    delete,
    path = "/api/categories/{id}",
    params(
        ("id" = i64, Path, description = "Category ID")
    ),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 404, description = "Category not found")
    )
)]
#[axum::debug_handler]
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.reference_service.delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/tags",
    responses(
        (status = 200, description = "All tags", body = Json<TagListResponse>)
    )
)]
#[axum::debug_handler]
pub async fn list_tags(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let items = state.reference_service.tags().await?;
    Ok(Json(TagListResponse { items }))
}

#[utoipa::path(
    post,
    path = "/api/tags",
    request_body = CreateTagPayload,
    responses(
        (status = 201, description = "Tag created"),
        (status = 400, description = "Invalid payload")
    )
)]
#[axum::debug_handler]
pub async fn create_tag(
    State(state): State<AppState>,
    Json(payload): Json<CreateTagPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let tag = state.reference_service.create_tag(payload).await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

#[utoipa::path(
    delete,
    path = "/api/tags/{id}",
    params(
        ("id" = i64, Path, description = "Tag ID")
    ),
    responses(
        (status = 204, description = "Tag deleted"),
        (status = 404, description = "Tag not found")
    )
)]
#[axum::debug_handler]
pub async fn delete_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.reference_service.delete_tag(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
