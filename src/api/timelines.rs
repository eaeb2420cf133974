//! Timeline endpoints

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use super::dto::{PageResponse, PostResponse};
use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::AppError;

/// `?page=&per_page=` query
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub page: Option<i64>,
    pub per_page: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PostRequest {
    pub post: String,
}

/// GET / and GET /index
pub async fn home_timeline(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<PageResponse<PostResponse>>, AppError> {
    let page = state
        .timelines()
        .home_timeline(user.id, params.page, params.per_page)
        .await?;

    Ok(Json(PageResponse::from_page(page, "/index")))
}

/// POST /index
pub async fn create_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<PostRequest>,
) -> Result<(StatusCode, Json<PostResponse>), AppError> {
    let post = state.timelines().create_post(user.id, &request.post).await?;
    Ok((StatusCode::CREATED, Json(PostResponse::from(post))))
}

/// GET /explore
pub async fn explore(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<PageResponse<PostResponse>>, AppError> {
    let page = state
        .timelines()
        .global_timeline(params.page, params.per_page)
        .await?;

    Ok(Json(PageResponse::from_page(page, "/explore")))
}
