//! Profile and follow endpoints

use axum::{
    Json,
    extract::{Path, Query, State},
};

use super::dto::{EditProfileResponse, MessageResponse, PageResponse, ProfileResponse, UserResponse};
use super::timelines::PaginationParams;
use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::service::ProfileForm;

/// GET /user/:username
pub async fn profile(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(username): Path<String>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = state.accounts().find_by_username(&username).await?;

    let graph = state.graph();
    let counts = graph.counts(user.id).await?;
    let is_self = viewer.id == user.id;
    let is_following = !is_self && graph.is_following(viewer.id, user.id).await?;

    let page = state
        .timelines()
        .user_timeline(user.id, params.page, params.per_page)
        .await?;
    let path = format!("/user/{}", urlencoding::encode(&user.username));

    Ok(Json(ProfileResponse::new(
        &user,
        counts,
        is_following,
        is_self,
        PageResponse::from_page(page, &path),
    )))
}

/// GET /edit_profile
pub async fn edit_profile_form(CurrentUser(user): CurrentUser) -> Json<EditProfileResponse> {
    Json(EditProfileResponse {
        username: user.username,
        about_me: user.about_me,
    })
}

/// POST /edit_profile
pub async fn edit_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(form): Json<ProfileForm>,
) -> Result<Json<UserResponse>, AppError> {
    let updated = state.accounts().edit_profile(&user, form).await?;
    Ok(Json(UserResponse::from(&updated)))
}

/// POST /follow/:username
pub async fn follow(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let target = state.graph().follow_username(&user, &username).await?;
    Ok(Json(MessageResponse::new(format!(
        "You are following {}!",
        target.username
    ))))
}

/// POST /unfollow/:username
///
/// The graph treats a self-unfollow as a no-op; the page refuses it outright.
pub async fn unfollow(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    if username == user.username {
        return Err(AppError::SelfUnfollowRejected);
    }

    let target = state.graph().unfollow_username(&user, &username).await?;
    Ok(Json(MessageResponse::new(format!(
        "You are not following {}.",
        target.username
    ))))
}
