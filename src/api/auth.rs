//! Account entry points
//!
//! Registration, login/logout and the password reset flow.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
    routing::post,
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::Deserialize;

use super::dto::{LoginResponse, MessageResponse, UserResponse};
use crate::AppState;
use crate::auth::{
    DEFAULT_REDIRECT, MaybeUser, SESSION_COOKIE, extract_token_from_headers, redirect_target,
};
use crate::error::AppError;
use crate::service::{PasswordForm, RegistrationForm};

const RESET_REQUESTED_MESSAGE: &str =
    "Check your email for the instructions to reset your password";

#[derive(Debug, Deserialize)]
pub struct LoginParams {
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

/// POST /register
async fn register(
    State(state): State<AppState>,
    MaybeUser(current): MaybeUser,
    Json(form): Json<RegistrationForm>,
) -> Result<Response, AppError> {
    if current.is_some() {
        return Ok(Redirect::to(DEFAULT_REDIRECT).into_response());
    }

    let user = state.accounts().register(form).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))).into_response())
}

/// POST /login?next=
///
/// Sets the session cookie and redirects to `next` when it is a safe local
/// path. The token is also returned in the body for bearer clients.
async fn login(
    State(state): State<AppState>,
    MaybeUser(current): MaybeUser,
    Query(params): Query<LoginParams>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<Response, AppError> {
    if current.is_some() {
        return Ok(Redirect::to(DEFAULT_REDIRECT).into_response());
    }

    let sessions = state.sessions();
    let (session, token) = sessions
        .login(&request.email, &request.password, request.remember_me)
        .await?;

    let mut session_cookie = Cookie::build((SESSION_COOKIE, token.clone()))
        .path("/")
        .http_only(true)
        .secure(state.config.should_use_secure_cookies())
        .same_site(SameSite::Lax);
    if request.remember_me {
        let max_age = sessions.max_age(true).num_seconds();
        session_cookie = session_cookie.max_age(cookie::time::Duration::seconds(max_age));
    }

    let target = redirect_target(params.next.as_deref());
    let body = LoginResponse {
        token,
        redirect_to: target.clone(),
        expires_at: session.exp,
    };

    Ok((
        StatusCode::SEE_OTHER,
        jar.add(session_cookie.build()),
        [(header::LOCATION, target)],
        Json(body),
    )
        .into_response())
}

/// POST /logout
async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<Response, AppError> {
    if let Some(token) = extract_token_from_headers(&headers) {
        state.sessions().logout(&token).await?;
    }

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Ok((jar, Redirect::to(DEFAULT_REDIRECT)).into_response())
}

/// POST /reset_password_request
///
/// Always answers the same way, whether or not the address is registered.
async fn reset_password_request(
    State(state): State<AppState>,
    MaybeUser(current): MaybeUser,
    Json(request): Json<ResetRequest>,
) -> Result<Response, AppError> {
    if current.is_some() {
        return Ok(Redirect::to(DEFAULT_REDIRECT).into_response());
    }

    // Delivery runs in the background; its outcome is only logged.
    let _delivery = state.password_resets().request_reset(&request.email).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse::new(RESET_REQUESTED_MESSAGE)),
    )
        .into_response())
}

/// POST /reset_password/:token
async fn reset_password(
    State(state): State<AppState>,
    MaybeUser(current): MaybeUser,
    Path(token): Path<String>,
    Json(form): Json<PasswordForm>,
) -> Result<Response, AppError> {
    if current.is_some() {
        return Ok(Redirect::to(DEFAULT_REDIRECT).into_response());
    }

    state.password_resets().reset_password(&token, form).await?;

    Ok(Json(MessageResponse::new("Your password has been reset.")).into_response())
}

/// Routes reachable without a session
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/reset_password_request", post(reset_password_request))
        .route("/reset_password/:token", post(reset_password))
}
