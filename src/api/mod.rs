//! API layer
//!
//! HTTP handlers for:
//! - Registration, login/logout and password reset
//! - Timelines and posting
//! - Profiles and follows
//! - Metrics (Prometheus)

mod auth;
mod dto;
pub mod metrics;
mod timelines;
mod users;

use axum::{
    Router, middleware,
    routing::{get, post},
};

pub use dto::*;

pub use auth::auth_router;
pub use metrics::{metrics_router, track_metrics};

use crate::AppState;

/// Routes that need a logged-in user
///
/// Anonymous requests are redirected to the login page, and every
/// authenticated request refreshes the user's last-seen time.
pub fn app_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(timelines::home_timeline))
        .route(
            "/index",
            get(timelines::home_timeline).post(timelines::create_post),
        )
        .route("/explore", get(timelines::explore))
        .route("/user/:username", get(users::profile))
        .route(
            "/edit_profile",
            get(users::edit_profile_form).post(users::edit_profile),
        )
        .route("/follow/:username", post(users::follow))
        .route("/unfollow/:username", post(users::unfollow))
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::auth::require_auth,
        ))
}
