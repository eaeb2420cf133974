//! Authentication middleware
//!
//! Protects routes that require authentication.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, State},
    http::{HeaderMap, Request, Uri, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use chrono::Utc;

use super::session::Identity;
use crate::AppState;
use crate::data::User;
use crate::error::AppError;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session";

/// Pull the session token from `Authorization: Bearer` or the session cookie
pub fn extract_token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(ToOwned::to_owned)
        .or_else(|| {
            let jar = CookieJar::from_headers(headers);
            jar.get(SESSION_COOKIE)
                .map(|cookie| cookie.value().to_owned())
        })
}

fn requested_path(uri: &Uri) -> Option<String> {
    uri.path_and_query().map(|pq| pq.as_str().to_string())
}

async fn resolve_identity(headers: &HeaderMap, state: &AppState) -> Result<Identity, AppError> {
    let token = extract_token_from_headers(headers);
    state.sessions().current_identity(token.as_deref()).await
}

/// Middleware to require authentication
///
/// Extracts and verifies the session from cookie or Authorization header,
/// refreshes the user's last-seen time and adds the `User` to request
/// extensions. Anonymous requests are sent to the login page with the
/// requested path as `next`.
///
/// # Usage
/// ```ignore
/// let protected_routes = Router::new()
///     .route("/index", ...)
///     .layer(middleware::from_fn_with_state(state, require_auth));
/// ```
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let identity = resolve_identity(request.headers(), &state).await?;
    let mut user = identity.require(requested_path(request.uri()))?;

    let now = Utc::now();
    state.accounts().touch_last_seen(user.id, now).await?;
    user.last_seen = now;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Extractor for current authenticated user
///
/// Use in handlers to get the current user.
///
/// # Usage
/// ```ignore
/// async fn handler(
///     CurrentUser(user): CurrentUser,
/// ) -> impl IntoResponse {
///     format!("Hello, {}", user.username)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<User>().cloned() {
            return Ok(CurrentUser(user));
        }

        let state = AppState::from_ref(state);
        let identity = resolve_identity(&parts.headers, &state).await?;
        let user = identity.require(requested_path(&parts.uri))?;
        parts.extensions.insert(user.clone());

        Ok(CurrentUser(user))
    }
}

/// Optional current user extractor
///
/// Returns None if not authenticated, instead of error.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<User>().cloned() {
            return Ok(MaybeUser(Some(user)));
        }

        let state = AppState::from_ref(state);
        match resolve_identity(&parts.headers, &state).await? {
            Identity::Authenticated(user) => {
                parts.extensions.insert(user.clone());
                Ok(MaybeUser(Some(user)))
            }
            Identity::Anonymous => Ok(MaybeUser(None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Bearer abc.def"));
        headers.insert("Cookie", HeaderValue::from_static("session=cookie.token"));
        assert_eq!(
            extract_token_from_headers(&headers).as_deref(),
            Some("abc.def")
        );
    }

    #[test]
    fn session_cookie_is_read() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Cookie",
            HeaderValue::from_static("theme=dark; session=cookie.token"),
        );
        assert_eq!(
            extract_token_from_headers(&headers).as_deref(),
            Some("cookie.token")
        );
    }

    #[test]
    fn no_token_is_none() {
        assert!(extract_token_from_headers(&HeaderMap::new()).is_none());
    }

    #[test]
    fn requested_path_keeps_query() {
        let uri: Uri = "/user/bob?page=2".parse().unwrap();
        assert_eq!(requested_path(&uri).as_deref(), Some("/user/bob?page=2"));
    }
}
