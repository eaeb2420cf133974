//! Post-login redirect targets
//!
//! The `next` query parameter is attacker-controlled. Only same-site
//! relative paths are followed.

/// Where to go after login when `next` is missing or rejected
pub const DEFAULT_REDIRECT: &str = "/index";

/// Return `next` if it is a safe relative path, otherwise `None`.
///
/// Accepted: a path starting with a single `/`, with no scheme and no
/// authority. Rejected: `//host`, `/\host`, `https://host`, `javascript:...`,
/// and anything containing control characters.
pub fn safe_next(next: &str) -> Option<&str> {
    if !next.starts_with('/') || next.starts_with("//") || next.starts_with("/\\") {
        return None;
    }
    if next.chars().any(|c| c.is_control()) {
        return None;
    }

    // Anything that parses on its own carries a scheme.
    if url::Url::parse(next).is_ok() {
        return None;
    }

    let base = url::Url::parse("http://localhost/").ok()?;
    let joined = base.join(next).ok()?;
    if joined.host_str() != Some("localhost") || joined.port().is_some() {
        return None;
    }

    Some(next)
}

/// Resolve the post-login redirect target
pub fn redirect_target(next: Option<&str>) -> String {
    next.and_then(safe_next)
        .unwrap_or(DEFAULT_REDIRECT)
        .to_string()
}

/// Build the login URL, carrying `next` if it is safe
pub fn login_url(next: Option<&str>) -> String {
    match next.and_then(safe_next) {
        Some(next) => format!("/login?next={}", urlencoding::encode(next)),
        None => "/login".to_string(),
    }
}
