//! Form validation
//!
//! Pure checks on submitted fields. Uniqueness is not checked here; that
//! needs a store round-trip and lives in the services.

use serde::Deserialize;

use crate::error::{AppError, FieldError};

pub const USERNAME_MAX_LEN: usize = 64;
pub const EMAIL_MAX_LEN: usize = 120;
pub const ABOUT_ME_MAX_LEN: usize = 140;
pub const POST_MAX_LEN: usize = 140;

/// Registration form
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationForm {
    pub username: String,
    pub email: String,
    pub password: String,
    /// Confirmation, must equal `password`
    pub password2: String,
}

/// Profile edit form
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileForm {
    pub username: String,
    #[serde(default)]
    pub about_me: Option<String>,
}

/// New password form used by the reset flow
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordForm {
    pub password: String,
    pub password2: String,
}

fn char_len(value: &str) -> usize {
    value.chars().count()
}

fn check_username(username: &str, errors: &mut Vec<FieldError>) {
    let username = username.trim();
    if username.is_empty() {
        errors.push(FieldError::new("username", "This field is required"));
    } else if char_len(username) > USERNAME_MAX_LEN {
        errors.push(FieldError::new(
            "username",
            format!("Must be at most {USERNAME_MAX_LEN} characters"),
        ));
    }
}

fn check_password_pair(password: &str, password2: &str, errors: &mut Vec<FieldError>) {
    if password.is_empty() {
        errors.push(FieldError::new("password", "This field is required"));
    }
    if password2.is_empty() {
        errors.push(FieldError::new("password2", "This field is required"));
    } else if password != password2 {
        errors.push(FieldError::new("password2", "Passwords must match"));
    }
}

/// Minimal e-mail shape check: one `@` with something on each side and a dot
/// in the domain.
pub fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

pub fn validate_registration(form: &RegistrationForm) -> Vec<FieldError> {
    let mut errors = Vec::new();

    check_username(&form.username, &mut errors);

    let email = form.email.trim();
    if email.is_empty() {
        errors.push(FieldError::new("email", "This field is required"));
    } else if char_len(email) > EMAIL_MAX_LEN {
        errors.push(FieldError::new(
            "email",
            format!("Must be at most {EMAIL_MAX_LEN} characters"),
        ));
    } else if !looks_like_email(email) {
        errors.push(FieldError::new("email", "Invalid email address"));
    }

    check_password_pair(&form.password, &form.password2, &mut errors);

    errors
}

pub fn validate_profile(form: &ProfileForm) -> Vec<FieldError> {
    let mut errors = Vec::new();

    check_username(&form.username, &mut errors);

    if let Some(about_me) = &form.about_me {
        if char_len(about_me) > ABOUT_ME_MAX_LEN {
            errors.push(FieldError::new(
                "about_me",
                format!("Must be at most {ABOUT_ME_MAX_LEN} characters"),
            ));
        }
    }

    errors
}

pub fn validate_post(body: &str) -> Vec<FieldError> {
    let body = body.trim();
    if body.is_empty() {
        vec![FieldError::new("post", "This field is required")]
    } else if char_len(body) > POST_MAX_LEN {
        vec![FieldError::new(
            "post",
            format!("Must be at most {POST_MAX_LEN} characters"),
        )]
    } else {
        Vec::new()
    }
}

pub fn validate_password(form: &PasswordForm) -> Vec<FieldError> {
    let mut errors = Vec::new();
    check_password_pair(&form.password, &form.password2, &mut errors);
    errors
}

/// Turn a list of field errors into a result
pub fn ensure_valid(errors: Vec<FieldError>) -> Result<(), AppError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}
