//! Password reset flow
//!
//! Request: mail a signed link to the address if it belongs to a user.
//! Confirm: redeem the link for a new password.

use std::sync::Arc;

use tokio::task::JoinHandle;

use super::AccountService;
use super::forms::{self, PasswordForm};
use crate::auth::ResetTokenService;
use crate::config::AppConfig;
use crate::data::{Database, User};
use crate::error::AppError;
use crate::mail::{self, Mailer};
use crate::metrics::record_auth_event;

pub struct PasswordResetService {
    db: Arc<Database>,
    tokens: ResetTokenService,
    mailer: Arc<dyn Mailer>,
    config: Arc<AppConfig>,
}

impl PasswordResetService {
    pub fn new(
        db: Arc<Database>,
        tokens: ResetTokenService,
        mailer: Arc<dyn Mailer>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            tokens,
            mailer,
            config,
        }
    }

    /// Start a reset for `email`
    ///
    /// Unknown addresses are silently ignored so callers cannot probe which
    /// e-mails are registered.
    ///
    /// # Returns
    /// The delivery task when a message was queued
    pub async fn request_reset(&self, email: &str) -> Result<Option<JoinHandle<()>>, AppError> {
        let Some(user) = self.db.get_user_by_email(email.trim()).await? else {
            record_auth_event("reset_request", "unknown_email");
            tracing::debug!("Password reset requested for unknown email");
            return Ok(None);
        };

        let token = self.tokens.issue(&user)?;
        record_auth_event("reset_request", "sent");
        tracing::info!(user_id = user.id, "Password reset requested");

        Ok(Some(mail::dispatch_password_reset(
            self.mailer.clone(),
            &user,
            &token,
            &self.config,
        )))
    }

    /// Redeem a reset token
    ///
    /// # Errors
    /// `InvalidToken` if the token is malformed, expired, forged, already
    /// spent or names a user that no longer exists. `Validation` if the new password is bad.
    pub async fn reset_password(&self, token: &str, form: PasswordForm) -> Result<User, AppError> {
        let Some(user) = self.tokens.verify(token, &self.db).await? else {
            record_auth_event("reset_password", "invalid_token");
            return Err(AppError::InvalidToken);
        };

        forms::ensure_valid(forms::validate_password(&form))?;

        AccountService::new(self.db.clone())
            .set_password(user.id, &form.password)
            .await?;
        record_auth_event("reset_password", "success");

        Ok(user)
    }
}
