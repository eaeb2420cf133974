//! Account service
//!
//! Credential store: registration, credential checks, profile edits and
//! password changes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use super::forms::{self, ProfileForm, RegistrationForm};
use crate::auth::password;
use crate::data::{Database, NewUser, User};
use crate::error::AppError;

fn normalize_optional_text(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Hash on the blocking pool; Argon2 is deliberately slow.
async fn hash_blocking(plaintext: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || password::hash_password(&plaintext))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
}

/// Avatar URL for an e-mail address
///
/// Derived only from the trimmed, lowercased address, so it is stable for a
/// given user.
pub fn avatar_reference(email: &str, size: u32) -> String {
    let digest = Sha256::digest(email.trim().to_lowercase().as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("https://www.gravatar.com/avatar/{hex}?d=identicon&s={size}")
}

/// Account service
pub struct AccountService {
    db: Arc<Database>,
}

impl AccountService {
    /// Create new account service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Register a new user
    ///
    /// # Errors
    /// `Validation` for bad fields, `Conflict` if the username or e-mail is
    /// taken (including a lost race against a concurrent registration).
    pub async fn register(&self, form: RegistrationForm) -> Result<User, AppError> {
        forms::ensure_valid(forms::validate_registration(&form))?;

        let password_hash = hash_blocking(form.password).await?;
        let user = self
            .db
            .insert_user(
                &NewUser {
                    username: form.username.trim().to_string(),
                    email: form.email.trim().to_string(),
                    password_hash,
                },
                Utc::now(),
            )
            .await?;

        crate::metrics::USERS_TOTAL.set(self.db.count_users().await?);
        tracing::info!(user_id = user.id, username = %user.username, "User registered");

        Ok(user)
    }

    /// Check an e-mail/password pair
    ///
    /// # Returns
    /// The user on success, `None` for an unknown e-mail or a wrong password
    /// alike. Unknown e-mails still pay for one hash verification.
    pub async fn verify(&self, email: &str, plaintext: &str) -> Result<Option<User>, AppError> {
        let user = self.db.get_user_by_email(email.trim()).await?;
        let plaintext = plaintext.to_string();

        tokio::task::spawn_blocking(move || match user {
            Some(user) => {
                let matches = password::verify_password(&plaintext, &user.password_hash)?;
                Ok(matches.then_some(user))
            }
            None => {
                password::verify_dummy(&plaintext);
                Ok(None)
            }
        })
        .await
        .map_err(|e| AppError::Internal(e.into()))?
    }

    pub async fn find_by_id(&self, id: i64) -> Result<User, AppError> {
        self.db.get_user(id).await?.ok_or(AppError::NotFound)
    }

    pub async fn find_by_username(&self, username: &str) -> Result<User, AppError> {
        self.db
            .get_user_by_username(username)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.db.get_user_by_email(email.trim()).await
    }

    /// Update username and bio
    ///
    /// An empty bio clears it. Uniqueness is only an issue when the username
    /// actually changed; the store checks and writes in one transaction.
    pub async fn edit_profile(&self, user: &User, form: ProfileForm) -> Result<User, AppError> {
        forms::ensure_valid(forms::validate_profile(&form))?;

        let username = form.username.trim().to_string();
        let about_me = normalize_optional_text(form.about_me);

        let updated = self
            .db
            .update_user_profile(user.id, &username, about_me.as_deref())
            .await?
            .ok_or(AppError::NotFound)?;

        tracing::info!(user_id = user.id, "Profile updated");
        Ok(updated)
    }

    /// Replace the password and revoke the user's sessions
    pub async fn set_password(&self, user_id: i64, new_password: &str) -> Result<(), AppError> {
        let password_hash = hash_blocking(new_password.to_string()).await?;
        if !self.db.update_password_hash(user_id, &password_hash).await? {
            return Err(AppError::NotFound);
        }

        tracing::info!(user_id, "Password changed");
        Ok(())
    }

    /// Record activity at `at`
    pub async fn touch_last_seen(&self, user_id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        self.db.touch_last_seen(user_id, at).await
    }
}
