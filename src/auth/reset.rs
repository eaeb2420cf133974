//! Password reset tokens
//!
//! Self-contained, never persisted. A token is the signed claim
//! `{reset_password: user_id, pwd: fingerprint, exp: unix_seconds}` and is
//! valid while `now <= exp` and the user's password hash still matches the
//! fingerprint. Changing the password re-salts the hash, so a token works
//! for one password change at most.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::token as signed;
use crate::config::AuthConfig;
use crate::data::{Database, User};
use crate::error::AppError;

/// Claims carried in a reset token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetClaims {
    /// User ID the token authorizes a password change for
    pub reset_password: i64,
    /// Fingerprint of the password hash at issue time
    pub pwd: String,
    /// Expiry (unix seconds)
    pub exp: i64,
}

/// Issues and verifies reset tokens with the process-wide secret
#[derive(Clone)]
pub struct ResetTokenService {
    secret: String,
    ttl: Duration,
}

impl ResetTokenService {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            secret: config.secret_key.clone(),
            ttl: Duration::seconds(config.reset_token_ttl),
        }
    }

    /// Issue a token for `user` that expires `ttl` after `now`
    pub fn issue_at(
        &self,
        user: &User,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let claims = ResetClaims {
            reset_password: user.id,
            pwd: password_fingerprint(&user.password_hash),
            exp: (now + ttl).timestamp(),
        };
        signed::sign(&claims, &self.secret)
    }

    /// Issue a token for `user` with the configured lifetime
    pub fn issue(&self, user: &User) -> Result<String, AppError> {
        self.issue_at(user, self.ttl, Utc::now())
    }

    /// Decode a token as of `now`
    ///
    /// # Returns
    /// `None` when the token is malformed, expired or forged. The three cases
    /// are deliberately indistinguishable.
    ///
    /// # Errors
    /// Anything outside that class is a real error and is propagated.
    pub fn decode_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ResetClaims>, AppError> {
        let claims: Option<ResetClaims> = signed::open(token, &self.secret)?;
        Ok(claims.filter(|claims| now.timestamp() <= claims.exp))
    }

    /// Verify a token and resolve it to a live user
    ///
    /// # Returns
    /// `None` if the token is invalid, the user no longer exists or the
    /// password changed since the token was issued
    pub async fn verify(&self, token: &str, db: &Database) -> Result<Option<User>, AppError> {
        let Some(claims) = self.decode_at(token, Utc::now())? else {
            tracing::debug!("Reset token rejected");
            return Ok(None);
        };

        let user = db.get_user(claims.reset_password).await?;
        Ok(user.filter(|user| password_fingerprint(&user.password_hash) == claims.pwd))
    }
}

/// Short digest of a password hash; never reveals the hash itself.
fn password_fingerprint(password_hash: &str) -> String {
    Sha256::digest(password_hash.as_bytes())
        .iter()
        .take(8)
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::valid_config;
    use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

    fn service() -> ResetTokenService {
        ResetTokenService::new(&valid_config().auth)
    }

    fn user(id: i64) -> User {
        User {
            id,
            username: format!("user{id}"),
            email: format!("user{id}@example.com"),
            password_hash: "hash".to_string(),
            about_me: None,
            last_seen: Utc::now(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn token_valid_until_expiry() {
        let service = service();
        let t = Utc::now();
        let token = service.issue_at(&user(42), Duration::seconds(600), t).unwrap();

        let claims = service
            .decode_at(&token, t + Duration::seconds(599))
            .unwrap()
            .expect("valid at t+599");
        assert_eq!(claims.reset_password, 42);

        assert!(
            service
                .decode_at(&token, t + Duration::seconds(601))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn tampered_signature_is_rejected_like_expired() {
        let service = service();
        let t = Utc::now();
        let token = service.issue_at(&user(42), Duration::seconds(600), t).unwrap();

        let (payload, signature) = token.split_once('.').unwrap();
        let mut signature_bytes = URL_SAFE_NO_PAD.decode(signature).unwrap();
        signature_bytes[0] ^= 0x01;
        let tampered = format!("{payload}.{}", URL_SAFE_NO_PAD.encode(signature_bytes));

        let tampered_result = service.decode_at(&tampered, t).unwrap();
        let expired_result = service
            .decode_at(&token, t + Duration::seconds(601))
            .unwrap();
        assert_eq!(tampered_result, None);
        assert_eq!(tampered_result, expired_result);
    }

    #[test]
    fn malformed_token_is_rejected() {
        let service = service();
        for token in ["", "garbage", "a.b", "a.b.c"] {
            assert!(service.decode_at(token, Utc::now()).unwrap().is_none());
        }
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let mut config = valid_config();
        config.auth.secret_key = "y".repeat(32);
        let other = ResetTokenService::new(&config.auth);

        let t = Utc::now();
        let token = other.issue_at(&user(42), Duration::seconds(600), t).unwrap();
        assert!(service().decode_at(&token, t).unwrap().is_none());
    }

    #[tokio::test]
    async fn verify_resolves_live_user_only() {
        use crate::data::NewUser;

        let temp_dir = tempfile::TempDir::new().unwrap();
        let db = Database::connect(&temp_dir.path().join("test.db"))
            .await
            .unwrap();
        let user = db
            .insert_user(
                &NewUser {
                    username: "alice".to_string(),
                    email: "alice@example.com".to_string(),
                    password_hash: "hash".to_string(),
                },
                Utc::now(),
            )
            .await
            .unwrap();

        let service = service();
        let token = service.issue(&user).unwrap();
        let resolved = service.verify(&token, &db).await.unwrap();
        assert_eq!(resolved.map(|u| u.id), Some(user.id));

        let mut ghost = user.clone();
        ghost.id += 100;
        let ghost = service.issue(&ghost).unwrap();
        assert!(service.verify(&ghost, &db).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn password_change_spends_outstanding_tokens() {
        use crate::data::NewUser;

        let temp_dir = tempfile::TempDir::new().unwrap();
        let db = Database::connect(&temp_dir.path().join("test.db"))
            .await
            .unwrap();
        let user = db
            .insert_user(
                &NewUser {
                    username: "alice".to_string(),
                    email: "alice@example.com".to_string(),
                    password_hash: "first-hash".to_string(),
                },
                Utc::now(),
            )
            .await
            .unwrap();

        let service = service();
        let token = service.issue(&user).unwrap();
        assert!(service.verify(&token, &db).await.unwrap().is_some());

        db.update_password_hash(user.id, "second-hash").await.unwrap();
        assert!(service.verify(&token, &db).await.unwrap().is_none());
    }
}
