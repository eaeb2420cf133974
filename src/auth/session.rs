//! Session management
//!
//! A login creates a server-side session row and hands the client an
//! HMAC-signed token naming it. The token is only honoured while the row
//! exists and has not expired, so logout is immediate.

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::token as signed;
use crate::config::AuthConfig;
use crate::data::{Database, SessionRecord, User};
use crate::error::AppError;
use crate::service::AccountService;

/// Claims carried in the session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session row ID
    pub sid: String,
    /// User ID
    pub uid: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
}

impl Session {
    /// Check if session is expired
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }
}

/// Who is making the request
#[derive(Debug, Clone)]
pub enum Identity {
    Anonymous,
    Authenticated(User),
}

impl Identity {
    /// Resolve to a user or fail with `Unauthenticated`, remembering where
    /// the caller wanted to go.
    pub fn require(self, next: Option<String>) -> Result<User, AppError> {
        match self {
            Identity::Authenticated(user) => Ok(user),
            Identity::Anonymous => Err(AppError::Unauthenticated { next }),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::Authenticated(_))
    }
}

/// Create a signed session token
pub fn create_session_token(session: &Session, secret: &str) -> Result<String, AppError> {
    signed::sign(session, secret)
}

/// Verify and decode a session token
///
/// # Returns
/// `None` if the token is malformed, forged or expired
pub fn verify_session_token(
    token: &str,
    secret: &str,
    now: DateTime<Utc>,
) -> Result<Option<Session>, AppError> {
    let session: Option<Session> = signed::open(token, secret)?;
    Ok(session.filter(|session| !session.is_expired_at(now)))
}

fn generate_session_id() -> String {
    let mut bytes = [0_u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Session authenticator
pub struct SessionService {
    db: Arc<Database>,
    config: AuthConfig,
}

impl SessionService {
    /// Create new session service
    pub fn new(db: Arc<Database>, config: AuthConfig) -> Self {
        Self { db, config }
    }

    /// Lifetime of a new session
    pub fn max_age(&self, remember: bool) -> Duration {
        if remember {
            Duration::seconds(self.config.remember_max_age)
        } else {
            Duration::seconds(self.config.session_max_age)
        }
    }

    /// Log in with email and password
    ///
    /// # Returns
    /// The session claims and the signed token to hand to the client
    ///
    /// # Errors
    /// `InvalidCredentials` for an unknown email or a wrong password alike
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        remember: bool,
    ) -> Result<(Session, String), AppError> {
        let accounts = AccountService::new(self.db.clone());
        let Some(user) = accounts.verify(email, password).await? else {
            crate::metrics::record_auth_event("login", "failure");
            tracing::info!("Login rejected");
            return Err(AppError::InvalidCredentials);
        };

        let now = Utc::now();
        let record = SessionRecord {
            id: generate_session_id(),
            user_id: user.id,
            remember,
            created_at: now,
            expires_at: now + self.max_age(remember),
        };
        self.db.insert_session(&record).await?;

        let session = Session {
            sid: record.id,
            uid: user.id,
            exp: record.expires_at.timestamp(),
        };
        let token = create_session_token(&session, &self.config.secret_key)?;

        crate::metrics::record_auth_event("login", "success");
        tracing::info!(user_id = user.id, remember, "User logged in");

        Ok((session, token))
    }

    /// Invalidate the session named by `token`
    ///
    /// Unknown or already invalid tokens are ignored.
    pub async fn logout(&self, token: &str) -> Result<(), AppError> {
        let Some(session) = signed::open::<Session>(token, &self.config.secret_key)? else {
            return Ok(());
        };

        if self.db.delete_session(&session.sid).await? {
            crate::metrics::record_auth_event("logout", "success");
            tracing::info!(user_id = session.uid, "User logged out");
        }

        Ok(())
    }

    /// Resolve the identity behind an optional token
    ///
    /// Missing, malformed, forged, expired or revoked tokens, and tokens whose
    /// user no longer exists, all resolve to `Anonymous`.
    pub async fn current_identity(&self, token: Option<&str>) -> Result<Identity, AppError> {
        let Some(token) = token else {
            return Ok(Identity::Anonymous);
        };

        let now = Utc::now();
        let Some(session) = verify_session_token(token, &self.config.secret_key, now)? else {
            return Ok(Identity::Anonymous);
        };

        let Some(record) = self.db.get_session(&session.sid).await? else {
            return Ok(Identity::Anonymous);
        };
        if record.user_id != session.uid || record.is_expired_at(now) {
            return Ok(Identity::Anonymous);
        }

        match self.db.get_user(record.user_id).await? {
            Some(user) => Ok(Identity::Authenticated(user)),
            None => Ok(Identity::Anonymous),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::valid_config;
    use crate::service::{AccountService, RegistrationForm};
    use tempfile::TempDir;

    async fn setup() -> (SessionService, Arc<Database>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(Database::connect(&temp_dir.path().join("test.db")).await.unwrap());
        AccountService::new(db.clone())
            .register(RegistrationForm {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password: "correct horse".to_string(),
                password2: "correct horse".to_string(),
            })
            .await
            .unwrap();
        let service = SessionService::new(db.clone(), valid_config().auth);
        (service, db, temp_dir)
    }

    #[tokio::test]
    async fn login_then_current_identity() {
        let (service, _db, _dir) = setup().await;

        let (_, token) = service
            .login("alice@example.com", "correct horse", false)
            .await
            .unwrap();

        match service.current_identity(Some(&token)).await.unwrap() {
            Identity::Authenticated(user) => assert_eq!(user.username, "alice"),
            Identity::Anonymous => panic!("expected authenticated identity"),
        }
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let (service, _db, _dir) = setup().await;

        let wrong_password = service
            .login("alice@example.com", "wrong", false)
            .await
            .unwrap_err();
        let unknown_email = service
            .login("nobody@example.com", "correct horse", false)
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, AppError::InvalidCredentials));
        assert!(matches!(unknown_email, AppError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn remember_extends_lifetime() {
        let (service, _db, _dir) = setup().await;

        let (short, _) = service
            .login("alice@example.com", "correct horse", false)
            .await
            .unwrap();
        let (long, _) = service
            .login("alice@example.com", "correct horse", true)
            .await
            .unwrap();

        assert!(long.exp > short.exp);
        assert!(long.exp - short.exp >= 2_592_000 - 86_400 - 5);
    }

    #[tokio::test]
    async fn logout_revokes_token() {
        let (service, _db, _dir) = setup().await;
        let (_, token) = service
            .login("alice@example.com", "correct horse", false)
            .await
            .unwrap();

        service.logout(&token).await.unwrap();

        let identity = service.current_identity(Some(&token)).await.unwrap();
        assert!(!identity.is_authenticated());
    }

    #[tokio::test]
    async fn anonymous_cases() {
        let (service, _db, _dir) = setup().await;

        assert!(!service.current_identity(None).await.unwrap().is_authenticated());
        assert!(
            !service
                .current_identity(Some("not-a-token"))
                .await
                .unwrap()
                .is_authenticated()
        );

        // Validly signed but no such session row
        let orphan = create_session_token(
            &Session {
                sid: "missing".to_string(),
                uid: 1,
                exp: Utc::now().timestamp() + 60,
            },
            &valid_config().auth.secret_key,
        )
        .unwrap();
        assert!(
            !service
                .current_identity(Some(&orphan))
                .await
                .unwrap()
                .is_authenticated()
        );
    }

    #[test]
    fn expired_session_token_is_rejected() {
        let secret = valid_config().auth.secret_key;
        let now = Utc::now();
        let token = create_session_token(
            &Session {
                sid: "s".to_string(),
                uid: 1,
                exp: now.timestamp() - 1,
            },
            &secret,
        )
        .unwrap();

        assert!(verify_session_token(&token, &secret, now).unwrap().is_none());
    }

    #[test]
    fn unauthenticated_identity_keeps_next() {
        let error = Identity::Anonymous
            .require(Some("/explore".to_string()))
            .unwrap_err();
        assert!(matches!(
            error,
            AppError::Unauthenticated { next: Some(next) } if next == "/explore"
        ));
    }
}
