//! Outgoing mail
//!
//! Delivery goes through a pluggable [`Mailer`]. Sends are spawned and never
//! block or fail the request that triggered them.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::config::{AppConfig, MailConfig, MailTransport};
use crate::data::User;
use crate::error::AppError;
use crate::metrics::MAIL_DELIVERIES_TOTAL;

/// A message ready to hand to a transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Mail transport
pub trait Mailer: Send + Sync {
    /// Label used in logs and metrics
    fn transport(&self) -> &'static str;

    fn send(&self, email: OutgoingEmail) -> BoxFuture<'_, Result<(), AppError>>;
}

/// Writes messages to the log instead of sending them
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn transport(&self) -> &'static str {
        "log"
    }

    fn send(&self, email: OutgoingEmail) -> BoxFuture<'_, Result<(), AppError>> {
        Box::pin(async move {
            tracing::info!(
                from = %email.from,
                to = ?email.to,
                subject = %email.subject,
                body = %email.body,
                "Outgoing email"
            );
            Ok(())
        })
    }
}

/// POSTs messages as JSON to an HTTP relay
#[derive(Clone)]
pub struct WebhookMailer {
    http_client: Arc<reqwest::Client>,
    endpoint: String,
}

impl WebhookMailer {
    pub fn new(http_client: Arc<reqwest::Client>, endpoint: String) -> Self {
        Self {
            http_client,
            endpoint,
        }
    }
}

impl Mailer for WebhookMailer {
    fn transport(&self) -> &'static str {
        "webhook"
    }

    fn send(&self, email: OutgoingEmail) -> BoxFuture<'_, Result<(), AppError>> {
        Box::pin(async move {
            let response = self
                .http_client
                .post(&self.endpoint)
                .json(&email)
                .send()
                .await
                .map_err(|e| AppError::Mail(format!("Failed to reach mail relay: {}", e)))?;

            if !response.status().is_success() {
                return Err(AppError::Mail(format!(
                    "Mail relay rejected message: HTTP {}",
                    response.status()
                )));
            }

            tracing::debug!(to = ?email.to, "Delivered email to relay");
            Ok(())
        })
    }
}

/// Build the configured transport
pub fn build_mailer(config: &MailConfig) -> Result<Arc<dyn Mailer>, AppError> {
    match config.transport {
        MailTransport::Log => Ok(Arc::new(LogMailer)),
        MailTransport::Webhook => {
            let endpoint = config.webhook_url.clone().ok_or_else(|| {
                AppError::Config("mail.webhook_url is required for webhook transport".to_string())
            })?;
            let http_client = reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .map_err(|e| AppError::Internal(e.into()))?;
            Ok(Arc::new(WebhookMailer::new(Arc::new(http_client), endpoint)))
        }
    }
}

/// Compose the password reset message for `user`
pub fn password_reset_email(user: &User, token: &str, config: &AppConfig) -> OutgoingEmail {
    let link = format!("{}/reset_password/{}", config.server.base_url(), token);
    OutgoingEmail {
        from: config.mail.sender.clone(),
        to: vec![user.email.clone()],
        subject: "[Microblog] Reset Your Password".to_string(),
        body: format!(
            "Dear {},\n\nTo reset your password open the following link:\n\n{}\n\n\
             If you have not requested a password reset simply ignore this message.\n",
            user.username, link
        ),
    }
}

/// Send on a spawned task; failures are logged and counted, never returned
pub fn dispatch(mailer: Arc<dyn Mailer>, email: OutgoingEmail) -> JoinHandle<()> {
    tokio::spawn(async move {
        let transport = mailer.transport();
        match mailer.send(email).await {
            Ok(()) => {
                MAIL_DELIVERIES_TOTAL
                    .with_label_values(&[transport, "sent"])
                    .inc();
            }
            Err(error) => {
                MAIL_DELIVERIES_TOTAL
                    .with_label_values(&[transport, "failed"])
                    .inc();
                tracing::warn!(transport, error = %error, "Mail delivery failed");
            }
        }
    })
}

/// Send a password reset link to `user` in the background
pub fn dispatch_password_reset(
    mailer: Arc<dyn Mailer>,
    user: &User,
    token: &str,
    config: &AppConfig,
) -> JoinHandle<()> {
    dispatch(mailer, password_reset_email(user, token, config))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::tests::valid_config;
    use chrono::Utc;
    use std::sync::Mutex;

    /// Keeps every message it is asked to send
    #[derive(Default)]
    pub(crate) struct RecordingMailer {
        pub(crate) sent: Mutex<Vec<OutgoingEmail>>,
    }

    impl Mailer for RecordingMailer {
        fn transport(&self) -> &'static str {
            "recording"
        }

        fn send(&self, email: OutgoingEmail) -> BoxFuture<'_, Result<(), AppError>> {
            Box::pin(async move {
                self.sent.lock().unwrap().push(email);
                Ok(())
            })
        }
    }

    struct FailingMailer;

    impl Mailer for FailingMailer {
        fn transport(&self) -> &'static str {
            "failing"
        }

        fn send(&self, _email: OutgoingEmail) -> BoxFuture<'_, Result<(), AppError>> {
            Box::pin(async { Err(AppError::Mail("relay down".to_string())) })
        }
    }

    fn user() -> User {
        User {
            id: 7,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: String::new(),
            about_me: None,
            last_seen: Utc::now(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn reset_email_contains_link() {
        let config = valid_config();
        let email = password_reset_email(&user(), "tok.sig", &config);

        assert_eq!(email.to, vec!["alice@example.com".to_string()]);
        assert_eq!(email.from, config.mail.sender);
        assert!(email.body.contains("/reset_password/tok.sig"));
        assert!(email.body.contains("Dear alice"));
    }

    #[tokio::test]
    async fn dispatch_delivers_through_mailer() {
        let mailer = Arc::new(RecordingMailer::default());
        dispatch_password_reset(mailer.clone(), &user(), "tok.sig", &valid_config())
            .await
            .unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.contains("tok.sig"));
    }

    #[tokio::test]
    async fn dispatch_swallows_failures() {
        let handle = dispatch(
            Arc::new(FailingMailer),
            password_reset_email(&user(), "t", &valid_config()),
        );
        assert!(handle.await.is_ok());
    }

    #[test]
    fn webhook_transport_needs_url() {
        let mut config = valid_config().mail;
        config.transport = MailTransport::Webhook;
        config.webhook_url = None;
        assert!(matches!(build_mailer(&config), Err(AppError::Config(_))));

        config.webhook_url = Some("http://127.0.0.1:9/mail".to_string());
        assert_eq!(build_mailer(&config).unwrap().transport(), "webhook");
    }
}
