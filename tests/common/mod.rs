//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use microblog::error::AppError;
use microblog::mail::{Mailer, OutgoingEmail};
use microblog::{AppState, config};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Mailer that keeps every message instead of sending it
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
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

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub mailer: Arc<RecordingMailer>,
    pub _temp_dir: TempDir,
    /// Client that does not follow redirects, so 303s can be inspected
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                domain: "test.example.com".to_string(),
                protocol: "https".to_string(),
            },
            database: config::DatabaseConfig {
                path: db_path.clone(),
            },
            auth: config::AuthConfig {
                secret_key: "test-secret-key-that-is-32-bytes!".to_string(),
                session_max_age: 86_400,
                remember_max_age: 2_592_000,
                reset_token_ttl: 600,
            },
            timeline: config::TimelineConfig {
                posts_per_page: 3,
                max_page_size: 10,
            },
            mail: config::MailConfig {
                transport: config::MailTransport::Log,
                sender: "no-reply@test.example.com".to_string(),
                webhook_url: None,
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        // Initialize app state
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::with_mailer(config, mailer.clone())
            .await
            .unwrap();

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = microblog::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait a bit for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Self {
            addr: addr_str,
            state,
            mailer,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Register a user through the API; password is `"<username>-password"`
    pub async fn register(&self, username: &str) -> Value {
        let password = format!("{username}-password");
        let response = self
            .client
            .post(self.url("/register"))
            .json(&json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": password,
                "password2": password,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201, "registering {username}");
        response.json().await.unwrap()
    }

    /// Log in and return the session token
    pub async fn login(&self, username: &str) -> String {
        let response = self
            .client
            .post(self.url("/login"))
            .json(&json!({
                "email": format!("{username}@example.com"),
                "password": format!("{username}-password"),
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 303, "logging in {username}");
        let body: Value = response.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    /// Register and log in
    pub async fn signup(&self, username: &str) -> String {
        self.register(username).await;
        self.login(username).await
    }

    pub async fn get_json(&self, path: &str, token: &str) -> (u16, Value) {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    pub async fn post_json(&self, path: &str, token: &str, body: Value) -> (u16, Value) {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    pub async fn post_empty(&self, path: &str, token: &str) -> (u16, Value) {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    /// Submit a post as the token's owner
    pub async fn post(&self, token: &str, body: &str) {
        let (status, _) = self.post_json("/index", token, json!({ "post": body })).await;
        assert_eq!(status, 201, "posting {body:?}");
    }
}

/// Bodies of the posts on a timeline page
pub fn bodies(page: &Value) -> Vec<String> {
    page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|post| post["body"].as_str().unwrap().to_string())
        .collect()
}
