//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::{net::IpAddr, path::PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub timeline: TimelineConfig,
    pub mail: MailConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 5000)
    pub port: u16,
    /// Public domain (e.g., "blog.example.com")
    pub domain: String,
    /// Protocol ("http" or "https")
    pub protocol: String,
}

impl ServerConfig {
    /// Get the base URL for the instance
    ///
    /// # Returns
    /// Full URL like "https://blog.example.com"
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Process-wide signing secret for session and reset tokens (32+ bytes)
    pub secret_key: String,
    /// Session lifetime in seconds when "remember me" is off (default: 1 day)
    pub session_max_age: i64,
    /// Session lifetime in seconds when "remember me" is on (default: 30 days)
    pub remember_max_age: i64,
    /// Password reset token lifetime in seconds (default: 600)
    pub reset_token_ttl: i64,
}

/// Timeline pagination configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TimelineConfig {
    /// Default page size (default: 24)
    pub posts_per_page: usize,
    /// Upper bound for a requested page size
    pub max_page_size: usize,
}

/// Mail transport selector
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MailTransport {
    /// Write outgoing mail to the log
    #[default]
    Log,
    /// POST outgoing mail to an HTTP relay
    Webhook,
}

/// Mail configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub transport: MailTransport,
    /// From address
    pub sender: String,
    /// Relay endpoint for the webhook transport
    pub webhook_url: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset
    pub fn filter_directive(&self) -> String {
        let level = self.level.to_ascii_lowercase();
        format!("microblog={level},tower_http={level}")
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (MICROBLOG__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 5000)?
            .set_default("server.domain", "localhost:5000")?
            .set_default("server.protocol", "http")?
            .set_default("database.path", "data/app.db")?
            .set_default("auth.session_max_age", 86400)?
            .set_default("auth.remember_max_age", 2_592_000)?
            .set_default("auth.reset_token_ttl", 600)?
            .set_default("timeline.posts_per_page", 24)?
            .set_default("timeline.max_page_size", 100)?
            .set_default("mail.transport", "log")?
            .set_default("mail.sender", "no-reply@localhost")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("MICROBLOG")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Log once at startup when cookies go out without `Secure`
    pub fn warn_if_insecure_cookies(&self) {
        if !self.should_use_secure_cookies() {
            tracing::warn!(
                host = %normalized_server_host(&self.server.domain),
                protocol = %self.server.protocol,
                "Using insecure session cookies for local development"
            );
        }
    }

    pub fn should_use_secure_cookies(&self) -> bool {
        self.server.protocol.eq_ignore_ascii_case("https")
            || !is_local_server_domain(&self.server.domain)
    }

    pub(crate) fn validate(&self) -> Result<(), crate::error::AppError> {
        use crate::error::AppError;

        const MIN_SECRET_KEY_BYTES: usize = 32;

        if self.auth.secret_key.len() < MIN_SECRET_KEY_BYTES {
            return Err(AppError::Config(format!(
                "auth.secret_key must be at least {} bytes",
                MIN_SECRET_KEY_BYTES
            )));
        }

        for (name, value) in [
            ("auth.session_max_age", self.auth.session_max_age),
            ("auth.remember_max_age", self.auth.remember_max_age),
            ("auth.reset_token_ttl", self.auth.reset_token_ttl),
        ] {
            if value <= 0 {
                return Err(AppError::Config(format!("{name} must be greater than 0")));
            }
        }

        if self.timeline.posts_per_page == 0 || self.timeline.max_page_size == 0 {
            return Err(AppError::Config(
                "timeline page sizes must be greater than 0".to_string(),
            ));
        }

        if self.mail.transport == MailTransport::Webhook {
            let url = self.mail.webhook_url.as_deref().ok_or_else(|| {
                AppError::Config(
                    "mail.webhook_url is required when mail.transport=webhook".to_string(),
                )
            })?;
            url::Url::parse(url)
                .map_err(|e| AppError::Config(format!("mail.webhook_url is invalid: {e}")))?;
        }

        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(AppError::Config(format!(
                "logging.level is invalid: {}",
                self.logging.level
            )));
        }

        if !matches!(
            self.logging.format.to_ascii_lowercase().as_str(),
            "pretty" | "json"
        ) {
            return Err(AppError::Config(
                "logging.format must be pretty or json".to_string(),
            ));
        }

        if self.should_use_secure_cookies()
            && !self.server.protocol.eq_ignore_ascii_case("https")
        {
            return Err(AppError::Config(
                "server.protocol must be https for non-local server domains".to_string(),
            ));
        }

        Ok(())
    }
}

fn normalized_server_host(domain: &str) -> String {
    let trimmed = domain.trim();
    let parsed_host = url::Url::parse(&format!("http://{trimmed}"))
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()));
    let host = parsed_host.unwrap_or_else(|| trimmed.to_string());
    host.trim_end_matches('.').to_ascii_lowercase()
}

fn is_local_server_domain(domain: &str) -> bool {
    let host = normalized_server_host(domain);
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    let host = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback() || ip.is_unspecified();
    }

    false
}
