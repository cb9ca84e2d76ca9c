//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

const DEFAULT_MAX_BODY_BYTES: usize = 20 * 1024 * 1024;
const DEFAULT_SMTP_PORT: u16 = 465;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// How to reach the SMTP server that delivers notifications.
#[derive(Clone, Debug, PartialEq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// TLS from the first byte. Off only for local plain-text relays.
    pub secure: bool,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Absent means the service runs on the in-memory store.
    pub database_url: Option<String>,
    pub log_level: Level,
    /// Origin of the front end; emailed links point here.
    pub frontend_url: String,
    pub pdf_storage_path: PathBuf,
    /// Absent means notifications are only logged.
    pub smtp: Option<SmtpSettings>,
    pub email_sender: String,
    pub token_secret: Option<String>,
    pub cors_origin: String,
    pub max_body_bytes: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // --- Server and storage ---
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let pdf_storage_path = lookup("PDF_STORAGE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./storage"));

        // --- Links and notifications ---
        let frontend_url = lookup("FRONTEND_URL").unwrap_or_else(|| "http://localhost:3000".to_string());
        if !frontend_url.starts_with("http://") && !frontend_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "FRONTEND_URL".to_string(),
                format!("'{}' is not an http(s) URL", frontend_url),
            ));
        }
        let smtp = smtp_settings(&lookup)?;
        let email_sender = lookup("EMAIL_SENDER").unwrap_or_else(|| "no-reply@localhost".to_string());

        // --- Security ---
        let token_secret = lookup("TOKEN_SECRET").filter(|v| !v.is_empty());
        let cors_origin = lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());
        let max_body_bytes = match lookup("MAX_BODY_BYTES") {
            Some(raw) => raw.parse::<usize>().map_err(|e| {
                ConfigError::InvalidValue("MAX_BODY_BYTES".to_string(), e.to_string())
            })?,
            None => DEFAULT_MAX_BODY_BYTES,
        };

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            frontend_url,
            pdf_storage_path,
            smtp,
            email_sender,
            token_secret,
            cors_origin,
            max_body_bytes,
        })
    }
}

/// Reads `SMTP_*`. Without `SMTP_HOST` there is no SMTP server.
fn smtp_settings(lookup: &impl Fn(&str) -> Option<String>) -> Result<Option<SmtpSettings>, ConfigError> {
    let Some(host) = lookup("SMTP_HOST").filter(|v| !v.trim().is_empty()) else {
        return Ok(None);
    };
    let port = match lookup("SMTP_PORT") {
        Some(raw) => raw
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidValue("SMTP_PORT".to_string(), e.to_string()))?,
        None => DEFAULT_SMTP_PORT,
    };
    let secure = match lookup("SMTP_SECURE").as_deref() {
        None | Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        Some(other) => {
            return Err(ConfigError::InvalidValue(
                "SMTP_SECURE".to_string(),
                format!("'{}' is not true or false", other),
            ))
        }
    };
    Ok(Some(SmtpSettings {
        host,
        port,
        username: lookup("SMTP_USERNAME").filter(|v| !v.is_empty()),
        password: lookup("SMTP_PASSWORD").filter(|v| !v.is_empty()),
        secure,
    }))
}
