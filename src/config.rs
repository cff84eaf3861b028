//! Configuration loading and management.
//!
//! Sources, lowest precedence first: built-in defaults, a YAML file
//! (`--config`, else `todo-server/config.yaml` if present), environment
//! variables, then CLI flags applied by `main`.
//!
//! ## Environment Variables
//! - `TODO_DB_PATH` - Database path
//! - `HOST` / `PORT` - Listen address
//! - `JWT_SECRET` - Token signing secret
//! - `APPIAN_API_KEY` - Integration API key (integration routes are off when unset)
//! - `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET`, `GOOGLE_REDIRECT_URI` - Calendar OAuth client

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::auth::token::DEFAULT_TOKEN_LIFETIME_SECS;
use crate::calendar::GoogleCalendarConfig;

/// Signing secret used when none is configured. Only suitable for local use.
pub const DEV_JWT_SECRET: &str = "dev-secret-change-me";

/// Config file looked up when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "todo-server/config.yaml";

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub integration: IntegrationConfig,

    /// Calendar routes are mounted only when this is set.
    #[serde(default)]
    pub calendar: Option<GoogleCalendarConfig>,
}

/// Listener and storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Batch size used when a list request gives `batch` but no `batchSize`.
    #[serde(default = "default_batch_size")]
    pub default_batch_size: u32,

    /// Upper bound on a requested `batchSize`.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            host: default_host(),
            port: default_port(),
            default_batch_size: default_batch_size(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("todo-server/todos.db")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_batch_size() -> u32 {
    50
}

fn default_max_batch_size() -> u32 {
    1000
}

/// Token settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,

    #[serde(default = "default_token_lifetime")]
    pub token_lifetime_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            token_lifetime_secs: default_token_lifetime(),
        }
    }
}

fn default_jwt_secret() -> String {
    DEV_JWT_SECRET.to_string()
}

fn default_token_lifetime() -> i64 {
    DEFAULT_TOKEN_LIFETIME_SECS
}

/// Batch-integration surface settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrationConfig {
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Load the explicit file if given, else the default file if it exists,
    /// else defaults; then apply environment overrides.
    pub fn load_with_env(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load(DEFAULT_CONFIG_PATH)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Overlay values from an environment lookup.
    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db_path) = var("TODO_DB_PATH") {
            self.server.db_path = PathBuf::from(db_path);
        }

        if let Some(host) = var("HOST") {
            self.server.host = host;
        }

        if let Some(port) = var("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }

        if let Some(secret) = var("JWT_SECRET").filter(|s| !s.is_empty()) {
            self.auth.jwt_secret = secret;
        }

        if let Some(key) = var("APPIAN_API_KEY").filter(|s| !s.is_empty()) {
            self.integration.api_key = Some(key);
        }

        if let (Some(client_id), Some(client_secret)) =
            (var("GOOGLE_CLIENT_ID"), var("GOOGLE_CLIENT_SECRET"))
        {
            let redirect_uri = var("GOOGLE_REDIRECT_URI").unwrap_or_else(|| {
                format!(
                    "http://localhost:{}/calendar/auth/google/callback",
                    self.server.port
                )
            });
            let time_zone = self
                .calendar
                .as_ref()
                .map(|c| c.time_zone.clone())
                .unwrap_or_else(|| "America/New_York".to_string());
            self.calendar = Some(GoogleCalendarConfig {
                client_id,
                client_secret,
                redirect_uri,
                time_zone,
            });
        }
    }

    /// Whether the signing secret is still the built-in development value.
    pub fn uses_dev_secret(&self) -> bool {
        self.auth.jwt_secret == DEV_JWT_SECRET
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.server.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}
