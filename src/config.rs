//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (override)
//!
//! The result is validated once at startup and then shared read-only
//! for the lifetime of the process.

use serde::Deserialize;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub discord: DiscordConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 3002)
    pub port: u16,
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Discord OAuth application settings
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Callback URL registered with Discord (points at `/redirect`)
    pub redirect_uri: String,
    /// Base URL for the token and profile endpoints
    #[serde(default = "default_discord_api_base_url")]
    pub api_base_url: String,
    /// Browser-facing authorization endpoint
    #[serde(default = "default_discord_authorize_url")]
    pub authorize_url: String,
    #[serde(default = "default_discord_scope")]
    pub scope: String,
    /// Upper bound on each outbound provider request
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

fn default_discord_api_base_url() -> String {
    "https://discord.com".to_string()
}

fn default_discord_authorize_url() -> String {
    "https://discord.com/oauth2/authorize".to_string()
}

fn default_discord_scope() -> String {
    "identify".to_string()
}

fn default_request_timeout_seconds() -> u64 {
    10
}

/// Signed session cookie settings
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// HMAC secret (32+ bytes)
    pub jwt_secret: String,
    /// Salt mixed into the signing key (16+ bytes)
    pub jwt_salt: String,
    #[serde(default = "default_issuer")]
    pub issuer: String,
    #[serde(default = "default_audience")]
    pub audience: String,
    #[serde(default = "default_access_cookie_name")]
    pub access_cookie_name: String,
    #[serde(default = "default_refresh_cookie_name")]
    pub refresh_cookie_name: String,
    /// Access token max age in seconds (default: 900 = 15 minutes)
    #[serde(default = "default_access_max_age")]
    pub access_max_age: i64,
    /// Refresh token max age in seconds (default: 2592000 = 30 days)
    #[serde(default = "default_refresh_max_age")]
    pub refresh_max_age: i64,
}

fn default_issuer() -> String {
    "auth".to_string()
}

fn default_audience() -> String {
    "wingbox".to_string()
}

fn default_access_cookie_name() -> String {
    "wingbox_access_token".to_string()
}

fn default_refresh_cookie_name() -> String {
    "wingbox_refresh_token".to_string()
}

fn default_access_max_age() -> i64 {
    900
}

fn default_refresh_max_age() -> i64 {
    2_592_000
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
    const LEVELS: [&'static str; 5] = ["trace", "debug", "info", "warn", "error"];

    /// Filter used when `RUST_LOG` is not set
    pub fn filter_directives(&self) -> String {
        format!("wingbox={},tower_http=debug", self.level.to_ascii_lowercase())
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

/// Unprefixed variable names accepted for deployments that predate the
/// `WINGBOX__` scheme.
const LEGACY_ENV_OVERRIDES: [(&str, &str); 5] = [
    ("discord.client_id", "DISCORD_CLIENT_ID"),
    ("discord.client_secret", "DISCORD_CLIENT_SECRET"),
    ("discord.redirect_uri", "REDIRECT_URI"),
    ("session.jwt_secret", "JWT_SECRET"),
    ("session.jwt_salt", "JWT_SALT"),
];

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (WINGBOX_*)
    /// 5. Legacy variables (DISCORD_CLIENT_ID, JWT_SECRET, ...)
    ///
    /// # Errors
    /// Returns error if configuration is missing or invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let mut builder = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3002)?
            .set_default("database.path", "db/app.db")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("WINGBOX")
                    .separator("__")
                    .try_parsing(true),
            );

        for (key, var) in LEGACY_ENV_OVERRIDES {
            let value = std::env::var(var).ok().filter(|v| !v.is_empty());
            builder = builder.set_override_option(key, value)?;
        }

        let app_config: Self = builder
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub(crate) fn validate(&self) -> Result<(), crate::error::AppError> {
        use crate::error::AppError;

        const MIN_JWT_SECRET_BYTES: usize = 32;
        const MIN_JWT_SALT_BYTES: usize = 16;

        let required = [
            ("discord.client_id", &self.discord.client_id),
            ("discord.client_secret", &self.discord.client_secret),
            ("discord.redirect_uri", &self.discord.redirect_uri),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(AppError::Config(format!("{key} must not be empty")));
            }
        }

        for (key, value) in [
            ("discord.redirect_uri", &self.discord.redirect_uri),
            ("discord.api_base_url", &self.discord.api_base_url),
            ("discord.authorize_url", &self.discord.authorize_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| AppError::Config(format!("{key} is not a valid URL: {e}")))?;
        }

        if self.discord.request_timeout_seconds == 0 {
            return Err(AppError::Config(
                "discord.request_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.session.jwt_secret.len() < MIN_JWT_SECRET_BYTES {
            return Err(AppError::Config(format!(
                "session.jwt_secret must be at least {MIN_JWT_SECRET_BYTES} bytes"
            )));
        }

        if self.session.jwt_salt.len() < MIN_JWT_SALT_BYTES {
            return Err(AppError::Config(format!(
                "session.jwt_salt must be at least {MIN_JWT_SALT_BYTES} bytes"
            )));
        }

        if self.session.access_max_age <= 0 || self.session.refresh_max_age <= 0 {
            return Err(AppError::Config(
                "session max ages must be greater than 0".to_string(),
            ));
        }

        if self.session.access_cookie_name == self.session.refresh_cookie_name {
            return Err(AppError::Config(
                "session access and refresh cookie names must differ".to_string(),
            ));
        }

        if !LoggingConfig::LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(AppError::Config(format!(
                "logging.level must be one of {}",
                LoggingConfig::LEVELS.join(", ")
            )));
        }

        if !(self.logging.is_json() || self.logging.format.eq_ignore_ascii_case("pretty")) {
            return Err(AppError::Config(
                "logging.format must be \"pretty\" or \"json\"".to_string(),
            ));
        }

        if self.session.access_max_age >= self.session.refresh_max_age {
            tracing::warn!(
                access_max_age = self.session.access_max_age,
                refresh_max_age = self.session.refresh_max_age,
                "Access tokens outlive refresh tokens"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3002,
            },
            database: DatabaseConfig {
                path: PathBuf::from("/tmp/wingbox-test.db"),
            },
            discord: DiscordConfig {
                client_id: "discord-client-id".to_string(),
                client_secret: "discord-client-secret".to_string(),
                redirect_uri: "http://localhost:3002/redirect".to_string(),
                api_base_url: default_discord_api_base_url(),
                authorize_url: default_discord_authorize_url(),
                scope: default_discord_scope(),
                request_timeout_seconds: 10,
            },
            session: SessionConfig {
                jwt_secret: "x".repeat(32),
                jwt_salt: "0123456789abcdef".to_string(),
                issuer: default_issuer(),
                audience: default_audience(),
                access_cookie_name: default_access_cookie_name(),
                refresh_cookie_name: default_refresh_cookie_name(),
                access_max_age: default_access_max_age(),
                refresh_max_age: default_refresh_max_age(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    #[test]
    fn validate_accepts_complete_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_short_jwt_secret() {
        let mut config = valid_config();
        config.session.jwt_secret = "short-secret".to_string();

        let error = config
            .validate()
            .expect_err("jwt secret shorter than 32 bytes must fail");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message)
                if message.contains("session.jwt_secret")
        ));
    }

    #[test]
    fn validate_rejects_empty_salt() {
        let mut config = valid_config();
        config.session.jwt_salt = String::new();

        let error = config.validate().expect_err("empty salt must fail");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message) if message.contains("session.jwt_salt")
        ));
    }

    #[test]
    fn validate_rejects_non_positive_max_age() {
        let mut config = valid_config();
        config.session.access_max_age = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_missing_client_secret() {
        let mut config = valid_config();
        config.discord.client_secret = "  ".to_string();

        let error = config.validate().expect_err("blank client secret must fail");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message)
                if message.contains("discord.client_secret")
        ));
    }

    #[test]
    fn validate_rejects_unparseable_redirect_uri() {
        let mut config = valid_config();
        config.discord.redirect_uri = "not a url".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn logging_settings_drive_the_subscriber() {
        let mut config = valid_config();
        config.logging.level = "DEBUG".to_string();
        config.logging.format = "json".to_string();

        assert!(config.validate().is_ok());
        assert_eq!(
            config.logging.filter_directives(),
            "wingbox=debug,tower_http=debug"
        );
        assert!(config.logging.is_json());
        assert!(!valid_config().logging.is_json());
    }

    #[test]
    fn validate_rejects_unknown_logging_settings() {
        let mut config = valid_config();
        config.logging.level = "verbose".to_string();
        assert!(matches!(
            config.validate(),
            Err(crate::error::AppError::Config(message)) if message.contains("logging.level")
        ));

        let mut config = valid_config();
        config.logging.format = "xml".to_string();
        assert!(matches!(
            config.validate(),
            Err(crate::error::AppError::Config(message)) if message.contains("logging.format")
        ));
    }
}
