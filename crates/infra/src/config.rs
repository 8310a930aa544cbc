//! Configuration management.
//!
//! Sources, later ones overriding earlier ones:
//! - built-in defaults
//! - an optional `classbook.toml` in the working directory
//! - environment variables prefixed with `CLASSBOOK__`
//!   (e.g. `CLASSBOOK__BOOKING__CANCELLATION_DEADLINE_HOURS=6`)
//!
//! A `.env` file is loaded into the process environment first when present.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use classbook_auth::PasswordPolicy;
use classbook_booking::BookingPolicy;
use classbook_observability::ObservabilityConfig;

const ENV_PREFIX: &str = "CLASSBOOK";

/// Upper bound for either booking deadline (one year).
pub const MAX_DEADLINE_HOURS: i64 = 24 * 365;

/// Upper bound for the access-token lifetime (thirty days).
pub const MAX_TOKEN_TTL_MINUTES: i64 = 60 * 24 * 30;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub booking: BookingConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Postgres connection URL.
    #[serde(default = "default_database_url")]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Use Postgres; otherwise the process keeps everything in memory.
    #[serde(default)]
    pub use_postgres: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AuthConfig {
    /// HMAC secret for token signing.
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,

    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: i64,

    #[serde(default = "default_password_min_length")]
    pub password_min_length: usize,

    #[serde(default = "default_true")]
    pub password_require_uppercase: bool,

    #[serde(default = "default_true")]
    pub password_require_lowercase: bool,

    #[serde(default = "default_true")]
    pub password_require_digit: bool,

    /// Administrator created at startup when no account has this email yet.
    #[serde(default)]
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BootstrapAdmin {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BookingConfig {
    #[serde(default = "default_booking_deadline_hours")]
    pub booking_deadline_hours: i64,

    #[serde(default = "default_cancellation_deadline_hours")]
    pub cancellation_deadline_hours: i64,

    #[serde(default)]
    pub reject_overlapping_bookings: bool,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_database_url() -> String {
    "postgres://localhost/classbook".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_jwt_secret() -> String {
    "dev-secret".to_string()
}

fn default_token_ttl_minutes() -> i64 {
    30
}

fn default_password_min_length() -> usize {
    8
}

fn default_true() -> bool {
    true
}

fn default_booking_deadline_hours() -> i64 {
    2
}

fn default_cancellation_deadline_hours() -> i64 {
    4
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            use_postgres: false,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            token_ttl_minutes: default_token_ttl_minutes(),
            password_min_length: default_password_min_length(),
            password_require_uppercase: true,
            password_require_lowercase: true,
            password_require_digit: true,
            bootstrap_admin: None,
        }
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            booking_deadline_hours: default_booking_deadline_hours(),
            cancellation_deadline_hours: default_cancellation_deadline_hours(),
            reject_overlapping_bookings: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from `.env`, `classbook.toml` and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        // A missing .env is normal outside development.
        let _ = dotenvy::dotenv();

        let config: Self = Config::builder()
            .add_source(File::with_name("classbook").required(false))
            .add_source(environment())
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific file, still honouring environment overrides.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .add_source(File::with_name(path))
            .add_source(environment())
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the policies cannot represent.
    ///
    /// Deadlines must lie in `0..=MAX_DEADLINE_HOURS` and the token lifetime
    /// in `1..=MAX_TOKEN_TTL_MINUTES`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let booking = &self.booking;
        for (name, hours) in [
            ("booking.booking_deadline_hours", booking.booking_deadline_hours),
            ("booking.cancellation_deadline_hours", booking.cancellation_deadline_hours),
        ] {
            if !(0..=MAX_DEADLINE_HOURS).contains(&hours) {
                return Err(ConfigError::Message(format!(
                    "{name} must be between 0 and {MAX_DEADLINE_HOURS}, got {hours}"
                )));
            }
        }
        let ttl = self.auth.token_ttl_minutes;
        if !(1..=MAX_TOKEN_TTL_MINUTES).contains(&ttl) {
            return Err(ConfigError::Message(format!(
                "auth.token_ttl_minutes must be between 1 and {MAX_TOKEN_TTL_MINUTES}, got {ttl}"
            )));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.auth.token_ttl_minutes)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

impl From<&BookingConfig> for BookingPolicy {
    fn from(config: &BookingConfig) -> Self {
        BookingPolicy {
            reject_overlapping_bookings: config.reject_overlapping_bookings,
            ..BookingPolicy::from_hours(
                config.booking_deadline_hours,
                config.cancellation_deadline_hours,
            )
        }
    }
}

impl From<&AuthConfig> for PasswordPolicy {
    fn from(config: &AuthConfig) -> Self {
        PasswordPolicy {
            min_length: config.password_min_length,
            require_uppercase: config.password_require_uppercase,
            require_lowercase: config.password_require_lowercase,
            require_digit: config.password_require_digit,
        }
    }
}
