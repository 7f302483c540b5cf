//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `STOREFRONT_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `PAYMENT_KEY_ID` - Payment gateway key id (public, handed to checkout)
//! - `PAYMENT_KEY_SECRET` - Payment gateway key secret (API auth and callback signatures)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 8080)
//! - `STOREFRONT_CURRENCY` - ISO currency for prices and payments (default: INR)
//! - `PAYMENT_API_BASE` - Gateway API base URL (default: `https://api.razorpay.com/v1`)
//! - `CORS_ALLOWED_ORIGINS` - Comma-separated origins allowed to call the API with credentials
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error event sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use amyfairy_core::CurrencyCode;

use crate::gateway::RAZORPAY_API_BASE;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Currency for catalog prices and gateway transactions
    pub currency: CurrencyCode,
    /// Payment gateway configuration
    pub payment: PaymentConfig,
    /// Origins allowed to make credentialed cross-origin requests
    pub cors_allowed_origins: Vec<String>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate
    pub sentry_sample_rate: f32,
    /// Sentry transaction sample rate
    pub sentry_traces_sample_rate: f32,
}

/// Payment gateway configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct PaymentConfig {
    /// Gateway API base URL
    pub api_base: String,
    /// Public key id
    pub key_id: String,
    /// Key secret, used for API auth and callback signatures
    pub key_secret: SecretString,
}

impl std::fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("api_base", &self.api_base)
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = get_env_or_default("STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("STOREFRONT_PORT", "8080")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_PORT".to_string(), e.to_string())
            })?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("STOREFRONT_BASE_URL".to_string(), e.to_string())
        })?;
        let session_secret = get_validated_secret("STOREFRONT_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "STOREFRONT_SESSION_SECRET")?;

        let currency = get_env_or_default("STOREFRONT_CURRENCY", "INR")
            .parse::<CurrencyCode>()
            .map_err(|e| ConfigError::InvalidEnvVar("STOREFRONT_CURRENCY".to_string(), e))?;

        let payment = PaymentConfig::from_env()?;
        let cors_allowed_origins = parse_origins(get_optional_env("CORS_ALLOWED_ORIGINS").as_deref());

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            currency,
            payment,
            cors_allowed_origins,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: get_rate("SENTRY_SAMPLE_RATE", 1.0)?,
            sentry_traces_sample_rate: get_rate("SENTRY_TRACES_SAMPLE_RATE", 0.0)?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should be marked `Secure`.
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl PaymentConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_base: get_env_or_default("PAYMENT_API_BASE", RAZORPAY_API_BASE),
            key_id: get_required_env("PAYMENT_KEY_ID")?,
            key_secret: get_validated_secret("PAYMENT_KEY_SECRET")?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    // Try primary key first (e.g., STOREFRONT_DATABASE_URL)
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    // Fallback to generic DATABASE_URL (set by Fly.io postgres attach)
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real secrets like API keys have high entropy)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

/// Split a comma-separated origin list.
fn parse_origins(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(|o| o.trim().trim_end_matches('/'))
                .filter(|o| !o.is_empty())
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// Parse a sample rate in `[0, 1]`.
fn get_rate(key: &str, default: f32) -> Result<f32, ConfigError> {
    let Some(raw) = get_optional_env(key) else {
        return Ok(default);
    };
    let rate = raw
        .parse::<f32>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !(0.0..=1.0).contains(&rate) {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be between 0.0 and 1.0".to_string(),
        ));
    }
    Ok(rate)
}
