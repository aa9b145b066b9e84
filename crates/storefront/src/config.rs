//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional.
//!
//! - `SUQ_HOST` - Bind address for the mock API (default: 127.0.0.1)
//! - `SUQ_PORT` - Listen port for the mock API (default: 3001)
//! - `SUQ_API_URL` - Base URL of the catalog/checkout API (default: <http://localhost:3001>)
//! - `SUQ_CURRENCY` - Display currency (default: ETB)
//! - `SUQ_DELIVERY_FEE` - Flat delivery fee per order (default: 50.00)
//! - `SUQ_CHECKOUT_MODE` - `simulated` or `remote` (default: simulated)
//! - `SUQ_CHECKOUT_DELAY_MS` - Confirmation delay of the simulated gateway (default: 1500)
//! - `SUQ_CHECKOUT_API_KEY` - Bearer token for the remote checkout API
//! - `SUQ_SCAN_TIMEOUT_SECS` - Seconds before a scan offers manual continuation (default: 8)
//! - `SUQ_SCAN_FALLBACK_PRODUCT` - Product opened by manual continuation (default: prod4)
//! - `SUQ_CLEAR_CART_ON_SUCCESS` - Empty the cart after a confirmed payment (default: false)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::SecretString;
use suq_core::{CurrencyCode, ProductId};
use thiserror::Error;
use url::Url;

use crate::cart::DEFAULT_DELIVERY_FEE;
use crate::scan::{DEFAULT_FALLBACK_PRODUCT, DEFAULT_SCAN_TIMEOUT};

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
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// How checkouts are confirmed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CheckoutMode {
    /// Confirm locally after a fixed delay.
    #[default]
    Simulated,
    /// Submit to the checkout API at `SUQ_API_URL`.
    Remote,
}

impl FromStr for CheckoutMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simulated" => Ok(Self::Simulated),
            "remote" => Ok(Self::Remote),
            other => Err(format!("expected 'simulated' or 'remote', got '{other}'")),
        }
    }
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the mock API to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Base URL of the catalog/checkout API
    pub api_url: Url,
    /// Checkout gateway configuration
    pub checkout: CheckoutConfig,
    /// Cart, scan and payment behavior of a shopping session
    pub session: SessionConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Checkout gateway configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct CheckoutConfig {
    pub mode: CheckoutMode,
    /// Confirmation delay of the simulated gateway
    pub simulated_delay: Duration,
    /// Bearer token for the remote checkout API
    pub api_key: Option<SecretString>,
}

impl fmt::Debug for CheckoutConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckoutConfig")
            .field("mode", &self.mode)
            .field("simulated_delay", &self.simulated_delay)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Behavior of a shopping session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub currency: CurrencyCode,
    pub delivery_fee: Decimal,
    pub scan_timeout: Duration,
    pub scan_fallback_product: ProductId,
    pub clear_cart_on_success: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            currency: CurrencyCode::default(),
            delivery_fee: DEFAULT_DELIVERY_FEE,
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            scan_fallback_product: ProductId::new(DEFAULT_FALLBACK_PRODUCT),
            clear_cart_on_success: false,
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is malformed or the checkout API
    /// key fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`StorefrontConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let host = env.parse_or("SUQ_HOST", IpAddr::from([127, 0, 0, 1]))?;
        let port = env.parse_or("SUQ_PORT", 3001)?;
        let api_url = env.parse_or_str::<Url>("SUQ_API_URL", "http://localhost:3001")?;

        let checkout = CheckoutConfig::from_env(&env)?;
        let session = SessionConfig::from_env(&env)?;

        Ok(Self {
            host,
            port,
            api_url,
            checkout,
            session,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl CheckoutConfig {
    fn from_env(env: &Env<'_>) -> Result<Self, ConfigError> {
        let mode = env.parse_or("SUQ_CHECKOUT_MODE", CheckoutMode::Simulated)?;
        let delay_ms = env.parse_or("SUQ_CHECKOUT_DELAY_MS", 1500_u64)?;
        let api_key = env
            .optional("SUQ_CHECKOUT_API_KEY")
            .map(|key| {
                validate_secret_strength(&key, "SUQ_CHECKOUT_API_KEY")?;
                Ok::<_, ConfigError>(SecretString::from(key))
            })
            .transpose()?;

        Ok(Self {
            mode,
            simulated_delay: Duration::from_millis(delay_ms),
            api_key,
        })
    }
}

impl SessionConfig {
    fn from_env(env: &Env<'_>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let currency = env.parse_or("SUQ_CURRENCY", defaults.currency)?;
        let delivery_fee = env.parse_or("SUQ_DELIVERY_FEE", defaults.delivery_fee)?;
        if delivery_fee <= Decimal::ZERO {
            return Err(ConfigError::InvalidEnvVar(
                "SUQ_DELIVERY_FEE".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let scan_timeout_secs =
            env.parse_or("SUQ_SCAN_TIMEOUT_SECS", defaults.scan_timeout.as_secs())?;
        if scan_timeout_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "SUQ_SCAN_TIMEOUT_SECS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let scan_fallback_product = env
            .optional("SUQ_SCAN_FALLBACK_PRODUCT")
            .map_or(defaults.scan_fallback_product, ProductId::new);
        let clear_cart_on_success = env
            .optional("SUQ_CLEAR_CART_ON_SUCCESS")
            .map(|value| parse_bool("SUQ_CLEAR_CART_ON_SUCCESS", &value))
            .transpose()?
            .unwrap_or(defaults.clear_cart_on_success);

        Ok(Self {
            currency,
            delivery_fee,
            scan_timeout: Duration::from_secs(scan_timeout_secs),
            scan_fallback_product,
            clear_cart_on_success,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Environment lookup with typed accessors.
struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    /// Get an optional variable, treating blank values as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    /// Parse a variable, falling back to `default` when unset.
    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.optional(key).map_or(Ok(default), |value| parse_value(key, &value))
    }

    /// Parse a variable, falling back to parsing `default` when unset.
    fn parse_or_str<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let value = self.optional(key).unwrap_or_else(|| default.to_string());
        parse_value(key, &value)
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("expected a boolean, got '{other}'"),
        )),
    }
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

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated key."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<StorefrontConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        StorefrontConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();

        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3001");
        assert_eq!(config.api_url.as_str(), "http://localhost:3001/");
        assert_eq!(config.checkout.mode, CheckoutMode::Simulated);
        assert_eq!(config.checkout.simulated_delay, Duration::from_millis(1500));
        assert!(config.checkout.api_key.is_none());
        assert_eq!(config.session, SessionConfig::default());
        assert_eq!(config.session.delivery_fee.to_string(), "50.00");
        assert_eq!(config.session.scan_fallback_product.as_str(), "prod4");
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("SUQ_PORT", "8080"),
            ("SUQ_API_URL", "https://api.suq.et"),
            ("SUQ_CURRENCY", "usd"),
            ("SUQ_DELIVERY_FEE", "35.5"),
            ("SUQ_CHECKOUT_MODE", "Remote"),
            ("SUQ_SCAN_TIMEOUT_SECS", "3"),
            ("SUQ_SCAN_FALLBACK_PRODUCT", "prod1"),
            ("SUQ_CLEAR_CART_ON_SUCCESS", "true"),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.api_url.host_str(), Some("api.suq.et"));
        assert_eq!(config.session.currency, CurrencyCode::USD);
        assert_eq!(config.session.delivery_fee, Decimal::new(355, 1));
        assert_eq!(config.checkout.mode, CheckoutMode::Remote);
        assert_eq!(config.session.scan_timeout, Duration::from_secs(3));
        assert_eq!(config.session.scan_fallback_product.as_str(), "prod1");
        assert!(config.session.clear_cart_on_success);
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = load(&[("SUQ_PORT", "  "), ("SENTRY_DSN", "")]).unwrap();
        assert_eq!(config.port, 3001);
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            load(&[("SUQ_PORT", "not-a-port")]).unwrap_err(),
            ConfigError::InvalidEnvVar(key, _) if key == "SUQ_PORT"
        ));
        assert!(load(&[("SUQ_CHECKOUT_MODE", "instant")]).is_err());
        assert!(load(&[("SUQ_DELIVERY_FEE", "-5")]).is_err());
        assert!(load(&[("SUQ_DELIVERY_FEE", "0")]).is_err());
        assert!(load(&[("SUQ_DELIVERY_FEE", "0.00")]).is_err());
        assert!(load(&[("SUQ_SCAN_TIMEOUT_SECS", "0")]).is_err());
        assert!(load(&[("SUQ_CLEAR_CART_ON_SUCCESS", "maybe")]).is_err());
        assert!(load(&[("SUQ_API_URL", "not a url")]).is_err());
    }

    #[test]
    fn test_checkout_api_key_is_validated() {
        let err = load(&[("SUQ_CHECKOUT_API_KEY", "changeme123")]).unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));

        let config = load(&[("SUQ_CHECKOUT_API_KEY", "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6")]).unwrap();
        assert_eq!(
            config.checkout.api_key.unwrap().expose_secret(),
            "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6"
        );
    }

    #[test]
    fn test_checkout_config_debug_redacts_key() {
        let config = CheckoutConfig {
            mode: CheckoutMode::Remote,
            simulated_delay: Duration::from_millis(1500),
            api_key: Some(SecretString::from("super_secret_checkout_key")),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("Remote"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_checkout_key"));
    }

    #[test]
    fn test_shannon_entropy() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("aB3$xY9!mK2@nL5#") > 3.3);
    }

    #[test]
    fn test_validate_secret_strength() {
        assert!(validate_secret_strength("your-api-key-here", "TEST_VAR").is_err());
        assert!(validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR").is_err());
        assert!(validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR").is_ok());
    }
}
