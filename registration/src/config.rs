//! Configuration management for the registration server.
//!
//! Loads configuration from environment variables with sensible defaults.

use hub_postgres::PostgresConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database pool
    pub postgres: PostgresConfig,
    /// HTTP and metrics listeners
    pub server: ServerConfig,
    /// Payment gateway selection and credentials
    pub payment: PaymentConfig,
    /// Reservation hold and lock timing
    pub checkout: CheckoutConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Metrics server host (for Prometheus scraping)
    pub metrics_host: String,
    /// Metrics server port
    pub metrics_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
}

/// Which gateway implementation the server wires in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayKind {
    /// In-process mock, always approves
    Mock,
    /// Authorize.Net JSON API
    AuthorizeNet,
}

/// Authorize.Net environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizeNetEnvironment {
    /// `apitest.authorize.net`
    Sandbox,
    /// `api.authorize.net`
    Production,
}

impl AuthorizeNetEnvironment {
    /// JSON API endpoint for this environment.
    #[must_use]
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::Sandbox => "https://apitest.authorize.net/xml/v1/request.api",
            Self::Production => "https://api.authorize.net/xml/v1/request.api",
        }
    }
}

/// Payment gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Gateway implementation
    pub gateway: GatewayKind,
    /// Authorize.Net API login id
    pub api_login_id: String,
    /// Authorize.Net transaction key
    pub transaction_key: String,
    /// Sandbox or production
    pub environment: AuthorizeNetEnvironment,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Checkout timing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutConfig {
    /// How long seated attendees hold their seats
    pub reservation_hold_minutes: i64,
    /// How long to wait for the per-session lock
    pub lock_timeout_secs: u64,
}

impl CheckoutConfig {
    /// Reservation hold as a chrono duration.
    #[must_use]
    pub fn reservation_hold(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.reservation_hold_minutes)
    }

    /// Lock wait as a std duration.
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            reservation_hold_minutes: 30,
            lock_timeout_secs: 10,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            postgres: PostgresConfig::from_env(),
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(8080),
                log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
                metrics_host: env::var("METRICS_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                metrics_port: env::var("METRICS_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(9090),
                shutdown_timeout: env::var("SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            },
            payment: PaymentConfig {
                gateway: match env::var("PAYMENT_GATEWAY").as_deref() {
                    Ok("authorize_net" | "authnet") => GatewayKind::AuthorizeNet,
                    _ => GatewayKind::Mock,
                },
                api_login_id: env::var("AUTHNET_API_LOGIN_ID").unwrap_or_default(),
                transaction_key: env::var("AUTHNET_TRANSACTION_KEY").unwrap_or_default(),
                environment: match env::var("AUTHNET_ENVIRONMENT").as_deref() {
                    Ok("production") => AuthorizeNetEnvironment::Production,
                    _ => AuthorizeNetEnvironment::Sandbox,
                },
                timeout_secs: env::var("AUTHNET_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            },
            checkout: CheckoutConfig {
                reservation_hold_minutes: env::var("RESERVATION_HOLD_MINUTES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
                lock_timeout_secs: env::var("CHECKOUT_LOCK_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_defaults() {
        let checkout = CheckoutConfig::default();
        assert_eq!(checkout.reservation_hold(), chrono::Duration::minutes(30));
        assert_eq!(checkout.lock_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_authnet_endpoints() {
        assert!(AuthorizeNetEnvironment::Sandbox.endpoint().contains("apitest"));
        assert!(!AuthorizeNetEnvironment::Production.endpoint().contains("apitest"));
    }
}
