use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::auth::identity::IdentityConfig;
use crate::billing::gateway::{GatewayConfig, GatewayKind};

/// Configuration for the directory backend
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Security configuration
    pub security: SecurityConfig,
    /// Identity provider configuration
    pub identity: IdentityConfig,
    /// Moderation configuration
    pub moderation: ModerationConfig,
    /// Billing configuration
    pub billing: BillingConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
    /// Base server URL for building links
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Enable bearer authentication (disable only for local smoke tests)
    pub enable_auth: bool,
    /// Maximum request body size in bytes
    pub max_request_size: usize,
    /// Enable CORS for the frontend origin
    pub enable_cors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Report count at which a product surfaces for moderator review
    pub report_review_threshold: usize,
}

#[derive(Debug, Clone)]
pub struct BillingConfig {
    /// Which payment gateway handles verification charges
    pub gateway: GatewayKind,
    /// ISO currency code for verification charges
    pub currency: String,
    /// Verification price in minor currency units
    pub verification_price: i64,
    /// Card processor settings
    pub card: GatewayConfig,
    /// Regional processor settings
    pub regional: GatewayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string
    pub postgres_url: String,
    /// Enable PostgreSQL (if false, state is in-memory only)
    pub postgres_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug)
    pub level: String,
    /// Enable request/response logging
    pub log_requests: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                base_url: "http://127.0.0.1:8080".to_string(),
            },
            security: SecurityConfig {
                enable_auth: true,
                max_request_size: 1024 * 1024, // 1MB
                enable_cors: true,
            },
            identity: IdentityConfig::default(),
            moderation: ModerationConfig {
                report_review_threshold: 1,
            },
            billing: BillingConfig {
                gateway: GatewayKind::Card,
                currency: "USD".to_string(),
                verification_price: 2000, // $20.00
                card: GatewayConfig {
                    api_base: "https://api.cardpay.example.com".to_string(),
                    ..Default::default()
                },
                regional: GatewayConfig {
                    api_base: "https://api.regionpay.example.com".to_string(),
                    ..Default::default()
                },
            },
            database: DatabaseConfig {
                postgres_url: "postgresql://localhost:5432/launchboard".to_string(),
                postgres_enabled: false,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                log_requests: false,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and validate it.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Server configuration
        if let Ok(host) = env::var("LAUNCHBOARD_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = env::var("LAUNCHBOARD_PORT") {
            config.server.port = port.parse().context("Invalid LAUNCHBOARD_PORT value")?;
        }
        if let Ok(base_url) = env::var("LAUNCHBOARD_BASE_URL") {
            config.server.base_url = base_url;
        }

        // Security configuration
        if let Ok(enable_auth) = env::var("LAUNCHBOARD_ENABLE_AUTH") {
            config.security.enable_auth = enable_auth
                .parse()
                .context("Invalid LAUNCHBOARD_ENABLE_AUTH value")?;
        }
        if let Ok(size) = env::var("LAUNCHBOARD_MAX_REQUEST_SIZE") {
            config.security.max_request_size = size
                .parse()
                .context("Invalid LAUNCHBOARD_MAX_REQUEST_SIZE value")?;
        }
        if let Ok(enable_cors) = env::var("LAUNCHBOARD_ENABLE_CORS") {
            config.security.enable_cors = enable_cors
                .parse()
                .context("Invalid LAUNCHBOARD_ENABLE_CORS value")?;
        }

        // Identity provider
        if let Ok(url) = env::var("LAUNCHBOARD_IDENTITY_USERINFO_URL") {
            config.identity.userinfo_url = url;
        }
        if let Ok(timeout) = env::var("LAUNCHBOARD_IDENTITY_TIMEOUT_SECS") {
            config.identity.timeout_secs = timeout
                .parse()
                .context("Invalid LAUNCHBOARD_IDENTITY_TIMEOUT_SECS value")?;
        }
        if let Ok(require_https) = env::var("LAUNCHBOARD_IDENTITY_REQUIRE_HTTPS") {
            config.identity.require_https = require_https
                .parse()
                .context("Invalid LAUNCHBOARD_IDENTITY_REQUIRE_HTTPS value")?;
        }

        // Moderation
        if let Ok(threshold) = env::var("LAUNCHBOARD_REPORT_REVIEW_THRESHOLD") {
            config.moderation.report_review_threshold = threshold
                .parse()
                .context("Invalid LAUNCHBOARD_REPORT_REVIEW_THRESHOLD value")?;
        }

        // Billing
        if let Ok(gateway) = env::var("LAUNCHBOARD_PAYMENT_GATEWAY") {
            config.billing.gateway = GatewayKind::from_str(&gateway)
                .map_err(|e| anyhow::anyhow!("Invalid LAUNCHBOARD_PAYMENT_GATEWAY: {e}"))?;
        }
        if let Ok(currency) = env::var("LAUNCHBOARD_CURRENCY") {
            config.billing.currency = currency;
        }
        if let Ok(price) = env::var("LAUNCHBOARD_VERIFICATION_PRICE") {
            config.billing.verification_price = price
                .parse()
                .context("Invalid LAUNCHBOARD_VERIFICATION_PRICE value")?;
        }
        if let Ok(api_base) = env::var("LAUNCHBOARD_CARD_API_BASE") {
            config.billing.card.api_base = api_base;
        }
        if let Ok(secret) = env::var("LAUNCHBOARD_CARD_SECRET_KEY") {
            config.billing.card.secret_key = secret;
        }
        if let Ok(api_base) = env::var("LAUNCHBOARD_REGIONAL_API_BASE") {
            config.billing.regional.api_base = api_base;
        }
        if let Ok(secret) = env::var("LAUNCHBOARD_REGIONAL_SECRET_KEY") {
            config.billing.regional.secret_key = secret;
        }

        // Database configuration
        if let Ok(url) = env::var("LAUNCHBOARD_POSTGRES_URL") {
            config.database.postgres_url = url;
        }
        if let Ok(enabled) = env::var("LAUNCHBOARD_POSTGRES_ENABLED") {
            config.database.postgres_enabled = enabled
                .parse()
                .context("Invalid LAUNCHBOARD_POSTGRES_ENABLED value")?;
        }

        // Logging configuration
        if let Ok(level) = env::var("LAUNCHBOARD_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(log_requests) = env::var("LAUNCHBOARD_LOG_REQUESTS") {
            config.logging.log_requests = log_requests
                .parse()
                .context("Invalid LAUNCHBOARD_LOG_REQUESTS value")?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate invariants the rest of the system assumes.
    pub fn validate(&self) -> Result<()> {
        if self.billing.verification_price <= 0 {
            return Err(anyhow::anyhow!(
                "Verification price must be positive, got {}",
                self.billing.verification_price
            ));
        }

        if self.moderation.report_review_threshold == 0 {
            return Err(anyhow::anyhow!(
                "Report review threshold must be at least 1"
            ));
        }

        let selected = match self.billing.gateway {
            GatewayKind::Card => &self.billing.card,
            GatewayKind::Regional => &self.billing.regional,
        };
        if selected.api_base.is_empty() {
            return Err(anyhow::anyhow!(
                "Selected payment gateway has no API base configured"
            ));
        }

        Ok(())
    }

    /// Settings for the gateway selected by configuration.
    pub fn selected_gateway(&self) -> &GatewayConfig {
        match self.billing.gateway {
            GatewayKind::Card => &self.billing.card,
            GatewayKind::Regional => &self.billing.regional,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_price() {
        let mut config = AppConfig::default();
        config.billing.verification_price = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        let mut config = AppConfig::default();
        config.moderation.report_review_threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_selected_gateway_follows_kind() {
        let mut config = AppConfig::default();
        config.billing.gateway = GatewayKind::Regional;
        assert_eq!(
            config.selected_gateway().api_base,
            config.billing.regional.api_base
        );
    }
}
