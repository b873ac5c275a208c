//! Payment gateway boundary.
//!
//! Two interchangeable gateways are supported: a card processor and a
//! regional mobile-money processor. The verification workflow depends only
//! on the `PaymentGateway` trait; which implementation runs is a
//! configuration decision, not a call-site branch.

use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Gateway selection, from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayKind {
    Card,
    Regional,
}

impl std::str::FromStr for GatewayKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "card" => Ok(GatewayKind::Card),
            "regional" => Ok(GatewayKind::Regional),
            other => Err(format!("Unknown gateway kind: {other}")),
        }
    }
}

/// Result of `create_charge`: the external reference plus whatever
/// client-side continuation the gateway issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeIntent {
    pub reference: String,
    pub client_secret: Option<String>,
    pub redirect_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GatewayError(pub String);

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for GatewayError {}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Initiate a charge with the external processor. Asynchronous
    /// confirmation arrives later through the confirm endpoint.
    async fn create_charge(
        &self,
        amount: i64,
        currency: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<ChargeIntent, GatewayError>;
}

/// Shared settings for an HTTP-backed gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_base: String,
    pub secret_key: String,
    pub timeout_secs: u64,
    pub require_https: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            secret_key: String::new(),
            timeout_secs: 30,
            require_https: true,
        }
    }
}

fn build_client(config: &GatewayConfig) -> AnyResult<(Client, Url)> {
    let api_base = Url::parse(&config.api_base).context("Invalid gateway API base URL")?;
    if config.require_https && api_base.scheme() != "https" {
        return Err(anyhow::anyhow!(
            "HTTPS is required but gateway URL is not HTTPS: {}",
            api_base
        ));
    }

    let client = Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent("launchboard/0.3")
        .build()
        .context("Failed to create gateway HTTP client")?;

    Ok((client, api_base))
}

#[derive(Serialize)]
struct ChargeRequest<'a> {
    amount: i64,
    currency: &'a str,
    metadata: &'a HashMap<String, String>,
}

#[derive(Deserialize)]
struct CardChargeResponse {
    id: String,
    client_secret: String,
}

/// Card processor: returns a client secret the frontend finishes the
/// charge with.
pub struct CardGateway {
    client: Client,
    api_base: Url,
    secret_key: String,
}

impl CardGateway {
    pub fn new(config: &GatewayConfig) -> AnyResult<Self> {
        let (client, api_base) = build_client(config)?;
        Ok(Self {
            client,
            api_base,
            secret_key: config.secret_key.clone(),
        })
    }
}

#[async_trait]
impl PaymentGateway for CardGateway {
    async fn create_charge(
        &self,
        amount: i64,
        currency: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<ChargeIntent, GatewayError> {
        let url = self
            .api_base
            .join("v1/payment_intents")
            .map_err(|e| GatewayError(e.to_string()))?;

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.secret_key)
            .json(&ChargeRequest {
                amount,
                currency,
                metadata,
            })
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Card gateway unreachable");
                GatewayError("card processor unreachable".to_string())
            })?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Card gateway rejected charge");
            return Err(GatewayError(format!(
                "card processor rejected the charge ({})",
                response.status()
            )));
        }

        let body: CardChargeResponse = response
            .json()
            .await
            .map_err(|_| GatewayError("malformed card processor response".to_string()))?;

        debug!(reference = %body.id, "Card charge created");
        Ok(ChargeIntent {
            reference: body.id,
            client_secret: Some(body.client_secret),
            redirect_url: None,
        })
    }
}

#[derive(Deserialize)]
struct RegionalChargeResponse {
    reference: String,
    checkout_url: String,
}

/// Regional bank / mobile-money processor: returns a checkout URL the
/// client is redirected to.
pub struct RegionalGateway {
    client: Client,
    api_base: Url,
    secret_key: String,
}

impl RegionalGateway {
    pub fn new(config: &GatewayConfig) -> AnyResult<Self> {
        let (client, api_base) = build_client(config)?;
        Ok(Self {
            client,
            api_base,
            secret_key: config.secret_key.clone(),
        })
    }
}

#[async_trait]
impl PaymentGateway for RegionalGateway {
    async fn create_charge(
        &self,
        amount: i64,
        currency: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<ChargeIntent, GatewayError> {
        let url = self
            .api_base
            .join("transaction/initialize")
            .map_err(|e| GatewayError(e.to_string()))?;

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.secret_key)
            .json(&ChargeRequest {
                amount,
                currency,
                metadata,
            })
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Regional gateway unreachable");
                GatewayError("regional processor unreachable".to_string())
            })?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Regional gateway rejected charge");
            return Err(GatewayError(format!(
                "regional processor rejected the charge ({})",
                response.status()
            )));
        }

        let body: RegionalChargeResponse = response
            .json()
            .await
            .map_err(|_| GatewayError("malformed regional processor response".to_string()))?;

        debug!(reference = %body.reference, "Regional charge created");
        Ok(ChargeIntent {
            reference: body.reference,
            client_secret: None,
            redirect_url: Some(body.checkout_url),
        })
    }
}

/// In-process gateway for tests and local development. Optionally fails
/// every charge to exercise the retryable-initiate path.
pub struct StaticGateway {
    fail: bool,
    counter: std::sync::atomic::AtomicU64,
}

impl StaticGateway {
    pub fn new() -> Self {
        Self {
            fail: false,
            counter: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            counter: std::sync::atomic::AtomicU64::new(0),
        }
    }
}

impl Default for StaticGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for StaticGateway {
    async fn create_charge(
        &self,
        _amount: i64,
        _currency: &str,
        _metadata: &HashMap<String, String>,
    ) -> Result<ChargeIntent, GatewayError> {
        if self.fail {
            return Err(GatewayError("processor unreachable".to_string()));
        }

        let n = self
            .counter
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Ok(ChargeIntent {
            reference: format!("ch_static_{n}"),
            client_secret: Some(format!("secret_{n}")),
            redirect_url: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_kind_parse() {
        assert_eq!("card".parse::<GatewayKind>().unwrap(), GatewayKind::Card);
        assert_eq!(
            " Regional ".parse::<GatewayKind>().unwrap(),
            GatewayKind::Regional
        );
        assert!("paypal".parse::<GatewayKind>().is_err());
    }

    #[test]
    fn test_https_enforced_on_gateway_base() {
        let config = GatewayConfig {
            api_base: "http://pay.example.com".to_string(),
            secret_key: "sk_test".to_string(),
            ..Default::default()
        };
        assert!(CardGateway::new(&config).is_err());
        assert!(RegionalGateway::new(&config).is_err());
    }

    #[tokio::test]
    async fn test_static_gateway_issues_unique_references() {
        let gateway = StaticGateway::new();
        let meta = HashMap::new();

        let a = gateway.create_charge(1000, "USD", &meta).await.unwrap();
        let b = gateway.create_charge(1000, "USD", &meta).await.unwrap();
        assert_ne!(a.reference, b.reference);
    }
}
