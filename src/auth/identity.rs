//! Identity provider boundary.
//!
//! The core trusts an external provider to turn a bearer credential into a
//! stable identity key (email) plus basic profile data. Token issuance and
//! session handling live entirely on the provider side.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Profile returned by the identity provider for a valid credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityProfile {
    /// Stable identity key. Authoritative lookup key for the user directory.
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// Resolves bearer credentials to identity profiles.
///
/// `resolve` returns `Ok(None)` for credentials the provider does not
/// recognize; transport failures are errors so callers can distinguish
/// "invalid token" from "provider unreachable".
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve(&self, bearer: &str) -> Result<Option<IdentityProfile>>;
}

/// Configuration for the HTTP-backed provider.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Userinfo endpoint queried with the caller's bearer token.
    pub userinfo_url: String,
    pub timeout_secs: u64,
    /// Require HTTPS for the provider endpoint.
    pub require_https: bool,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            userinfo_url: "https://identity.example.com/userinfo".to_string(),
            timeout_secs: 10,
            require_https: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserinfoResponse {
    email: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

/// Identity provider backed by an OIDC-style userinfo endpoint.
pub struct HttpIdentityProvider {
    client: Client,
    userinfo_url: Url,
}

impl HttpIdentityProvider {
    pub fn new(config: &IdentityConfig) -> Result<Self> {
        let userinfo_url =
            Url::parse(&config.userinfo_url).context("Invalid identity userinfo URL")?;

        if config.require_https && userinfo_url.scheme() != "https" {
            return Err(anyhow::anyhow!(
                "HTTPS is required but identity URL is not HTTPS: {}",
                userinfo_url
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("launchboard/0.3")
            .build()
            .context("Failed to create identity HTTP client")?;

        Ok(Self {
            client,
            userinfo_url,
        })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn resolve(&self, bearer: &str) -> Result<Option<IdentityProfile>> {
        let response = self
            .client
            .get(self.userinfo_url.clone())
            .bearer_auth(bearer)
            .send()
            .await
            .context("Identity provider unreachable")?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            debug!("Identity provider rejected bearer token");
            return Ok(None);
        }

        if !response.status().is_success() {
            warn!(status = %response.status(), "Unexpected identity provider status");
            return Err(anyhow::anyhow!(
                "Identity provider returned status {}",
                response.status()
            ));
        }

        let info: UserinfoResponse = response
            .json()
            .await
            .context("Malformed identity provider response")?;

        Ok(Some(IdentityProfile {
            display_name: info.name.unwrap_or_else(|| info.email.clone()),
            email: info.email,
            avatar_url: info.picture,
        }))
    }
}

/// Fixed token -> profile mapping. Used in tests and local development
/// where no real provider is running.
#[derive(Default)]
pub struct StaticIdentityProvider {
    tokens: std::collections::HashMap<String, IdentityProfile>,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: &str, email: &str, display_name: &str) -> Self {
        self.tokens.insert(
            token.to_string(),
            IdentityProfile {
                email: email.to_string(),
                display_name: display_name.to_string(),
                avatar_url: None,
            },
        );
        self
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn resolve(&self, bearer: &str) -> Result<Option<IdentityProfile>> {
        Ok(self.tokens.get(bearer).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provider_resolves_known_token() {
        let provider =
            StaticIdentityProvider::new().with_token("tok_1", "ada@example.com", "Ada");

        let profile = provider.resolve("tok_1").await.unwrap().unwrap();
        assert_eq!(profile.email, "ada@example.com");
        assert_eq!(profile.display_name, "Ada");
    }

    #[tokio::test]
    async fn test_static_provider_unknown_token_is_none() {
        let provider = StaticIdentityProvider::new();
        assert!(provider.resolve("nope").await.unwrap().is_none());
    }

    #[test]
    fn test_http_provider_rejects_plain_http_when_https_required() {
        let config = IdentityConfig {
            userinfo_url: "http://identity.example.com/userinfo".to_string(),
            ..Default::default()
        };
        assert!(HttpIdentityProvider::new(&config).is_err());
    }
}
