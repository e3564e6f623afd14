//! Bot Framework connector client.
//!
//! Sends reply activities back to the channel through the connector REST API.
//! Outbound calls authenticate with an OAuth client-credentials token; when no
//! credentials are configured the connector sends unauthenticated, which is
//! what the Bot Framework Emulator expects during local development.
//!
//! Inbound request authentication (validating the channel's JWT) is the
//! transport layer's concern and is not handled here.
//!
//! ## API Documentation
//! - https://learn.microsoft.com/en-us/azure/bot-service/rest-api/bot-framework-rest-connector-authentication

use crate::activity::Activity;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

// ============================================================================
// Constants
// ============================================================================

const LOGIN_URL: &str =
    "https://login.microsoftonline.com/botframework.com/oauth2/v2.0/token";
const TOKEN_SCOPE: &str = "https://api.botframework.com/.default";
const TOKEN_REFRESH_MARGIN_SECS: u64 = 300;

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResourceResponse {
    #[serde(default)]
    #[allow(dead_code)]
    id: Option<String>,
}

// ============================================================================
// Token Cache
// ============================================================================

struct TokenCache {
    token: String,
    expires_at: Instant,
}

// ============================================================================
// BotConnector
// ============================================================================

/// Client for the Bot Framework connector API.
pub struct BotConnector {
    app_id: String,
    app_password: String,
    token_url: String,
    client: reqwest::Client,
    token_cache: Arc<RwLock<Option<TokenCache>>>,
}

impl BotConnector {
    /// Create a new connector with the given credentials.
    ///
    /// Empty credentials disable outbound authentication.
    pub fn new(app_id: String, app_password: String) -> Self {
        Self {
            app_id,
            app_password,
            token_url: LOGIN_URL.to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Override the token endpoint (tests).
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Whether a full set of credentials is present.
    pub fn credentials_configured(&self) -> bool {
        !self.app_id.is_empty() && !self.app_password.is_empty()
    }

    /// Get or refresh the connector access token.
    pub async fn get_access_token(&self) -> anyhow::Result<String> {
        // Check cache first
        {
            let cache = self.token_cache.read().await;
            if let Some(ref cached) = *cache {
                let now = Instant::now();
                if cached.expires_at > now + Duration::from_secs(TOKEN_REFRESH_MARGIN_SECS) {
                    return Ok(cached.token.clone());
                }
            }
        }

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.app_id.as_str()),
            ("client_secret", self.app_password.as_str()),
            ("scope", TOKEN_SCOPE),
        ];

        let resp = self.client.post(&self.token_url).form(&form).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Failed to get connector token ({status}): {text}");
        }

        let data: TokenResponse = resp.json().await?;

        if let Some(error) = data.error {
            anyhow::bail!(
                "Connector token error ({}): {}",
                error,
                data.error_description.unwrap_or_default()
            );
        }

        let token = data
            .access_token
            .ok_or_else(|| anyhow::anyhow!("Missing access_token in response"))?;
        let expires_in = data.expires_in.unwrap_or(3600);

        // Update cache
        {
            let mut cache = self.token_cache.write().await;
            *cache = Some(TokenCache {
                token: token.clone(),
                expires_at: Instant::now() + Duration::from_secs(expires_in),
            });
        }

        tracing::debug!(
            "Connector access token refreshed, expires in {} seconds",
            expires_in
        );
        Ok(token)
    }

    /// Send a reply to the conversation an inbound activity came from.
    pub async fn send_reply(&self, inbound: &Activity, text: &str) -> anyhow::Result<()> {
        let service_url = inbound
            .service_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Activity has no serviceUrl"))?;
        let conversation_id = inbound
            .conversation_id()
            .ok_or_else(|| anyhow::anyhow!("Activity has no conversation"))?;

        let reply = inbound.reply(text);

        // Replying to a known activity threads the response; without an
        // inbound ID the reply is posted to the conversation directly.
        let url = match inbound.id.as_deref() {
            Some(activity_id) => format!(
                "{}/v3/conversations/{}/activities/{}",
                service_url.trim_end_matches('/'),
                conversation_id,
                activity_id
            ),
            None => format!(
                "{}/v3/conversations/{}/activities",
                service_url.trim_end_matches('/'),
                conversation_id
            ),
        };

        let mut request = self.client.post(&url).json(&reply);
        if self.credentials_configured() {
            let token = self.get_access_token().await?;
            request = request.bearer_auth(token);
        }

        let resp = request.send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            anyhow::bail!("Connector send failed ({status}): {err}");
        }

        let _: ResourceResponse = resp.json().await.unwrap_or(ResourceResponse { id: None });

        tracing::debug!(conversation_id = %conversation_id, "Reply delivered");
        Ok(())
    }
}
