//! Flowise prediction API client.
//!
//! Issues a single synchronous-style call per user message. No retry; any
//! failure is a terminal outcome surfaced to the relay as an error.
//!
//! ## API Documentation
//! - https://docs.flowiseai.com/using-flowise/api

use crate::traits::PredictionService;
use async_trait::async_trait;
use relay_common::config::FlowiseConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// API Types
// ============================================================================

/// Request body for the prediction endpoint.
#[derive(Debug, Serialize)]
struct PredictionRequest<'a> {
    question: &'a str,
    #[serde(rename = "overrideConfig")]
    override_config: OverrideConfig<'a>,
}

/// Per-request configuration overrides.
#[derive(Debug, Serialize)]
struct OverrideConfig<'a> {
    #[serde(rename = "sessionId")]
    session_id: &'a str,
}

/// Response from the prediction endpoint.
#[derive(Debug, Deserialize)]
struct PredictionResponse {
    #[serde(default)]
    text: Option<String>,
}

// ============================================================================
// FlowiseClient
// ============================================================================

/// HTTP client for a single Flowise chatflow.
pub struct FlowiseClient {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl FlowiseClient {
    /// Create a client for the configured chatflow.
    pub fn new(config: &FlowiseConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            endpoint: config.prediction_url(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[async_trait]
impl PredictionService for FlowiseClient {
    /// Call the prediction endpoint.
    ///
    /// Returns the response `text` field; `None` when the endpoint answered
    /// without one.
    async fn predict(&self, question: &str, session_id: &str) -> anyhow::Result<Option<String>> {
        let body = PredictionRequest {
            question,
            override_config: OverrideConfig { session_id },
        };

        tracing::debug!(
            endpoint = %self.endpoint,
            session_id = %session_id,
            "Calling Flowise prediction API"
        );

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Flowise prediction failed ({status}): {text}");
        }

        let data: PredictionResponse = resp.json().await?;
        Ok(data.text)
    }
}
