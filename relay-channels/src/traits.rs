//! Service traits for the relay.

use async_trait::async_trait;

/// Downstream prediction endpoint.
///
/// Implement this trait to plug in a different answer backend. The relay only
/// needs one operation: turn a question plus session ID into an optional
/// answer text. `Ok(None)` means the endpoint answered without a usable
/// `text` field; the relay substitutes its fallback reply.
#[async_trait]
pub trait PredictionService: Send + Sync {
    /// Ask the endpoint for an answer within the given session.
    async fn predict(&self, question: &str, session_id: &str) -> anyhow::Result<Option<String>>;
}
