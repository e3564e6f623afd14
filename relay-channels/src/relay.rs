//! The relay core: turns inbound activities into outgoing reply text.
//!
//! Message flow:
//! 1. Drop anything that is not a user message.
//! 2. Intercept the reset command before it reaches the prediction endpoint.
//! 3. Resolve the user's session and forward the question to the endpoint.
//! 4. Map the answer (or its absence, or a failure) to the reply text.
//!
//! Every user-visible failure reduces to a fixed string. Diagnostic detail
//! stays in the logs.

use crate::activity::Activity;
use crate::session::{is_reset, SessionResolver, SessionStore};
use crate::traits::PredictionService;
use relay_common::error::{Error, Result};
use relay_common::util::truncate_with_ellipsis;
use std::sync::Arc;

// ============================================================================
// Fixed Replies
// ============================================================================

/// Confirmation after a session reset.
pub const RESET_CONFIRMATION: &str = "History was successfully reset. Let’s start fresh!";

/// Fallback when the endpoint answered without usable text.
pub const EMPTY_ANSWER_FALLBACK: &str = "Unfortunately, I could not say anything useful 😅";

/// Generic reply for a failed prediction call.
pub const PROCESSING_ERROR_REPLY: &str = "An error has occurred.";

/// Reply for failures escaping the per-message handler.
pub const TURN_ERROR_REPLY: &str = "Something has gone wrong. Please try again.";

// ============================================================================
// Relay
// ============================================================================

/// Relays user messages to a prediction endpoint.
pub struct Relay {
    resolver: SessionResolver,
    prediction: Arc<dyn PredictionService>,
}

impl Relay {
    /// Create a relay over the given session store and prediction endpoint.
    pub fn new(store: Arc<dyn SessionStore>, prediction: Arc<dyn PredictionService>) -> Self {
        Self {
            resolver: SessionResolver::new(store),
            prediction,
        }
    }

    /// Handle one inbound activity.
    ///
    /// Returns the reply text to send, `None` when the activity produces no
    /// reply (non-message types, empty text), or an error when a message
    /// activity is missing its sender or conversation.
    pub async fn handle(&self, activity: &Activity) -> Result<Option<String>> {
        if !activity.is_message() {
            tracing::debug!(activity_type = %activity.activity_type, "Ignoring non-message activity");
            return Ok(None);
        }

        let Some(text) = activity.text() else {
            tracing::debug!("Ignoring message without text");
            return Ok(None);
        };

        let user_id = activity
            .sender_id()
            .ok_or_else(|| Error::InvalidActivity("message has no sender".into()))?;
        let conversation_id = activity
            .conversation_id()
            .ok_or_else(|| Error::InvalidActivity("message has no conversation".into()))?;

        tracing::debug!(
            user_id = %user_id,
            text = %truncate_with_ellipsis(text, 2000),
            "Handling message"
        );

        let reset = is_reset(text);
        let session_id = self.resolver.resolve(user_id, conversation_id, reset);

        if reset {
            return Ok(Some(RESET_CONFIRMATION.to_string()));
        }

        let reply = match self.prediction.predict(text, &session_id).await {
            Ok(Some(answer)) if !answer.is_empty() => answer,
            Ok(_) => EMPTY_ANSWER_FALLBACK.to_string(),
            Err(e) => {
                tracing::error!(error = %e, user_id = %user_id, "Prediction call failed");
                PROCESSING_ERROR_REPLY.to_string()
            }
        };

        Ok(Some(reply))
    }
}
