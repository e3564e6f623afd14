//! Per-user session tracking for the downstream prediction endpoint.
//!
//! Flowise keeps conversational context keyed by a session ID. The relay
//! derives one session per user and hands it to every prediction call, so a
//! user's messages land in the same Flowise conversation until they reset it.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;

/// Reserved user input that discards the current session and starts a new one.
pub const RESET_COMMAND: &str = "reset history";

/// Check whether a message is the reset command.
///
/// Case-insensitive exact match after trimming. Anything else, including
/// empty text, is not a reset.
pub fn is_reset(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case(RESET_COMMAND)
}

/// Mapping from user ID to session ID.
///
/// The trait seam exists so the in-memory map can be swapped for a
/// concurrency-safe keyed store or an external cache without touching the
/// resolver or relay logic.
pub trait SessionStore: Send + Sync {
    /// Look up the session for a user.
    fn get(&self, user_id: &str) -> Option<String>;

    /// Store the session for a user, overwriting any prior value.
    fn set(&self, user_id: &str, session_id: String);
}

/// Process-lifetime in-memory session store.
///
/// No eviction, no capacity bound, no expiry. Entries survive until restart,
/// so a long-lived process accumulates one entry per user ever seen.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, String>,
}

impl InMemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked users.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, user_id: &str) -> Option<String> {
        self.sessions.get(user_id).map(|entry| entry.value().clone())
    }

    fn set(&self, user_id: &str, session_id: String) {
        self.sessions.insert(user_id.to_string(), session_id);
    }
}

/// Produces or reuses session IDs, applying reset logic.
#[derive(Clone)]
pub struct SessionResolver {
    store: Arc<dyn SessionStore>,
}

impl SessionResolver {
    /// Create a resolver over the given store.
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Resolve the session ID for a user.
    ///
    /// A new session is generated when the user asked for a reset or has no
    /// session yet; otherwise the stored one is reused. New IDs are
    /// `<conversation_id>-<unix_millis>`, so two resets within the same
    /// millisecond for the same conversation collide. Per-user chat traffic
    /// is sequential in practice, so this is accepted.
    pub fn resolve(&self, user_id: &str, conversation_id: &str, is_reset: bool) -> String {
        if is_reset || self.store.get(user_id).is_none() {
            let session_id = format!("{}-{}", conversation_id, Utc::now().timestamp_millis());
            tracing::info!(
                user_id = %user_id,
                session_id = %session_id,
                "Session reset"
            );
            self.store.set(user_id, session_id);
        }

        // The entry was just written if it was absent, so this cannot miss
        // outside of a racing external store losing the write.
        self.store.get(user_id).unwrap_or_default()
    }
}
