//! Bot Framework activity types.
//!
//! Models the subset of the Bot Framework activity schema the relay inspects.
//! Unknown fields in the inbound payload are ignored; the channel sends far
//! more than we need.
//!
//! ## Schema Documentation
//! - https://learn.microsoft.com/en-us/azure/bot-service/rest-api/bot-framework-rest-connector-api-reference

use serde::{Deserialize, Serialize};

/// Activity type for user messages. Everything else (typing indicators,
/// membership events, reactions) is passed through without a reply.
pub const MESSAGE_TYPE: &str = "message";

/// A channel account (user or bot) referenced by an activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelAccount {
    /// Channel-scoped account ID
    pub id: String,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The conversation an activity belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationAccount {
    /// Channel-scoped conversation ID
    pub id: String,
}

/// A single inbound or outbound event on the channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    /// Activity type: "message", "typing", "conversationUpdate", ...
    #[serde(rename = "type")]
    pub activity_type: String,
    /// Activity ID (assigned by the channel)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Message text (for message activities)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Sender account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ChannelAccount>,
    /// Receiving account (the bot, on inbound activities)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<ChannelAccount>,
    /// Conversation the activity belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<ConversationAccount>,
    /// Connector service URL for replies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    /// Channel identifier ("msteams", "webchat", "emulator", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    /// ID of the activity this one replies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
}

impl Activity {
    /// Check if this is a user message.
    pub fn is_message(&self) -> bool {
        self.activity_type == MESSAGE_TYPE
    }

    /// Get the trimmed message text, if any.
    ///
    /// Returns `None` for absent text and for text that is empty after
    /// trimming.
    pub fn text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Sender's channel-scoped user ID.
    pub fn sender_id(&self) -> Option<&str> {
        self.from.as_ref().map(|a| a.id.as_str())
    }

    /// Conversation ID.
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation.as_ref().map(|c| c.id.as_str())
    }

    /// Build a reply activity addressed back to the sender.
    ///
    /// Swaps `from` and `recipient`, keeps the conversation, and links the
    /// reply to the inbound activity ID.
    pub fn reply(&self, text: impl Into<String>) -> Self {
        Self {
            activity_type: MESSAGE_TYPE.to_string(),
            id: None,
            text: Some(text.into()),
            from: self.recipient.clone(),
            recipient: self.from.clone(),
            conversation: self.conversation.clone(),
            service_url: self.service_url.clone(),
            channel_id: self.channel_id.clone(),
            reply_to_id: self.id.clone(),
        }
    }
}
