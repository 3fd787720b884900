use serde::{Deserialize, Serialize};

use super::{Timestamp, ValidationError};

/// A single message posted to a channel.
///
/// `sequence_number` is the only field used for ordering and deduplication:
/// two messages of the same channel with equal sequence numbers are the same
/// message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Opaque unique identifier, also used as the backfill cursor.
    pub message_id: String,

    /// Channel the message was posted to.
    pub channel_id: String,

    /// Display name of the poster.
    pub author: String,

    /// Message body.
    pub text: String,

    /// When the message was accepted by the chat service.
    pub timestamp: Timestamp,

    /// Per-channel, strictly increasing sequence number.
    pub sequence_number: i64,
}

impl Message {
    /// Ordering key for bounded message windows.
    #[must_use]
    pub const fn order_key(&self) -> i64 {
        self.sequence_number
    }
}

/// Request to post a new message into a channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostMessageRequest {
    /// Target channel.
    pub channel_id: String,

    /// Display name of the poster.
    pub author: String,

    /// Message body; must contain at least one non-whitespace character.
    pub text: String,
}

impl PostMessageRequest {
    /// Builds a request from borrowed parts.
    pub fn new(
        channel_id: impl Into<String>,
        author: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            author: author.into(),
            text: text.into(),
        }
    }

    /// Rejects blank message bodies.
    ///
    /// # Errors
    /// Returns [`ValidationError::BlankMessage`] when `text` is empty or only whitespace.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.text.trim().is_empty() {
            return Err(ValidationError::BlankMessage);
        }
        Ok(())
    }
}
