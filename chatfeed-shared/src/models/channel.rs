use serde::{Deserialize, Serialize};

use super::{Message, ValidationError};

/// A chat channel as listed in the channel directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Channel {
    /// Unique channel identifier.
    pub id: String,
    /// Human readable name.
    pub name: String,
    /// Most recent message, if any has been posted.
    pub last_message: Option<Message>,
}

impl Channel {
    /// Checks that a proposed channel name is usable.
    ///
    /// # Errors
    /// Returns [`ValidationError::BlankChannelName`] for empty or whitespace-only names.
    pub fn validate_name(name: &str) -> Result<(), ValidationError> {
        if name.trim().is_empty() {
            Err(ValidationError::BlankChannelName)
        } else {
            Ok(())
        }
    }
}
