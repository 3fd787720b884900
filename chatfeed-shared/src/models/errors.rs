use thiserror::Error;

/// Input rejected before it reaches the chat service.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Message body is empty or whitespace only.
    #[error("message text must not be blank")]
    BlankMessage,
    /// Channel name is empty or whitespace only.
    #[error("channel name must not be blank")]
    BlankChannelName,
}
