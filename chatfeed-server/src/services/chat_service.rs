//! Contract between channel feeds and the chat backend.
//!
//! Feeds only need three things from the backend: a live push stream of new
//! messages, a bounded history query anchored on a cursor, and a way to post.
//! The channel directory operations serve the lobby side of the application.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use shared::models::{Channel, Message, ValidationError};
use thiserror::Error;

/// Failures reported by a [`ChatService`].
#[derive(Debug, Error)]
pub enum ChatServiceError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("live stream error: {0}")]
    Stream(String),
}

pub type ChatServiceResult<T> = Result<T, ChatServiceError>;

/// Push stream of messages for one channel. Dropping it releases the
/// subscription.
pub type LiveMessages = BoxStream<'static, ChatServiceResult<Message>>;

/// Backend operations a channel feed and the channel directory rely on.
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Lists every channel with its most recent message, newest activity first.
    async fn channels(&self) -> ChatServiceResult<Vec<Channel>>;

    /// Looks up a single channel.
    async fn channel(&self, channel_id: &str) -> ChatServiceResult<Option<Channel>>;

    /// Creates a channel with a generated identifier.
    ///
    /// # Errors
    /// [`ChatServiceError::Validation`] when `name` is blank.
    async fn create_channel(&self, name: &str) -> ChatServiceResult<Channel>;

    /// Opens the live message stream of a channel.
    ///
    /// The subscription must already be established when this returns:
    /// every message posted afterwards is delivered by the stream, whether or
    /// not the caller has started polling it.
    async fn live_messages(&self, channel_id: &str) -> ChatServiceResult<LiveMessages>;

    /// Returns at most `limit` messages.
    ///
    /// With no cursor these are the most recent messages of the channel. With
    /// `since_message_id` set, only messages with a sequence number strictly
    /// greater than the cursor's are returned. Callers must not rely on the
    /// order of the result.
    async fn message_history(
        &self,
        channel_id: &str,
        limit: usize,
        since_message_id: Option<&str>,
    ) -> ChatServiceResult<Vec<Message>>;

    /// Posts a message and returns it with its identifier and sequence number.
    ///
    /// # Errors
    /// [`ChatServiceError::Validation`] when `text` is blank.
    async fn post_message(
        &self,
        channel_id: &str,
        author: &str,
        text: &str,
    ) -> ChatServiceResult<Message>;
}

pub type SharedChatService = Arc<dyn ChatService>;
