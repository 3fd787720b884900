//! Process-local [`ChatService`] backed by per-channel message logs.
//!
//! Each channel owns an append-only log and a `tokio::sync::broadcast` sender
//! used for live fan-out. Messages are appended and broadcast under the same
//! write lock, so live order always matches sequence order.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::StreamExt;
use shared::{
    config::feed::DEFAULT_LIVE_BUFFER,
    models::{Channel, Message, PostMessageRequest, Timestamp},
};
use tokio::sync::{RwLock, broadcast};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::chat_service::{ChatService, ChatServiceError, ChatServiceResult, LiveMessages};

#[derive(Debug)]
struct ChannelLog {
    id: String,
    name: String,
    messages: Vec<Message>,
    next_sequence: i64,
    live: broadcast::Sender<Message>,
}

impl ChannelLog {
    fn new(id: String, name: String, live_buffer: usize) -> Self {
        let (live, _) = broadcast::channel(live_buffer.max(1));
        Self {
            id,
            name,
            messages: Vec::new(),
            next_sequence: 1,
            live,
        }
    }

    fn summary(&self) -> Channel {
        Channel {
            id: self.id.clone(),
            name: self.name.clone(),
            last_message: self.messages.last().cloned(),
        }
    }

    /// Newest `limit` messages after the cursor, oldest first. An unknown
    /// cursor is treated like no cursor.
    fn history(&self, limit: usize, since_message_id: Option<&str>) -> Vec<Message> {
        let start = since_message_id
            .and_then(|id| self.messages.iter().position(|m| m.message_id == id))
            .map_or(0, |position| position + 1);
        let newer = &self.messages[start..];
        let skip = newer.len().saturating_sub(limit);
        newer[skip..].to_vec()
    }
}

fn not_found(channel_id: &str) -> ChatServiceError {
    ChatServiceError::NotFound(format!("channel {channel_id}"))
}

#[derive(Debug)]
pub struct InMemoryChatService {
    channels: RwLock<HashMap<String, ChannelLog>>,
    live_buffer: usize,
}

impl InMemoryChatService {
    /// Creates an empty service whose live queues hold `live_buffer` messages
    /// per channel before slow subscribers start lagging.
    #[must_use]
    pub fn new(live_buffer: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            live_buffer,
        }
    }
}

impl Default for InMemoryChatService {
    fn default() -> Self {
        Self::new(DEFAULT_LIVE_BUFFER)
    }
}

#[async_trait]
impl ChatService for InMemoryChatService {
    async fn channels(&self) -> ChatServiceResult<Vec<Channel>> {
        let guard = self.channels.read().await;
        let mut channels: Vec<Channel> = guard.values().map(ChannelLog::summary).collect();
        channels.sort_by(|a, b| {
            let a_activity = a.last_message.as_ref().map(|m| m.timestamp);
            let b_activity = b.last_message.as_ref().map(|m| m.timestamp);
            b_activity
                .cmp(&a_activity)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(channels)
    }

    async fn channel(&self, channel_id: &str) -> ChatServiceResult<Option<Channel>> {
        let guard = self.channels.read().await;
        Ok(guard.get(channel_id).map(ChannelLog::summary))
    }

    #[instrument(name = "chat.create_channel", skip(self), err)]
    async fn create_channel(&self, name: &str) -> ChatServiceResult<Channel> {
        Channel::validate_name(name)?;

        let id = Uuid::new_v4().to_string();
        let log = ChannelLog::new(id.clone(), name.trim().to_string(), self.live_buffer);
        let channel = log.summary();

        self.channels.write().await.insert(id, log);
        debug!(channel_id = %channel.id, "channel created");
        Ok(channel)
    }

    async fn live_messages(&self, channel_id: &str) -> ChatServiceResult<LiveMessages> {
        let receiver = {
            let guard = self.channels.read().await;
            let log = guard.get(channel_id).ok_or_else(|| not_found(channel_id))?;
            log.live.subscribe()
        };

        debug!(channel_id, "live subscription opened");
        let stream = BroadcastStream::new(receiver)
            .map(|item| item.map_err(|err| ChatServiceError::Stream(err.to_string())));
        Ok(stream.boxed())
    }

    #[instrument(name = "chat.message_history", skip(self), err)]
    async fn message_history(
        &self,
        channel_id: &str,
        limit: usize,
        since_message_id: Option<&str>,
    ) -> ChatServiceResult<Vec<Message>> {
        let guard = self.channels.read().await;
        let log = guard.get(channel_id).ok_or_else(|| not_found(channel_id))?;
        Ok(log.history(limit, since_message_id))
    }

    #[instrument(name = "chat.post_message", skip(self, text), err)]
    async fn post_message(
        &self,
        channel_id: &str,
        author: &str,
        text: &str,
    ) -> ChatServiceResult<Message> {
        PostMessageRequest::new(channel_id, author, text).validate()?;

        let mut guard = self.channels.write().await;
        let log = guard
            .get_mut(channel_id)
            .ok_or_else(|| not_found(channel_id))?;

        let message = Message {
            message_id: Uuid::new_v4().to_string(),
            channel_id: log.id.clone(),
            author: author.to_string(),
            text: text.to_string(),
            timestamp: Timestamp::now(),
            sequence_number: log.next_sequence,
        };
        log.next_sequence += 1;
        log.messages.push(message.clone());

        // No subscribers is not an error.
        let _ = log.live.send(message.clone());
        debug!(sequence = message.sequence_number, "message posted");
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::ValidationError;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn service_with_channel() -> (InMemoryChatService, String) {
        let service = InMemoryChatService::new(16);
        let channel = service.create_channel("general").await.unwrap();
        (service, channel.id)
    }

    async fn post_many(
        service: &InMemoryChatService,
        channel_id: &str,
        count: usize,
    ) -> Vec<Message> {
        let mut posted = Vec::new();
        for idx in 0..count {
            posted.push(
                service
                    .post_message(channel_id, "alice", &format!("message {idx}"))
                    .await
                    .unwrap(),
            );
        }
        posted
    }

    fn sequences(messages: &[Message]) -> Vec<i64> {
        messages.iter().map(|m| m.sequence_number).collect()
    }

    #[tokio::test]
    async fn post_assigns_increasing_sequence_numbers() {
        let (service, channel_id) = service_with_channel().await;
        let posted = post_many(&service, &channel_id, 3).await;

        assert_eq!(sequences(&posted), vec![1, 2, 3]);
        assert!(posted.iter().all(|m| m.channel_id == channel_id));
    }

    #[tokio::test]
    async fn blank_post_is_rejected_without_side_effects() {
        let (service, channel_id) = service_with_channel().await;

        let err = service
            .post_message(&channel_id, "alice", "   ")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ChatServiceError::Validation(ValidationError::BlankMessage)
        ));

        let history = service.message_history(&channel_id, 10, None).await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn blank_channel_name_is_rejected() {
        let service = InMemoryChatService::default();
        let err = service.create_channel(" ").await.unwrap_err();
        assert!(matches!(
            err,
            ChatServiceError::Validation(ValidationError::BlankChannelName)
        ));
    }

    #[tokio::test]
    async fn history_without_cursor_returns_most_recent() {
        let (service, channel_id) = service_with_channel().await;
        post_many(&service, &channel_id, 5).await;

        let history = service.message_history(&channel_id, 3, None).await.unwrap();
        assert_eq!(sequences(&history), vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn history_with_cursor_returns_only_newer() {
        let (service, channel_id) = service_with_channel().await;
        let posted = post_many(&service, &channel_id, 5).await;

        let history = service
            .message_history(&channel_id, 10, Some(&posted[1].message_id))
            .await
            .unwrap();
        assert_eq!(sequences(&history), vec![3, 4, 5]);

        let capped = service
            .message_history(&channel_id, 2, Some(&posted[0].message_id))
            .await
            .unwrap();
        assert_eq!(sequences(&capped), vec![4, 5]);

        let latest = service
            .message_history(&channel_id, 10, Some(&posted[4].message_id))
            .await
            .unwrap();
        assert!(latest.is_empty());
    }

    #[tokio::test]
    async fn history_with_unknown_cursor_behaves_like_none() {
        let (service, channel_id) = service_with_channel().await;
        post_many(&service, &channel_id, 4).await;

        let history = service
            .message_history(&channel_id, 2, Some("no-such-message"))
            .await
            .unwrap();
        assert_eq!(sequences(&history), vec![3, 4]);
    }

    #[tokio::test]
    async fn unknown_channel_is_not_found() {
        let service = InMemoryChatService::default();

        assert!(service.channel("missing").await.unwrap().is_none());
        assert!(matches!(
            service.message_history("missing", 5, None).await,
            Err(ChatServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.live_messages("missing").await,
            Err(ChatServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.post_message("missing", "alice", "hi").await,
            Err(ChatServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn live_stream_captures_posts_made_before_first_poll() {
        let (service, channel_id) = service_with_channel().await;
        post_many(&service, &channel_id, 2).await;

        let mut live = service.live_messages(&channel_id).await.unwrap();
        post_many(&service, &channel_id, 2).await;

        let first = timeout(Duration::from_secs(1), live.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let second = timeout(Duration::from_secs(1), live.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!((first.sequence_number, second.sequence_number), (3, 4));
    }

    #[tokio::test]
    async fn lagging_subscriber_gets_stream_error() {
        let service = InMemoryChatService::new(1);
        let channel = service.create_channel("busy").await.unwrap();
        let mut live = service.live_messages(&channel.id).await.unwrap();

        post_many(&service, &channel.id, 3).await;

        let first = live.next().await.unwrap();
        assert!(matches!(first, Err(ChatServiceError::Stream(_))));
    }

    #[tokio::test]
    async fn channels_list_newest_activity_first() {
        let service = InMemoryChatService::default();
        let quiet = service.create_channel("quiet").await.unwrap();
        let older = service.create_channel("older").await.unwrap();
        let newer = service.create_channel("newer").await.unwrap();

        service.post_message(&older.id, "bob", "first").await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        service.post_message(&newer.id, "bob", "second").await.unwrap();

        let names: Vec<String> = service
            .channels()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["newer", "older", "quiet"]);

        let quiet = service.channel(&quiet.id).await.unwrap().unwrap();
        assert!(quiet.last_message.is_none());
    }
}
