//! Shared fixtures for feed integration tests.

#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use server::{
    feed::{FeedError, FeedObserver},
    services::{ChatService, ChatServiceError, ChatServiceResult, LiveMessages},
};
use shared::models::{Channel, Message, Timestamp};
use tokio::sync::{Notify, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;

pub type LiveSender = mpsc::UnboundedSender<ChatServiceResult<Message>>;

pub fn message(sequence_number: i64) -> Message {
    Message {
        message_id: format!("m{sequence_number}"),
        channel_id: "general".into(),
        author: "alice".into(),
        text: format!("message {sequence_number}"),
        timestamp: Timestamp(Utc::now()),
        sequence_number,
    }
}

pub fn messages(sequences: impl IntoIterator<Item = i64>) -> Vec<Message> {
    sequences.into_iter().map(message).collect()
}

pub fn sequences(messages: &[Message]) -> Vec<i64> {
    messages.iter().map(|m| m.sequence_number).collect()
}

pub fn ids(messages: &[Message]) -> Vec<&str> {
    messages.iter().map(|m| m.message_id.as_str()).collect()
}

/// Newest `limit` messages of `channel_log` strictly after the cursor, oldest
/// first. An unknown cursor is treated like no cursor.
fn narrow(mut channel_log: Vec<Message>, limit: usize, since_message_id: Option<&str>) -> Vec<Message> {
    channel_log.sort_by_key(|m| m.sequence_number);
    let after = since_message_id
        .and_then(|id| channel_log.iter().find(|m| m.message_id == id))
        .map(|cursor| cursor.sequence_number);
    if let Some(after) = after {
        channel_log.retain(|m| m.sequence_number > after);
    }
    let skip = channel_log.len().saturating_sub(limit);
    channel_log.split_off(skip)
}

#[derive(Default)]
struct Recorded {
    updates: Mutex<Vec<Vec<Message>>>,
    errors: Mutex<Vec<String>>,
    notify: Notify,
}

/// Observer that keeps every window and error it receives.
#[derive(Clone, Default)]
pub struct Recorder(Arc<Recorded>);

impl Recorder {
    pub fn updates(&self) -> Vec<Vec<Message>> {
        self.0.updates.lock().unwrap().clone()
    }

    pub fn last(&self) -> Vec<Message> {
        self.updates().last().cloned().unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<String> {
        self.0.errors.lock().unwrap().clone()
    }

    pub async fn wait_for(&self, predicate: impl Fn(&Self) -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let notified = self.0.notify.notified();
                if predicate(self) {
                    return;
                }
                notified.await;
            }
        })
        .await
        .expect("condition not reached in time");
    }
}

impl FeedObserver for Recorder {
    fn on_update(&self, window: &[Message]) {
        self.0.updates.lock().unwrap().push(window.to_vec());
        self.0.notify.notify_waiters();
    }

    fn on_error(&self, error: &FeedError) {
        self.0.errors.lock().unwrap().push(error.to_string());
        self.0.notify.notify_waiters();
    }
}

/// Chat service whose live streams are driven by the test and whose history
/// answers are queued in advance.
///
/// A queued answer is the channel's history as of the request: it is
/// narrowed to messages after the cursor and to the newest `limit`.
#[derive(Default)]
pub struct ScriptedService {
    live: Mutex<VecDeque<mpsc::UnboundedReceiver<ChatServiceResult<Message>>>>,
    history: Mutex<VecDeque<ChatServiceResult<Vec<Message>>>>,
    history_calls: Mutex<Vec<(usize, Option<String>)>>,
    history_gate: Mutex<Option<Arc<Notify>>>,
}

impl ScriptedService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues a live stream for the next subscription and returns its sender.
    pub fn push_live(&self) -> LiveSender {
        let (tx, rx) = mpsc::unbounded_channel();
        self.live.lock().unwrap().push_back(rx);
        tx
    }

    /// Queues the answer to the next history request.
    pub fn push_history(&self, history: ChatServiceResult<Vec<Message>>) {
        self.history.lock().unwrap().push_back(history);
    }

    /// Holds every history request until the returned gate is notified.
    pub fn gate_history(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.history_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Every `(limit, cursor)` pair history was requested with.
    pub fn history_calls(&self) -> Vec<(usize, Option<String>)> {
        self.history_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatService for ScriptedService {
    async fn channels(&self) -> ChatServiceResult<Vec<Channel>> {
        Ok(Vec::new())
    }

    async fn channel(&self, _channel_id: &str) -> ChatServiceResult<Option<Channel>> {
        Ok(None)
    }

    async fn create_channel(&self, _name: &str) -> ChatServiceResult<Channel> {
        Err(ChatServiceError::Unavailable("scripted".into()))
    }

    async fn live_messages(&self, _channel_id: &str) -> ChatServiceResult<LiveMessages> {
        let receiver = self
            .live
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ChatServiceError::Unavailable("no live stream queued".into()))?;
        Ok(UnboundedReceiverStream::new(receiver).boxed())
    }

    async fn message_history(
        &self,
        _channel_id: &str,
        limit: usize,
        since_message_id: Option<&str>,
    ) -> ChatServiceResult<Vec<Message>> {
        self.history_calls
            .lock()
            .unwrap()
            .push((limit, since_message_id.map(str::to_string)));
        let gate = self.history_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let answer = self
            .history
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()));
        answer.map(|channel_log| narrow(channel_log, limit, since_message_id))
    }

    async fn post_message(
        &self,
        _channel_id: &str,
        _author: &str,
        _text: &str,
    ) -> ChatServiceResult<Message> {
        Err(ChatServiceError::Unavailable("scripted".into()))
    }
}
