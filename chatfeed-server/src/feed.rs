//! Channel feeds: a live, bounded, gap-free view of one channel.
//!
//! A [`ChannelFeed`] subscribes to the live stream of its channel *before*
//! asking for history, and anchors the history request on the newest message
//! it already holds. A message posted while the history request is in flight
//! therefore arrives through at least one of the two paths, and the window's
//! key-based dedup keeps it from showing up twice.
//!
//! Live deliveries run on a spawned tokio task. Both the live task and the
//! backfill path mutate the window, snapshot it and notify the observer under
//! a single mutex, so the observer sees snapshots in mutation order.

use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicU8, Ordering},
};

use futures::StreamExt;
use metrics::counter;
use shared::models::{Message, PostMessageRequest, ValidationError};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::{
    buffer::{BufferError, MessageWindow},
    services::{ChatServiceError, LiveMessages, SharedChatService},
};

/// Errors raised by [`ChannelFeed`] operations and reported to observers.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    InvalidArgument(#[from] BufferError),
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("history fetch failed: {0}")]
    HistoryFetch(#[source] ChatServiceError),
    #[error("live stream failed: {0}")]
    LiveStream(#[source] ChatServiceError),
    #[error("live stream ended")]
    LiveStreamEnded,
    #[error("post failed: {0}")]
    Post(#[source] ChatServiceError),
    #[error("feed is already attached")]
    AlreadyAttached,
    #[error("feed has been detached")]
    Closed,
}

/// Lifecycle of a [`ChannelFeed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    /// Not subscribed. Initial state, and the state after the live stream
    /// failed; [`ChannelFeed::attach`] may be called again.
    Detached,
    /// Opening the live subscription.
    Attaching,
    /// Subscribed; backfill may still be in flight.
    Live,
    /// Detached by the consumer. Terminal.
    Closed,
}

const STATE_DETACHED: u8 = 0;
const STATE_ATTACHING: u8 = 1;
const STATE_LIVE: u8 = 2;
const STATE_CLOSED: u8 = 3;

impl FeedState {
    const fn from_raw(raw: u8) -> Self {
        match raw {
            STATE_ATTACHING => Self::Attaching,
            STATE_LIVE => Self::Live,
            STATE_CLOSED => Self::Closed,
            _ => Self::Detached,
        }
    }
}

/// Receives window updates from a feed.
///
/// Callbacks run while the feed holds its window lock; they must not call
/// [`ChannelFeed::snapshot`] or [`ChannelFeed::attach`] on the same feed.
/// Calling [`ChannelFeed::detach`] from a callback is fine.
pub trait FeedObserver: Send + Sync + 'static {
    /// Called with the full window, ascending by sequence number, every time
    /// it changes.
    fn on_update(&self, window: &[Message]);

    /// Called once when the live stream fails or ends.
    fn on_error(&self, _error: &FeedError) {}
}

impl<F> FeedObserver for F
where
    F: Fn(&[Message]) + Send + Sync + 'static,
{
    fn on_update(&self, window: &[Message]) {
        self(window);
    }
}

struct FeedShared {
    channel_id: String,
    state: AtomicU8,
    window: Mutex<MessageWindow>,
    observer: Arc<dyn FeedObserver>,
}

impl FeedShared {
    fn state(&self) -> FeedState {
        FeedState::from_raw(self.state.load(Ordering::SeqCst))
    }

    fn transition(&self, from: u8, to: u8) -> bool {
        self.state
            .compare_exchange(from, to, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn lock_window(&self) -> MutexGuard<'_, MessageWindow> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Merges `messages` into the window and notifies the observer unless the
    /// feed was closed. Returns whether the observer was called.
    fn apply<I>(&self, messages: I) -> bool
    where
        I: IntoIterator<Item = Message>,
    {
        let mut window = self.lock_window();
        if self.state() == FeedState::Closed {
            return false;
        }
        window.insert_all(messages);
        let snapshot = window.snapshot_ordered();
        if self.state() == FeedState::Closed {
            return false;
        }
        self.observer.on_update(&snapshot);
        true
    }

    /// Moves an attached feed back to `Detached` and reports `error`. Does
    /// nothing once the consumer has detached.
    fn fail(&self, error: &FeedError) {
        let _window = self.lock_window();
        let detached = self.transition(STATE_LIVE, STATE_DETACHED)
            || self.transition(STATE_ATTACHING, STATE_DETACHED);
        if detached {
            counter!("chatfeed_live_stream_failures_total").increment(1);
            warn!(channel_id = %self.channel_id, error = %error, "live stream stopped");
            self.observer.on_error(error);
        }
    }
}

async fn pump_live(shared: Arc<FeedShared>, mut live: LiveMessages, token: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            next = live.next() => match next {
                Some(Ok(message)) => {
                    counter!("chatfeed_live_messages_total").increment(1);
                    shared.apply(std::iter::once(message));
                }
                Some(Err(err)) => {
                    shared.fail(&FeedError::LiveStream(err));
                    break;
                }
                None => {
                    shared.fail(&FeedError::LiveStreamEnded);
                    break;
                }
            },
        }
    }
    debug!(channel_id = %shared.channel_id, "live pump finished");
}

/// One consumer's view of one channel.
///
/// Dropping the feed detaches it.
pub struct ChannelFeed {
    service: SharedChatService,
    shared: Arc<FeedShared>,
    cancel: Mutex<Option<CancellationToken>>,
}

impl ChannelFeed {
    /// Creates a detached feed whose window holds, and whose backfill
    /// requests, at most `history_size` messages.
    ///
    /// # Errors
    /// [`FeedError::InvalidArgument`] when `history_size` is zero.
    pub fn new(
        service: SharedChatService,
        channel_id: impl Into<String>,
        history_size: usize,
        observer: impl FeedObserver,
    ) -> Result<Self, FeedError> {
        let window = MessageWindow::for_messages(history_size)?;
        Ok(Self {
            service,
            shared: Arc::new(FeedShared {
                channel_id: channel_id.into(),
                state: AtomicU8::new(STATE_DETACHED),
                window: Mutex::new(window),
                observer: Arc::new(observer),
            }),
            cancel: Mutex::new(None),
        })
    }

    pub fn channel_id(&self) -> &str {
        &self.shared.channel_id
    }

    pub fn state(&self) -> FeedState {
        self.shared.state()
    }

    /// Copy of the current window, ascending by sequence number.
    pub fn snapshot(&self) -> Vec<Message> {
        self.shared.lock_window().snapshot_ordered()
    }

    /// Subscribes to the live stream, then backfills history.
    ///
    /// The live subscription is opened first and keeps delivering while the
    /// history request is in flight. The backfill cursor is the newest
    /// message held when the subscription opened, so a re-attach after a
    /// stream failure only asks for what was missed.
    ///
    /// # Errors
    /// * [`FeedError::Closed`] or [`FeedError::AlreadyAttached`] when the feed
    ///   is not detached.
    /// * [`FeedError::LiveStream`] when the subscription cannot be opened; the
    ///   feed stays detached.
    /// * [`FeedError::HistoryFetch`] when backfill fails; the feed stays live.
    #[instrument(name = "feed.attach", skip(self), fields(channel_id = %self.shared.channel_id), err)]
    pub async fn attach(&self) -> Result<(), FeedError> {
        if !self.shared.transition(STATE_DETACHED, STATE_ATTACHING) {
            return Err(match self.state() {
                FeedState::Closed => FeedError::Closed,
                _ => FeedError::AlreadyAttached,
            });
        }

        let live = match self.service.live_messages(&self.shared.channel_id).await {
            Ok(live) => live,
            Err(err) => {
                self.shared.transition(STATE_ATTACHING, STATE_DETACHED);
                return Err(FeedError::LiveStream(err));
            }
        };

        // Fixed before the pump starts: anything delivered from here on waits
        // in the subscription and must not move the cursor past missed history.
        let (cursor, limit) = {
            let window = self.shared.lock_window();
            let cursor = window.max_item().map(|message| message.message_id.clone());
            (cursor, window.limit())
        };

        let token = CancellationToken::new();
        *self.lock_cancel() = Some(token.clone());
        if !self.shared.transition(STATE_ATTACHING, STATE_LIVE) {
            // Detached while the subscription was opening.
            token.cancel();
            return Err(FeedError::Closed);
        }
        tokio::spawn(pump_live(Arc::clone(&self.shared), live, token));
        info!("live subscription open");

        let history = match self
            .service
            .message_history(&self.shared.channel_id, limit, cursor.as_deref())
            .await
        {
            Ok(history) => history,
            Err(err) => {
                counter!("chatfeed_backfill_failures_total").increment(1);
                warn!(error = %err, "backfill failed; continuing on live stream");
                return Err(FeedError::HistoryFetch(err));
            }
        };

        debug!(count = history.len(), cursor = ?cursor, "backfill received");
        counter!("chatfeed_backfill_messages_total").increment(history.len() as u64);
        self.shared.apply(history);
        Ok(())
    }

    /// Stops live delivery. Idempotent and callable from any thread; once it
    /// returns no new observer callback starts.
    pub fn detach(&self) {
        let previous = self.shared.state.swap(STATE_CLOSED, Ordering::SeqCst);
        if let Some(token) = self.lock_cancel().take() {
            token.cancel();
        }
        if previous != STATE_CLOSED {
            counter!("chatfeed_feed_detaches_total").increment(1);
            info!(channel_id = %self.shared.channel_id, "feed detached");
        }
    }

    /// Posts `text` to this feed's channel as `author`.
    ///
    /// # Errors
    /// [`FeedError::Validation`] for blank text, without contacting the
    /// service; [`FeedError::Post`] when the service rejects the message.
    pub async fn post(&self, author: &str, text: &str) -> Result<Message, FeedError> {
        PostMessageRequest::new(self.shared.channel_id.as_str(), author, text).validate()?;
        self.service
            .post_message(&self.shared.channel_id, author, text)
            .await
            .map_err(|err| match err {
                ChatServiceError::Validation(validation) => FeedError::Validation(validation),
                other => FeedError::Post(other),
            })
    }

    fn lock_cancel(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.cancel.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ChannelFeed {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for ChannelFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelFeed")
            .field("channel_id", &self.shared.channel_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
