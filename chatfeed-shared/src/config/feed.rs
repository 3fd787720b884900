use serde::{Deserialize, Serialize};

/// Default window size; matches the message list of the channel view.
pub const DEFAULT_HISTORY_SIZE: usize = 20;

/// Default per-channel capacity of the live fan-out channel.
pub const DEFAULT_LIVE_BUFFER: usize = 256;

/// Channel feed settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FeedConfig {
    /// Number of most recent messages a feed keeps and requests as backfill.
    pub history_size: usize,
    /// Capacity of each channel's live broadcast queue before slow
    /// subscribers start lagging.
    pub live_buffer: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            history_size: DEFAULT_HISTORY_SIZE,
            live_buffer: DEFAULT_LIVE_BUFFER,
        }
    }
}
