//! `chatfeed simulate`: runs one feed against the in-memory service and
//! prints every window it receives.

use std::{
    fmt::Write as _,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use anyhow::{Context, Result};
use clap::Args;
use shared::{config::Config, models::Message};
use tokio::time::{Duration, sleep, timeout};
use tracing::info;

use crate::{
    feed::ChannelFeed,
    services::{ChatService, InMemoryChatService},
};

const SEED_AUTHOR: &str = "history";
const LIVE_AUTHOR: &str = "live";
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Args, Debug, Clone)]
#[command(about = "Attach a feed to an in-memory channel and stream updates")]
pub struct SimulateArgs {
    /// Name of the channel to create
    #[arg(long, default_value = "general")]
    pub channel: String,

    /// Messages seeded before attaching, and again posted live afterwards
    #[arg(long, default_value_t = 5)]
    pub messages: usize,

    /// Delay between live posts, in milliseconds
    #[arg(long, default_value_t = 250)]
    pub interval_ms: u64,

    /// Path to the configuration file (e.g., chatfeed.yaml or chatfeed.json)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Window size, overriding configuration and environment
    #[arg(long)]
    pub history_size: Option<usize>,
}

/// Outcome of a simulation run.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    /// Number of window updates the feed delivered.
    pub updates: usize,
    /// Window contents after the last live post was delivered.
    pub window: Vec<Message>,
}

/// Renders a window as one line per message, oldest first.
#[must_use]
pub fn render_window(window: &[Message]) -> String {
    let mut out = format!("--- window ({} messages) ---", window.len());
    for message in window {
        let _ = write!(
            out,
            "\n#{:<4} {} {}: {}",
            message.sequence_number, message.timestamp, message.author, message.text
        );
    }
    out
}

/// Seeds a channel, attaches a feed, posts live messages through it and
/// waits until the last one has been delivered.
///
/// # Errors
/// Returns an error if the channel cannot be created, the feed fails to
/// attach or post, or the final delivery does not arrive in time.
pub async fn run_simulation(config: &Config, args: &SimulateArgs) -> Result<SimulationReport> {
    let service = Arc::new(InMemoryChatService::new(config.feed.live_buffer));
    let channel = service
        .create_channel(&args.channel)
        .await
        .context("failed to create channel")?;

    for idx in 1..=args.messages {
        service
            .post_message(&channel.id, SEED_AUTHOR, &format!("history message {idx}"))
            .await
            .context("failed to seed history")?;
    }

    let updates = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&updates);
    let feed = ChannelFeed::new(
        service,
        channel.id.clone(),
        config.feed.history_size,
        move |window: &[Message]| {
            counter.fetch_add(1, Ordering::SeqCst);
            println!("{}", render_window(window));
        },
    )?;

    feed.attach().await.context("failed to attach feed")?;
    info!(channel = %args.channel, "feed attached");

    let mut last_sequence = None;
    for idx in 1..=args.messages {
        sleep(Duration::from_millis(args.interval_ms)).await;
        let posted = feed
            .post(LIVE_AUTHOR, &format!("live message {idx}"))
            .await
            .context("failed to post live message")?;
        last_sequence = Some(posted.sequence_number);
    }

    if let Some(sequence) = last_sequence {
        timeout(DELIVERY_TIMEOUT, async {
            while feed.snapshot().last().map(|m| m.sequence_number) != Some(sequence) {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .context("live delivery did not arrive in time")?;
    }

    let window = feed.snapshot();
    feed.detach();

    Ok(SimulationReport {
        updates: updates.load(Ordering::SeqCst),
        window,
    })
}
