//! Process-wide tracing subscriber setup.

use anyhow::anyhow;
use shared::config::{Config, LogFormat};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt};

/// Installs the global tracing subscriber described by `config.logging`.
///
/// `RUST_LOG` wins over the configured level when it is set.
///
/// # Errors
/// Fails if a global subscriber has already been installed.
pub fn initialize_tracing(config: &Config) -> anyhow::Result<String> {
    let env_filter = build_env_filter(config);

    let fmt_builder = fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false);

    let installed = if matches!(config.logging.format, LogFormat::Json) {
        fmt_builder.json().with_ansi(false).try_init()
    } else {
        fmt_builder.with_ansi(true).try_init()
    };
    installed.map_err(|err| anyhow!(err))?;

    Ok(config.logging.level.clone())
}

pub(crate) fn build_env_filter(config: &Config) -> EnvFilter {
    let default_level = config
        .logging
        .level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);

    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(default_level.into())
            .from_env_lossy()
    })
}
