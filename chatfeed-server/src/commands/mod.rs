//! Subcommands of the `chatfeed` binary.

pub mod config;
pub mod simulate;
