#![cfg_attr(not(test), forbid(unsafe_code))]

//! Main entry point for the `chatfeed` CLI.

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use server::{
    commands::{
        self,
        simulate::{SimulateArgs, run_simulation},
    },
    tracer::initialize_tracing,
};
use shared::config::Config;

/// chatfeed CLI
#[derive(Parser)]
#[command(name = "chatfeed")]
#[command(about = "Bounded, gap-free live channel feeds", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Subcommands for the chatfeed CLI
#[derive(Subcommand)]
enum Commands {
    /// Run a feed against an in-memory channel and print every window update
    Simulate(SimulateArgs),

    /// Generate a configuration file
    Config {
        /// Format of the configuration file to generate (yaml or json). Defaults to yaml.
        #[arg(
            long,
            short,
            help = "Format of the configuration file to generate (yaml or json). Defaults to yaml."
        )]
        format: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate(args) => {
            let config = Config::load_config(args.config.clone(), args.history_size)
                .map_err(|err| anyhow::anyhow!(err))
                .context("failed to load configuration")?;
            initialize_tracing(&config)?;
            let report = run_simulation(&config, &args).await?;
            println!(
                "Simulation finished: {} updates, {} messages in the final window.",
                report.updates,
                report.window.len()
            );
        }
        Commands::Config { format } => {
            let format = format.unwrap_or_else(|| "yaml".to_string());
            commands::config::generate_config(&format, Path::new("."))?;
        }
    }

    Ok(())
}
