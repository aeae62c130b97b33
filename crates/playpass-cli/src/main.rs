//! PlayPass CLI - headless device-to-playback authorization
//!
//! Features:
//! - Run the authorization pipeline against the configured backend
//! - Hand the resulting playback configuration to a headless player
//! - List the DRM profile catalog
//! - Validate configuration files

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;
mod player;
mod progress;

/// PlayPass CLI - DRM playback authorization
#[derive(Parser)]
#[command(name = "playpass-cli")]
#[command(author = "PlayPass Developers")]
#[command(version)]
#[command(about = "Register a device, log in and fetch DRM tokens for playback", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Output format (text, json, table)
    #[arg(short, long, global = true, default_value = "text")]
    format: String,

    /// Path to the TOML configuration
    #[arg(short, long, global = true, default_value = "playpass.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the authorization pipeline and prepare playback
    Run {
        /// DRM profile to play with (defaults to the first one)
        #[arg(short, long)]
        profile: Option<String>,

        /// Scheme requested from the DRM token endpoint (overrides the config)
        #[arg(long)]
        drm_scheme: Option<String>,

        /// Enable UHD output; the panel must support 4K
        #[arg(long)]
        uhd: bool,

        /// Print tokens in full instead of redacted
        #[arg(long)]
        show_tokens: bool,
    },

    /// List DRM profiles
    Profiles,

    /// Validate the configuration file
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    if cli.log_json {
        tracing_subscriber::fmt().json().with_env_filter(level).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(level).init();
    }
    playpass_core::init();

    match cli.command {
        Commands::Run {
            profile,
            drm_scheme,
            uhd,
            show_tokens,
        } => {
            let options = commands::RunOptions {
                profile,
                drm_scheme,
                uhd,
                show_tokens,
            };
            commands::run(&cli.config, options, &cli.format).await?;
        }
        Commands::Profiles => {
            commands::profiles(&cli.config, &cli.format)?;
        }
        Commands::CheckConfig => {
            commands::check_config(&cli.config, &cli.format)?;
        }
    }

    Ok(())
}
