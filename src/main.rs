// SPDX-License-Identifier: GPL-3.0-only

use card_scanner::Config;
use card_scanner::constants::app_info;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

mod cli;

#[derive(Parser)]
#[command(name = "card-scanner")]
#[command(about = "Turn photographed text and scanned barcodes into note content")]
#[command(version = app_info::version())]
struct Cli {
    /// Config file to use instead of the user config
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the live scanner (Enter captures a still, Ctrl+C quits)
    Scan {
        /// V4L2 device node (default from config)
        #[arg(short, long)]
        device: Option<String>,

        /// Replay these images instead of using a camera
        #[arg(short, long, num_args = 1..)]
        images: Vec<PathBuf>,
    },

    /// Capture one still and print the recognized text
    Capture {
        /// V4L2 device node (default from config)
        #[arg(short, long)]
        device: Option<String>,

        /// Replay these images instead of using a camera
        #[arg(short, long, num_args = 1..)]
        images: Vec<PathBuf>,

        /// Milliseconds to let the camera settle before capturing
        #[arg(long, default_value = "500")]
        warmup_ms: u64,
    },

    /// Decode barcodes in image files
    Decode {
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },

    /// Recognize text in an image file
    Recognize { image: PathBuf },

    /// List captured stills, newest first
    Captures {
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Print the effective configuration
    Config {
        /// Print the config file location instead
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=card_scanner=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };

    match cli.command {
        Commands::Scan { device, images } => {
            cli::scan(&config, cli::SourceArgs { device, images }).await
        }
        Commands::Capture {
            device,
            images,
            warmup_ms,
        } => {
            cli::capture(
                &config,
                cli::SourceArgs { device, images },
                Duration::from_millis(warmup_ms),
            )
            .await
        }
        Commands::Decode { images } => cli::decode(&config, images).await,
        Commands::Recognize { image } => cli::recognize(&config, image).await,
        Commands::Captures { limit } => cli::captures(&config, limit).await,
        Commands::Config { path } => cli::config(&config, path),
    }
}
