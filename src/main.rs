// SPDX-License-Identifier: GPL-3.0-only

use camera_stream::stream::Mode;
use clap::{Parser, Subcommand};

mod cli;

#[derive(Parser)]
#[command(name = "camera-stream")]
#[command(about = "Camera preview stream configuration controller demo")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the virtual devices the demo configures against
    List {
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the controller against the virtual device hub until Ctrl-C
    Run {
        /// Capture mode to configure (photo, video, square, portrait)
        #[arg(short, long, default_value = "photo")]
        mode: Mode,

        /// Make the built-in camera fail its first acquisition attempts
        #[arg(long)]
        flaky: bool,

        /// Suspend the app after this many seconds
        #[arg(long)]
        suspend_after: Option<u64>,

        /// Resume this many seconds after suspending
        #[arg(long)]
        resume_after: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=camera_stream=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List { json } => cli::list_devices(json),
        Commands::Run {
            mode,
            flaky,
            suspend_after,
            resume_after,
        } => cli::run_preview(mode, flaky, suspend_after, resume_after).await,
    }
}
