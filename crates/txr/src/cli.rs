//! CLI parser.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "txr")]
#[command(about = "Relay payment references from Telegram to a verification API", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the webhook and operational endpoints (default).
    Serve {
        /// Overrides PORT.
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Receive updates by long polling instead of a webhook.
    Poll,
    /// Show what would be extracted from TEXT; nothing is relayed.
    Extract {
        text: String,
        #[arg(long)]
        json: bool,
    },
    /// Fetch the remote bot configuration and print a redacted summary.
    CheckConfig,
    /// Register <WEBHOOK_URL>/webhook with Telegram.
    SetWebhook,
}
