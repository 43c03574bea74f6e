//! Disk LRU CLI
//!
//! Thin front end over the cache engine: each invocation opens the
//! store, performs one operation and closes it. Errors terminate the
//! process with a diagnostic message.

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use disk_lru::{DiskLru, Options};

#[derive(Parser)]
#[command(name = "disk-lru", about = "A persistent LRU/TTL key/value cache")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Get a string from the cache
    Get {
        /// Cache filename
        filename: String,
        /// The key to look up
        key: String,
    },
    /// Set a string into the cache
    Set {
        /// Cache filename
        filename: String,
        /// The key to store
        key: String,
        /// The value to store
        value: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "disk_lru=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Get { filename, key } => {
            let cache: DiskLru<String> =
                DiskLru::open(Options::new(&filename)).context("Creating cache")?;

            let value = cache.get(&key).context("Getting cache")?;
            println!("Value {value}");

            cache.close().await.context("Closing cache")?;
        }
        Command::Set {
            filename,
            key,
            value,
        } => {
            let cache: DiskLru<String> =
                DiskLru::open(Options::new(&filename)).context("Creating cache")?;

            cache.set(&key, &value).context("Setting cache")?;

            cache.close().await.context("Closing cache")?;
        }
    }

    Ok(())
}
