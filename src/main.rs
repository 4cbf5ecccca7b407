//! Deputy CLI - inspect and maintain cross-tab review sessions.
//!
//! This is the main binary entry point. See the `deputy` library for the
//! core functionality.

use anyhow::Result;
use clap::{Parser, Subcommand};
use deputy::{commands, Config, Storage};
use mimalloc::MiMalloc;

/// Global allocator configured per M-MIMALLOC-APPS guideline.
/// mimalloc provides better multi-threaded performance than the system allocator.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use commands::VERSION;

// CLI
#[derive(Parser)]
#[command(name = "deputy")]
#[command(version = VERSION)]
#[command(about = "Cross-tab session coordinator for case page review")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the stored session
    Status,
    /// Inspect and maintain case page cache records
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Manage the stored session
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// Print the effective configuration as JSON
    Config {
        /// Also write it to config.json
        #[arg(long)]
        write: bool,
    },
    /// Run a three-tab walkthrough in-process
    Simulate,
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached case pages, most recently active first
    List,
    /// Show one cache record
    Show {
        /// Case page id
        page_id: u64,
    },
    /// Delete one cache record
    Delete {
        /// Case page id
        page_id: u64,
    },
    /// Delete records older than the configured retention
    Prune,
}

#[derive(Subcommand)]
enum SessionAction {
    /// Force-clear the stored session
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    log::debug!("deputy v{} ({})", VERSION, deputy::env::Environment::current());

    match cli.command {
        Commands::Status => {
            let storage = Storage::open(config.storage_dir()?)?;
            commands::status::run(&storage).await?;
        }
        Commands::Cache { action } => {
            let storage = Storage::open(config.storage_dir()?)?;
            match action {
                CacheAction::List => commands::cache::list(&storage).await?,
                CacheAction::Show { page_id } => commands::cache::show(&storage, page_id).await?,
                CacheAction::Delete { page_id } => {
                    commands::cache::delete(&storage, page_id).await?;
                }
                CacheAction::Prune => {
                    commands::cache::prune(&storage, config.cache_retention()).await?;
                }
            }
        }
        Commands::Session {
            action: SessionAction::Clear { yes },
        } => {
            let storage = Storage::open(config.storage_dir()?)?;
            commands::session::clear(&storage, yes).await?;
        }
        Commands::Config { write } => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            if write {
                let path = config.save()?;
                println!("✓ Wrote {}", path.display());
            }
        }
        Commands::Simulate => {
            commands::simulate::run(&config).await?;
        }
    }

    Ok(())
}
