//! imagebot CLI
//!
//! Orchestrates container image rebuilds across a dependency graph of
//! image definitions.
//!
//! # Usage
//!
//! ```bash
//! # Re-tag 'base' and rebuild everything that follows it
//! imagebot update base 2.0
//!
//! # Reprocess the images downstream of 'base' without re-tagging it
//! imagebot update base
//!
//! # Show every definition with its current tag
//! imagebot status
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use imagebot::Orchestrator;

#[derive(Parser)]
#[command(name = "imagebot")]
#[command(author, version, about = "Container image build orchestrator", long_about = None)]
struct Cli {
    /// Path to the image definitions file
    #[arg(short, long, default_value = ".imagebot.toml")]
    file: PathBuf,

    /// Logger level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Update an image and rebuild everything that depends on it
    Update {
        /// The alias of the image to update
        alias: String,

        /// The new tag; omit to only reprocess dependent images
        tag: Option<String>,
    },

    /// Show every image definition with its current tag
    Status,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level: tracing::Level = match cli.log_level.parse() {
        Ok(level) => level,
        Err(_) => {
            eprintln!("Error: invalid log level '{}'", cli.log_level);
            std::process::exit(2);
        }
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Update { alias, tag } => cmd_update(&cli.file, &alias, tag.as_deref()).await,
        Commands::Status => cmd_status(&cli.file),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn cmd_update(file: &Path, alias: &str, tag: Option<&str>) -> Result<()> {
    let mut bot = Orchestrator::load(file)
        .with_context(|| format!("loading image definitions from {}", file.display()))?;

    bot.run(alias, tag).await?;
    Ok(())
}

fn cmd_status(file: &Path) -> Result<()> {
    let bot = Orchestrator::load(file)
        .with_context(|| format!("loading image definitions from {}", file.display()))?;

    println!("Image definitions ({})", file.display());
    for (alias, def) in bot.store().images() {
        let kind = if def.workdir.is_some() {
            "buildable"
        } else {
            "tag only"
        };
        println!(
            "  {:<20} {}:{} [{}]",
            alias,
            def.canonical_image(alias),
            def.tag,
            kind
        );
    }

    Ok(())
}
