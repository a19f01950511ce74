use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pulse_core::publish::Payload;
use pulse_core::{process_payload, update_index};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "publish-edition")]
#[command(about = "Write generated editions into the data directory and keep index.json current")]
struct Args {
    /// Directory holding the edition JSON files
    #[arg(short, long, default_value = "public/_data", global = true)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Save every completed edition from a generation payload file
    Payload {
        /// Path to the payload JSON file
        file: PathBuf,
    },
    /// Rebuild index.json from the YYYY-MM-DD.json files present
    Index,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Command::Payload { file } => {
            println!("📖 Reading payload: {}", file.display());
            let content = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read payload: {}", file.display()))?;
            let payload: Payload = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse payload JSON from {}", file.display()))?;

            let report = process_payload(&args.data_dir, payload)?;
            for path in &report.written {
                println!("✓ Saved edition: {}", path.display());
            }
            if report.errors > 0 {
                println!("⚠ Skipped {} invalid edition items", report.errors);
            }
            if report.written.is_empty() {
                println!("No new completed editions found to process.");
            } else {
                println!(
                    "\n✅ Updated index.json with {} editions.",
                    report.index.len()
                );
            }
        }
        Command::Index => {
            if !args.data_dir.exists() {
                println!("Directory {} does not exist. Skipping.", args.data_dir.display());
                return Ok(());
            }
            let keys = update_index(&args.data_dir)?;
            if keys.is_empty() {
                println!("No valid edition files found.");
            } else {
                println!("✅ Updated index.json with {} editions.", keys.len());
            }
        }
    }

    Ok(())
}
