use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pulse_core::{
    Config, DailyEdition, DataLocation, EditionStore, EllipsisMode, FileStore, ReadTracker,
    ShareCompositor, SlideTracker, SourceImageLoader,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pulse-feed")]
#[command(about = "Browse Pulse daily editions, track what you've read and share editions")]
struct Args {
    /// Edition data location (URL or directory); overrides PULSE_DATA
    #[arg(short, long, global = true)]
    data: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List editions, newest first, with unread markers
    List,
    /// Mark an edition as read
    Read {
        /// Edition id or date
        edition: String,
    },
    /// Forget every read edition
    Clear,
    /// Render the share image for an edition
    Share {
        /// Edition id or date
        edition: String,

        /// Directory to save the image in
        #[arg(short, long, default_value = ".")]
        out: PathBuf,

        /// Reproduce the legacy three-character headline cut
        #[arg(long)]
        legacy_ellipsis: bool,
    },
    /// Report the slide shown at a scroll position, marking the edition read past the cover
    View {
        /// Edition id or date
        edition: String,

        #[arg(long)]
        scroll_left: f32,

        #[arg(long)]
        slide_width: f32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(data) = &args.data {
        config.data = DataLocation::parse(data)?;
    }

    let reads = ReadTracker::new(FileStore::open(&config.state_dir)?);

    match args.command {
        Command::List => {
            let editions = load_editions(&config).await?;
            for edition in &editions {
                let marker = if reads.is_read(&edition.id) { " " } else { "•" };
                println!(
                    "{} {}  {}  ({} articles)",
                    marker,
                    edition.date,
                    edition.title,
                    edition.articles.len()
                );
            }
            let unread = reads.unread_count(editions.iter().map(|e| e.id.as_str()));
            println!("\n{} of {} editions unread", unread, editions.len());
        }
        Command::Read { edition } => {
            let editions = load_editions(&config).await?;
            let edition = find_edition(&editions, &edition)?;
            reads.mark_as_read(&edition.id);
            println!("✓ Marked {} ({}) as read", edition.id, edition.date);
        }
        Command::Clear => {
            reads.clear();
            println!("✓ Read history cleared");
        }
        Command::Share {
            edition,
            out,
            legacy_ellipsis,
        } => {
            let editions = load_editions(&config).await?;
            let edition = find_edition(&editions, &edition)?;

            println!("\n🎨 Rendering share image...");
            let mode = if legacy_ellipsis {
                EllipsisMode::TrimChars
            } else {
                EllipsisMode::FitWidth
            };
            let compositor =
                ShareCompositor::new(Box::new(SourceImageLoader::new()?)).with_ellipsis(mode);
            let artifact = compositor
                .share(edition, &config.share_url)
                .await
                .context("Could not render the share image")?;

            let path = artifact.save_to(&out)?;
            println!("✓ Saved {}", path.display());
            println!("\n{}\n{}\n{}", artifact.title, artifact.text, artifact.url);
        }
        Command::View {
            edition,
            scroll_left,
            slide_width,
        } => {
            let editions = load_editions(&config).await?;
            let edition = find_edition(&editions, &edition)?;
            let mut tracker = SlideTracker::new(edition);
            match tracker.on_scroll(scroll_left, slide_width, &reads) {
                Some(transition) => println!(
                    "Slide {} -> {}: {:?}",
                    transition.from, transition.to, transition.slide
                ),
                None => println!("Still on the cover"),
            }
            let unread = reads.unread_count(editions.iter().map(|e| e.id.as_str()));
            println!("{} editions unread", unread);
        }
    }

    Ok(())
}

async fn load_editions(config: &Config) -> Result<Vec<DailyEdition>> {
    println!("📚 Loading editions...");
    let store = EditionStore::from_config(config)?;
    let editions = store.load_all_editions().await;
    if editions.is_empty() {
        anyhow::bail!("No editions could be loaded. Check PULSE_DATA or --data.");
    }
    println!("✓ Loaded {} editions\n", editions.len());
    Ok(editions)
}

/// Look an edition up by id first, then by date
fn find_edition<'a>(editions: &'a [DailyEdition], key: &str) -> Result<&'a DailyEdition> {
    editions
        .iter()
        .find(|e| e.id == key)
        .or_else(|| editions.iter().find(|e| e.date == key))
        .ok_or_else(|| anyhow::anyhow!("No edition with id or date '{}'", key))
}
