use anyhow::{Context, Result};
use clap::Parser;
use pulse_core::{
    prepend_to_latest, save_edition, Config, Curator, DirSource, EditionStore, GeminiClient,
    PageTextExtractor,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "curate-article")]
#[command(about = "Summarize a URL with Gemini and add it to the newest Pulse edition")]
struct Args {
    /// Article URL to curate
    #[arg(short, long)]
    url: String,

    /// Article text; fetched from the URL when omitted
    #[arg(short, long)]
    text: Option<String>,

    /// Directory holding the edition JSON files
    #[arg(short, long, default_value = "public/_data")]
    data_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    let raw_text = match args.text {
        Some(text) => text,
        None => {
            println!("\n🌐 Extracting article content...");
            PageTextExtractor::new()?
                .fetch_text(&args.url)
                .await
                .with_context(|| format!("Could not extract any text from {}", args.url))?
        }
    };

    println!("\n🤖 Generating article with Gemini...");
    let curator = Curator::new(GeminiClient::new(config.gemini_api_key()?)?);
    let article = match curator.curate(&args.url, &raw_text).await {
        Ok(article) => article,
        Err(e) => anyhow::bail!(
            "Failed to generate article content: {}. Please check your API key.",
            e
        ),
    };
    println!("✓ {} [{}]", article.title, article.category);

    println!("\n📚 Adding to the newest edition...");
    let store = EditionStore::new(Box::new(DirSource::new(&args.data_dir)), config.fallback_dates);
    let mut editions = store.load_all_editions().await;
    let latest = prepend_to_latest(&mut editions, article)?;
    let path = save_edition(&args.data_dir, latest).context("Failed to save edition")?;

    println!(
        "\n✅ Edition {} now has {} articles: {}",
        latest.id,
        latest.articles.len(),
        path.display()
    );

    Ok(())
}
