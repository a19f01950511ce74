use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use url::Url;

pub const DEFAULT_DATA_URL: &str = "https://pulse.saveaday.ai/_data/";
pub const DEFAULT_SHARE_URL: &str = "https://pulse.saveaday.ai";

/// Where edition JSON files are read from
#[derive(Debug, Clone, PartialEq)]
pub enum DataLocation {
    Remote(Url),
    Local(PathBuf),
}

impl DataLocation {
    /// `http(s)://` values are remote, anything else is a directory path
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.starts_with("http://") || value.starts_with("https://") {
            let url = Url::parse(value).with_context(|| format!("Invalid data URL: {}", value))?;
            Ok(DataLocation::Remote(url))
        } else {
            Ok(DataLocation::Local(PathBuf::from(value)))
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data: DataLocation,
    pub fallback_dates: Vec<String>,
    pub state_dir: PathBuf,
    pub share_url: String,
    gemini_api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Try to load .env from multiple locations
        Self::try_load_dotenv();

        let data = DataLocation::parse(
            &env::var("PULSE_DATA").unwrap_or_else(|_| DEFAULT_DATA_URL.to_string()),
        )?;

        let fallback_dates = env::var("PULSE_FALLBACK_DATES")
            .map(|v| parse_date_list(&v))
            .unwrap_or_default();

        let state_dir = match env::var("PULSE_STATE_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => dirs::data_local_dir()
                .context("Could not determine local data directory. Set PULSE_STATE_DIR instead.")?
                .join("pulse")
                .join("storage"),
        };

        let share_url = env::var("PULSE_SHARE_URL").unwrap_or_else(|_| DEFAULT_SHARE_URL.to_string());

        let gemini_api_key = env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty());

        Ok(Self {
            data,
            fallback_dates,
            state_dir,
            share_url,
            gemini_api_key,
        })
    }

    /// Only curation talks to the generative service, so the key is checked lazily
    pub fn gemini_api_key(&self) -> Result<&str> {
        self.gemini_api_key.as_deref().context(
            "GEMINI_API_KEY not found.\n\n\
            To fix this, create ~/.config/pulse/.env with:\n  \
            GEMINI_API_KEY=your_key_here\n\n\
            Get a Gemini API key from: https://aistudio.google.com/apikey",
        )
    }

    fn try_load_dotenv() {
        // 1. Current directory (for development)
        if dotenvy::dotenv().is_ok() {
            return;
        }

        // 2. ~/.config/pulse/.env
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("pulse").join(".env");
            if config_path.exists() && dotenvy::from_path(&config_path).is_ok() {
                return;
            }
        }

        // 3. ~/.env
        if let Some(home_dir) = dirs::home_dir() {
            let home_path = home_dir.join(".env");
            if home_path.exists() {
                let _ = dotenvy::from_path(&home_path);
            }
        }
    }
}

fn parse_date_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(String::from)
        .collect()
}
