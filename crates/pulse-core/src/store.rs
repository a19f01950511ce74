use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use std::path::PathBuf;
use url::Url;

use crate::config::{Config, DataLocation};
use crate::models::DailyEdition;

pub const INDEX_FILE: &str = "index.json";

/// Raw access to the edition index and edition payloads
#[async_trait]
pub trait EditionSource: Send + Sync {
    /// JSON array of date keys
    async fn fetch_index(&self) -> Result<String>;

    /// JSON object for the edition stored under `date_key`
    async fn fetch_edition(&self, date_key: &str) -> Result<String>;
}

/// Static files served over HTTP, e.g. `https://host/_data/`
pub struct HttpSource {
    client: Client,
    base_url: Url,
}

impl HttpSource {
    pub fn new(base_url: Url) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (compatible; Pulse/1.0)")
            .build()
            .context("Failed to create HTTP client")?;

        // Url::join drops the last segment unless the base ends with '/'
        let base_url = if base_url.path().ends_with('/') {
            base_url
        } else {
            let mut url = base_url;
            let path = format!("{}/", url.path());
            url.set_path(&path);
            url
        };

        Ok(Self { client, base_url })
    }

    async fn get_text(&self, url: Url) -> Result<String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP error {} for {}", status, url);
        }

        response.text().await.context("Failed to read response body")
    }
}

#[async_trait]
impl EditionSource for HttpSource {
    async fn fetch_index(&self) -> Result<String> {
        let mut url = self.base_url.join(INDEX_FILE)?;
        // Cache buster: the index changes whenever an edition is published
        url.query_pairs_mut()
            .append_pair("v", &chrono::Utc::now().timestamp_millis().to_string());
        self.get_text(url).await
    }

    async fn fetch_edition(&self, date_key: &str) -> Result<String> {
        let url = self.base_url.join(&format!("{}.json", date_key))?;
        self.get_text(url).await
    }
}

/// Edition files in a local directory
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn read(&self, filename: &str) -> Result<String> {
        let path = self.root.join(filename);
        tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }
}

#[async_trait]
impl EditionSource for DirSource {
    async fn fetch_index(&self) -> Result<String> {
        self.read(INDEX_FILE).await
    }

    async fn fetch_edition(&self, date_key: &str) -> Result<String> {
        self.read(&format!("{}.json", date_key)).await
    }
}

pub struct EditionStore {
    source: Box<dyn EditionSource>,
    fallback_dates: Vec<String>,
}

impl EditionStore {
    pub fn new(source: Box<dyn EditionSource>, fallback_dates: Vec<String>) -> Self {
        Self {
            source,
            fallback_dates,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let source: Box<dyn EditionSource> = match &config.data {
            DataLocation::Remote(url) => Box::new(HttpSource::new(url.clone())?),
            DataLocation::Local(dir) => Box::new(DirSource::new(dir.clone())),
        };
        Ok(Self::new(source, config.fallback_dates.clone()))
    }

    /// Load one edition. Every failure is logged and reported as `None`.
    pub async fn load_edition(&self, date_key: &str) -> Option<DailyEdition> {
        let body = match self.source.fetch_edition(date_key).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(date_key, error = %e, "Failed to load edition");
                return None;
            }
        };

        match serde_json::from_str::<DailyEdition>(&body) {
            Ok(edition) => Some(edition),
            Err(e) => {
                tracing::warn!(date_key, error = %e, "Failed to parse edition");
                None
            }
        }
    }

    /// Date keys from the index, or the fallback list if the index is unavailable
    pub async fn load_index(&self) -> Vec<String> {
        let parsed = match self.source.fetch_index().await {
            Ok(body) => serde_json::from_str::<Vec<String>>(&body)
                .context("Failed to parse edition index"),
            Err(e) => Err(e),
        };

        match parsed {
            Ok(dates) => dates,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load edition index, using fallback");
                self.fallback_dates.clone()
            }
        }
    }

    /// Load every indexed edition concurrently, newest first.
    ///
    /// Missing or malformed editions are dropped. Ties keep index order and
    /// editions with an unparseable date sort last.
    pub async fn load_all_editions(&self) -> Vec<DailyEdition> {
        let dates = self.load_index().await;

        let results = join_all(dates.iter().map(|date| self.load_edition(date))).await;

        let mut editions: Vec<DailyEdition> = results.into_iter().flatten().collect();
        sort_newest_first(&mut editions);
        editions
    }
}

/// Stable sort by parsed timestamp, newest first
pub fn sort_newest_first(editions: &mut [DailyEdition]) {
    editions.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
}


#[cfg(test)]
mod tests {
    use super::fakes::MemorySource;
    use super::*;
    use crate::models::fixtures::edition;

    fn ids(editions: &[DailyEdition]) -> Vec<&str> {
        editions.iter().map(|e| e.id.as_str()).collect()
    }

    // ==================== Loading Tests ====================

    #[tokio::test]
    async fn test_load_all_editions_newest_first() {
        let mut source = MemorySource::with_index(&["2025-01-01", "2025-01-03"]);
        source.insert("2025-01-01", &edition("ed-1", "2025-01-01"));
        source.insert("2025-01-03", &edition("ed-2", "2025-01-03"));

        let store = EditionStore::new(Box::new(source), Vec::new());
        let editions = store.load_all_editions().await;

        assert_eq!(ids(&editions), vec!["ed-2", "ed-1"]);
    }

    #[tokio::test]
    async fn test_sort_uses_timestamps_not_strings() {
        let mut source = MemorySource::with_index(&["a", "b", "c"]);
        source.insert("a", &edition("early", "2025-01-03"));
        source.insert("b", &edition("late", "2025-01-03T18:00:00Z"));
        source.insert("c", &edition("mid", "2025-01-03T09:00:00+05:00"));

        let store = EditionStore::new(Box::new(source), Vec::new());
        let editions = store.load_all_editions().await;

        assert_eq!(ids(&editions), vec!["late", "mid", "early"]);
        for pair in editions.windows(2) {
            assert!(pair[0].timestamp() >= pair[1].timestamp());
        }
    }

    #[tokio::test]
    async fn test_missing_and_malformed_editions_are_dropped() {
        let mut source = MemorySource::with_index(&["2025-01-01", "2025-01-02", "2025-01-03"]);
        source.insert("2025-01-01", &edition("ed-1", "2025-01-01"));
        source
            .editions
            .insert("2025-01-02".to_string(), "{not json".to_string());
        let expected = edition("ed-3", "2025-01-03");
        source.insert("2025-01-03", &expected);

        let store = EditionStore::new(Box::new(source), Vec::new());
        let editions = store.load_all_editions().await;

        assert_eq!(ids(&editions), vec!["ed-3", "ed-1"]);
        assert_eq!(editions[0], expected);
    }

    #[tokio::test]
    async fn test_duplicate_dates_keep_index_order() {
        let mut source = MemorySource::with_index(&["x", "y"]);
        source.insert("x", &edition("first", "2025-01-02"));
        source.insert("y", &edition("second", "2025-01-02"));

        let store = EditionStore::new(Box::new(source), Vec::new());
        let editions = store.load_all_editions().await;

        assert_eq!(ids(&editions), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_unparseable_dates_sort_last() {
        let mut source = MemorySource::with_index(&["x", "y"]);
        source.insert("x", &edition("bad", "someday"));
        source.insert("y", &edition("good", "2024-06-01"));

        let store = EditionStore::new(Box::new(source), Vec::new());
        let editions = store.load_all_editions().await;

        assert_eq!(ids(&editions), vec!["good", "bad"]);
    }

    #[tokio::test]
    async fn test_offset_less_timestamps_sort_with_bare_dates() {
        let mut source = MemorySource::with_index(&["a", "b", "c"]);
        source.insert("a", &edition("old", "2025-01-01"));
        source.insert("b", &edition("new", "2025-01-05T10:00:00"));
        source.insert("c", &edition("mid", "2025-01-03"));

        let store = EditionStore::new(Box::new(source), Vec::new());
        let editions = store.load_all_editions().await;

        assert_eq!(ids(&editions), vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn test_index_failure_uses_fallback_dates() {
        let mut source = MemorySource::default();
        source.insert("2025-01-01", &edition("ed-1", "2025-01-01"));

        let store = EditionStore::new(Box::new(source), vec!["2025-01-01".to_string()]);
        let editions = store.load_all_editions().await;

        assert_eq!(ids(&editions), vec!["ed-1"]);
    }

    #[tokio::test]
    async fn test_malformed_index_uses_fallback_dates() {
        let source = MemorySource {
            index: Some("{\"dates\": []}".to_string()),
            ..MemorySource::default()
        };

        let store = EditionStore::new(Box::new(source), vec!["missing".to_string()]);
        assert_eq!(store.load_index().await, vec!["missing".to_string()]);
        assert!(store.load_all_editions().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_edition_absent_on_missing_key() {
        let store = EditionStore::new(Box::new(MemorySource::default()), Vec::new());
        assert!(store.load_edition("2030-01-01").await.is_none());
    }

    // ==================== Directory Source Tests ====================

    #[tokio::test]
    async fn test_dir_source_reads_index_and_editions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(INDEX_FILE), r#"["2025-01-01"]"#).unwrap();
        std::fs::write(
            dir.path().join("2025-01-01.json"),
            serde_json::to_string(&edition("ed-1", "2025-01-01")).unwrap(),
        )
        .unwrap();

        let store = EditionStore::new(Box::new(DirSource::new(dir.path())), Vec::new());
        let editions = store.load_all_editions().await;

        assert_eq!(ids(&editions), vec!["ed-1"]);
    }

    #[test]
    fn test_http_source_normalizes_base_url() {
        let source = HttpSource::new(Url::parse("https://example.com/_data").unwrap()).unwrap();
        assert_eq!(
            source.base_url.join("2025-01-01.json").unwrap().as_str(),
            "https://example.com/_data/2025-01-01.json"
        );
    }
}
