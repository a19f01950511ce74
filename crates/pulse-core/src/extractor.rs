use anyhow::{Context, Result};
use reqwest::Client;

/// Pages shorter than this are treated as paywalls or error pages
const MIN_TEXT_LEN: usize = 100;
/// Text sent to the generative service is capped at this many bytes
const MAX_TEXT_LEN: usize = 10_000;

/// Fetches a page and reduces it to plain text for curation
pub struct PageTextExtractor {
    client: Client,
}

impl PageTextExtractor {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (compatible; Pulse/1.0)")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Page text, or `None` when the page is unreachable or has no usable content
    pub async fn fetch_text(&self, url: &str) -> Option<String> {
        for attempt in 0..3 {
            match self.try_fetch(url).await {
                Ok(text) => return text,
                Err(e) => {
                    if attempt == 2 {
                        tracing::warn!(url, error = %e, "Failed to fetch page text");
                        return None;
                    }
                    let backoff = std::time::Duration::from_millis(500 * (2_u64.pow(attempt)));
                    tokio::time::sleep(backoff).await;
                }
            }
        }
        None
    }

    async fn try_fetch(&self, url: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send HTTP request")?;

        let status = response.status();
        if status == 401 || status == 403 || status == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            anyhow::bail!("HTTP error: {}", status);
        }

        let html = response.text().await.context("Failed to read response body")?;
        Ok(html_to_text(&html))
    }
}

fn html_to_text(html: &str) -> Option<String> {
    let text = html2text::from_read(html.as_bytes(), 100);
    let text = text.trim();
    if text.len() < MIN_TEXT_LEN {
        return None;
    }

    let mut end = text.len().min(MAX_TEXT_LEN);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    Some(text[..end].to_string())
}
