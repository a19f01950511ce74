use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_AUTHOR: &str = "Pretheesh";
pub const DEFAULT_HEADLINE: &str = "Daily Intelligence";
pub const DEFAULT_SHARE_TITLE: &str = "Pulse Intelligence";

pub const MAX_ARTICLE_TITLE: usize = 80;
pub const MAX_SHORT_DESCRIPTION: usize = 120;
pub const MAX_FULL_SUMMARY: usize = 400;

/// A single curated story
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub url: String,
    pub title: String,
    pub short_description: String,
    pub full_summary: String,
    pub image_url: String,
    pub date: String,
    pub category: String,
}

/// Introductory slide content for an edition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cover {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// A dated bundle of articles, one per JSON file.
///
/// `date` keys the file on disk and the sort order; `id` keys read tracking.
/// The two are not guaranteed to correspond.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyEdition {
    pub id: String,
    pub date: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<Cover>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub articles: Vec<Article>,
}

/// Where the display headline of an edition came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Headline<'a> {
    Cover(&'a str),
    Summary(&'a str),
    Default,
}

impl<'a> Headline<'a> {
    pub fn text(&self) -> &'a str {
        match self {
            Headline::Cover(text) | Headline::Summary(text) => *text,
            Headline::Default => DEFAULT_HEADLINE,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

impl DailyEdition {
    /// Resolve the headline: cover summary, then edition summary, then a fixed default.
    pub fn headline(&self) -> Headline<'_> {
        if let Some(text) = non_empty(self.cover.as_ref().map(|c| c.summary.as_str())) {
            return Headline::Cover(text);
        }
        if let Some(text) = non_empty(self.summary.as_deref()) {
            return Headline::Summary(text);
        }
        Headline::Default
    }

    /// Cover image first, otherwise the first article's image
    pub fn cover_image_url(&self) -> Option<&str> {
        non_empty(self.cover.as_ref().and_then(|c| c.image_url.as_deref()))
            .or_else(|| non_empty(self.articles.first().map(|a| a.image_url.as_str())))
    }

    pub fn share_title(&self) -> &str {
        non_empty(self.cover.as_ref().and_then(|c| c.title.as_deref()))
            .or_else(|| non_empty(Some(self.title.as_str())))
            .unwrap_or(DEFAULT_SHARE_TITLE)
    }

    pub fn author_name(&self) -> &str {
        non_empty(self.author.as_deref()).unwrap_or(DEFAULT_AUTHOR)
    }

    /// Publication instant parsed from `date`, if it is a valid date
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        parse_edition_date(&self.date)
    }

    pub fn prepend_article(&mut self, article: Article) {
        self.articles.insert(0, article);
    }
}

/// Add a newly curated article to the front of the newest edition.
///
/// Expects `editions` sorted newest first, as returned by the edition store.
pub fn prepend_to_latest(editions: &mut [DailyEdition], article: Article) -> Result<&DailyEdition> {
    let Some(latest) = editions.first_mut() else {
        anyhow::bail!("No edition available to receive the curated article");
    };
    latest.prepend_article(article);
    Ok(&*latest)
}

/// Parse an RFC 3339 timestamp, an offset-less ISO date-time (UTC), or a bare
/// `YYYY-MM-DD` (midnight UTC)
pub fn parse_edition_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Cut `text` to at most `max_chars` characters without splitting a character
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
