use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::DailyEdition;
use crate::store::INDEX_FILE;

/// Export from the edition generation service
#[derive(Debug, Deserialize)]
pub struct Payload {
    pub data: Option<PayloadData>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PayloadData {
    Many(Vec<Value>),
    One(Map<String, Value>),
}

/// One generation job; items that are not objects read as having no output
#[derive(Debug, Default, Deserialize)]
pub struct PayloadItem {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub status: Value,
    #[serde(default)]
    pub output: Option<Value>,
}

impl PayloadItem {
    fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }

    /// Items without a status are assumed finished
    fn is_pending(&self) -> bool {
        match &self.status {
            Value::Null | Value::Bool(false) => false,
            Value::String(s) if s.is_empty() => false,
            Value::Number(n) if n.as_f64() == Some(0.0) => false,
            Value::String(s) => s != "completed",
            _ => true,
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub written: Vec<PathBuf>,
    pub skipped: usize,
    pub errors: usize,
    pub index: Vec<String>,
}

/// Write each completed edition in `payload` to `{date}.json`, then rebuild the index
pub fn process_payload(dir: &Path, payload: Payload) -> Result<PublishReport> {
    let items: Vec<PayloadItem> = match payload.data {
        Some(PayloadData::Many(items)) => items.into_iter().map(PayloadItem::from_value).collect(),
        Some(PayloadData::One(item)) => vec![PayloadItem::from_value(Value::Object(item))],
        None => anyhow::bail!("Invalid payload: \"data\" is missing or invalid type"),
    };

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create data directory: {}", dir.display()))?;

    let mut report = PublishReport::default();
    for item in items {
        if item.is_pending() {
            report.skipped += 1;
            continue;
        }
        let Some(output) = item.output.filter(|o| !o.is_null()) else {
            tracing::warn!(item_id = %item.id, "Skipping item: missing output");
            report.skipped += 1;
            continue;
        };

        let date = output.get("date").and_then(Value::as_str).filter(|d| !d.is_empty());
        let has_articles = output.get("articles").is_some_and(Value::is_array);
        let Some(date) = date.filter(|_| has_articles) else {
            tracing::warn!(item_id = %item.id, "Skipping invalid edition item");
            report.errors += 1;
            continue;
        };

        let path = dir.join(format!("{}.json", date));
        let json = serde_json::to_string_pretty(&output).context("Failed to serialize edition")?;
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        report.written.push(path);
    }

    if !report.written.is_empty() {
        report.index = update_index(dir)?;
    }
    Ok(report)
}

/// Rebuild `index.json` from the `YYYY-MM-DD.json` files in `dir`, newest first
pub fn update_index(dir: &Path) -> Result<Vec<String>> {
    let mut dates: Vec<NaiveDate> = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if let Some(date) = parse_date_key(stem) {
            dates.push(date);
        }
    }

    dates.sort_by(|a, b| b.cmp(a));
    dates.dedup();
    let keys: Vec<String> = dates.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect();

    if !keys.is_empty() {
        let json = serde_json::to_string_pretty(&keys).context("Failed to serialize index")?;
        let path = dir.join(INDEX_FILE);
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(keys)
}

/// Strict `YYYY-MM-DD` date key
fn parse_date_key(stem: &str) -> Option<NaiveDate> {
    if stem.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()
}

/// Save an edition to `{date}.json` in `dir`
pub fn save_edition(dir: &Path, edition: &DailyEdition) -> Result<PathBuf> {
    let path = dir.join(format!("{}.json", edition.date));
    let json = serde_json::to_string_pretty(edition).context("Failed to serialize edition")?;
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::edition;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        serde_json::from_value(value).unwrap()
    }

    // ==================== Payload Tests ====================

    #[test]
    fn test_process_payload_writes_completed_editions() {
        let dir = tempfile::tempdir().unwrap();
        let report = process_payload(
            dir.path(),
            payload(json!({ "data": [
                { "id": 1, "status": "completed", "output": { "id": "ed-1", "date": "2025-01-01", "title": "A", "articles": [] } },
                { "id": 2, "status": "running", "output": { "date": "2025-01-02", "articles": [] } },
                { "id": 3, "status": "completed" },
                { "id": 4, "output": { "title": "no date", "articles": [] } },
                { "id": 5, "output": { "id": "ed-3", "date": "2025-01-03", "title": "C", "articles": [] } }
            ]})),
        )
        .unwrap();

        assert_eq!(report.written.len(), 2);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.errors, 1);
        assert_eq!(report.index, vec!["2025-01-03", "2025-01-01"]);
        assert!(dir.path().join("2025-01-01.json").exists());
        assert!(!dir.path().join("2025-01-02.json").exists());
    }

    #[test]
    fn test_process_payload_accepts_single_object() {
        let dir = tempfile::tempdir().unwrap();
        let report = process_payload(
            dir.path(),
            payload(json!({ "data": { "id": "x", "output": { "date": "2025-02-01", "articles": [] } } })),
        )
        .unwrap();
        assert_eq!(report.index, vec!["2025-02-01"]);
    }

    #[test]
    fn test_process_payload_skips_odd_items_individually() {
        let dir = tempfile::tempdir().unwrap();
        let report = process_payload(
            dir.path(),
            payload(json!({ "data": [
                42,
                "not an item",
                { "id": 1, "status": 7, "output": { "date": "2025-01-07", "articles": [] } },
                { "id": 2, "status": null, "output": { "date": "2025-01-08", "articles": [] } },
                { "id": 3, "status": "completed", "output": null }
            ]})),
        )
        .unwrap();

        assert_eq!(report.index, vec!["2025-01-08"]);
        assert_eq!(report.skipped, 4);
        assert_eq!(report.errors, 0);
    }

    #[test]
    fn test_process_payload_without_data_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(process_payload(dir.path(), payload(json!({ "other": 1 }))).is_err());
    }

    // ==================== Index Tests ====================

    #[test]
    fn test_update_index_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["2025-01-01.json", "2025-03-01.json", "2024-12-31.json", "notes.json", "2025-1-5.json", "2025-02-01.txt"] {
            fs::write(dir.path().join(name), "{}").unwrap();
        }

        let keys = update_index(dir.path()).unwrap();
        assert_eq!(keys, vec!["2025-03-01", "2025-01-01", "2024-12-31"]);

        let written: Vec<String> =
            serde_json::from_str(&fs::read_to_string(dir.path().join(INDEX_FILE)).unwrap()).unwrap();
        assert_eq!(written, keys);
    }

    #[test]
    fn test_update_index_empty_dir_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(update_index(dir.path()).unwrap().is_empty());
        assert!(!dir.path().join(INDEX_FILE).exists());
    }

    #[test]
    fn test_save_edition_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let ed = edition("ed-1", "2025-01-01");
        let path = save_edition(dir.path(), &ed).unwrap();

        let loaded: DailyEdition = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(loaded, ed);
    }
}
