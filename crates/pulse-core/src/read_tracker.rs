use std::collections::HashSet;

use crate::storage::KeyValueStore;

pub const READ_EDITIONS_KEY: &str = "pulseReadEditions";

/// Persistent set of edition ids the user has viewed past the cover.
///
/// Keys are `DailyEdition::id`, never the edition date. The set only grows,
/// except through [`ReadTracker::clear`].
pub struct ReadTracker<S: KeyValueStore> {
    storage: S,
}

impl<S: KeyValueStore> ReadTracker<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Stored ids in insertion order; missing or malformed data reads as empty
    fn load(&self) -> Vec<String> {
        let stored = match self.storage.get(READ_EDITIONS_KEY) {
            Ok(Some(stored)) => stored,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::error!(error = %e, "Error reading read editions from storage");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<String>>(&stored) {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(error = %e, "Malformed read editions in storage, ignoring");
                Vec::new()
            }
        }
    }

    pub fn read_set(&self) -> HashSet<String> {
        self.load().into_iter().collect()
    }

    /// Adds `edition_id`; skips the write when it is already present
    pub fn mark_as_read(&self, edition_id: &str) {
        let mut ids = self.load();
        if ids.iter().any(|id| id == edition_id) {
            tracing::debug!(edition_id, "Edition already read, skipping write");
            return;
        }
        ids.push(edition_id.to_string());

        let result = serde_json::to_string(&ids)
            .map_err(anyhow::Error::from)
            .and_then(|json| self.storage.set(READ_EDITIONS_KEY, &json));
        if let Err(e) = result {
            tracing::error!(edition_id, error = %e, "Error marking edition as read");
        }
    }

    pub fn is_read(&self, edition_id: &str) -> bool {
        self.load().iter().any(|id| id == edition_id)
    }

    /// Count of `edition_ids` not in the read set; unknown ids count as unread
    pub fn unread_count<I, T>(&self, edition_ids: I) -> usize
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let read = self.read_set();
        edition_ids
            .into_iter()
            .filter(|id| !read.contains(id.as_ref()))
            .count()
    }

    pub fn clear(&self) {
        if let Err(e) = self.storage.remove(READ_EDITIONS_KEY) {
            tracing::error!(error = %e, "Error clearing read history");
        }
    }
}
