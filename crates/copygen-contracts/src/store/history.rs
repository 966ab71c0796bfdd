use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::brief::{Brief, BriefSnapshot};
use crate::items::{now_millis, CopyItem};

use super::kv::KvStore;

pub const HISTORY_KEY: &str = "copy_generator_history_v1";
pub const MAX_HISTORY: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub created_at: i64,
    pub prompt: BriefSnapshot,
    pub results: Vec<CopyItem>,
}

impl HistoryEntry {
    pub fn new(brief: &Brief, results: Vec<CopyItem>) -> Self {
        let now = now_millis();
        Self {
            id: format!("his_{now}"),
            created_at: now,
            prompt: brief.snapshot(),
            results,
        }
    }
}

/// Newest-first list of past generations, capped at [`MAX_HISTORY`].
#[derive(Debug, Clone)]
pub struct HistoryStore {
    kv: KvStore,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            kv: KvStore::new(path),
        }
    }

    /// Entries that fail to parse are skipped rather than failing the load.
    pub fn load(&mut self) -> Vec<HistoryEntry> {
        let Some(Value::Array(rows)) = self.kv.get(HISTORY_KEY) else {
            return Vec::new();
        };
        rows.into_iter()
            .filter_map(|row| serde_json::from_value::<HistoryEntry>(row).ok())
            .collect()
    }

    /// Prepends `entry`; an id already present is moved to the next free millisecond.
    pub fn push(&mut self, mut entry: HistoryEntry) -> anyhow::Result<Vec<HistoryEntry>> {
        let mut entries = self.load();
        while entries.iter().any(|row| row.id == entry.id) {
            entry.created_at += 1;
            entry.id = format!("his_{}", entry.created_at);
        }
        entries.insert(0, entry);
        entries.truncate(MAX_HISTORY);
        self.kv.set(HISTORY_KEY, serde_json::to_value(&entries)?)?;
        Ok(entries)
    }

    pub fn find(&mut self, id: &str) -> Option<HistoryEntry> {
        self.load().into_iter().find(|entry| entry.id == id)
    }

    pub fn clear(&mut self) -> anyhow::Result<()> {
        self.kv.remove(HISTORY_KEY)
    }
}
