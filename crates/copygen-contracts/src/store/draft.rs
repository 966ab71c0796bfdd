use std::path::PathBuf;

use serde_json::Value;

use crate::brief::Brief;

use super::kv::KvStore;

pub const DRAFT_KEY: &str = "copy_generator_draft_v1";

/// The in-progress brief, restored on session start.
#[derive(Debug, Clone)]
pub struct DraftStore {
    kv: KvStore,
}

impl DraftStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            kv: KvStore::new(path),
        }
    }

    /// Merges the stored draft onto [`Brief::default`] field by field.
    ///
    /// A field whose stored value does not fit (wrong type, unknown label)
    /// keeps its default instead of discarding the whole draft.
    pub fn load(&mut self) -> Brief {
        let defaults = Brief::default();
        let Some(Value::Object(stored)) = self.kv.get(DRAFT_KEY) else {
            return defaults;
        };
        let Ok(Value::Object(mut merged)) = serde_json::to_value(&defaults) else {
            return defaults;
        };

        for (key, value) in stored {
            if !merged.contains_key(&key) {
                continue;
            }
            let mut candidate = merged.clone();
            candidate.insert(key, value);
            if serde_json::from_value::<Brief>(Value::Object(candidate.clone())).is_ok() {
                merged = candidate;
            }
        }

        serde_json::from_value::<Brief>(Value::Object(merged))
            .map(Brief::normalized)
            .unwrap_or(defaults)
    }

    pub fn save(&mut self, brief: &Brief) -> anyhow::Result<()> {
        self.kv.set(DRAFT_KEY, serde_json::to_value(brief)?)
    }

    pub fn reset(&mut self) -> anyhow::Result<()> {
        self.kv.remove(DRAFT_KEY)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::brief::{Length, Platform, Tone};

    use super::*;

    #[test]
    fn missing_draft_loads_defaults() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut store = DraftStore::new(temp.path().join("storage.json"));
        assert_eq!(store.load(), Brief::default());
        Ok(())
    }

    #[test]
    fn save_then_load_round_trips() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut store = DraftStore::new(temp.path().join("storage.json"));
        let brief = Brief {
            topic: "周末咖啡".to_string(),
            platform: Platform::Xiaohongshu,
            tone: Tone::Healing,
            length: Length::Short,
            result_count: 5,
            diversity: 80,
            image_count: 2,
            ..Brief::default()
        };
        store.save(&brief)?;
        assert_eq!(store.load(), brief);
        Ok(())
    }

    #[test]
    fn invalid_fields_fall_back_individually() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("storage.json");
        std::fs::write(
            &path,
            serde_json::to_string(&json!({
                (DRAFT_KEY): {
                    "topic": "夜跑",
                    "platform": "抖音",
                    "tone": "幽默",
                    "withEmoji": "yes",
                    "resultCount": 7,
                    "unknown": true,
                }
            }))?,
        )?;
        let mut store = DraftStore::new(path);
        let brief = store.load();
        assert_eq!(brief.topic, "夜跑");
        assert_eq!(brief.platform, Platform::Moments);
        assert_eq!(brief.tone, Tone::Humorous);
        assert!(brief.with_emoji);
        assert_eq!(brief.result_count, 3);
        Ok(())
    }

    #[test]
    fn reset_removes_draft() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut store = DraftStore::new(temp.path().join("storage.json"));
        store.save(&Brief {
            topic: "海边".to_string(),
            ..Brief::default()
        })?;
        store.reset()?;
        assert_eq!(store.load(), Brief::default());
        Ok(())
    }
}
