use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

/// A JSON object file used as a small key-value store.
///
/// Every read refreshes from disk; writes merge only the keys touched by
/// this handle, so two handles on the same file do not clobber each other.
#[derive(Debug, Clone)]
pub struct KvStore {
    path: PathBuf,
    payload: Map<String, Value>,
    dirty_keys: Vec<String>,
    removed_keys: Vec<String>,
}

impl KvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            payload: Map::new(),
            dirty_keys: Vec::new(),
            removed_keys: Vec::new(),
        }
    }

    pub fn get(&mut self, key: &str) -> Option<Value> {
        self.refresh();
        self.payload.get(key).cloned()
    }

    pub fn set(&mut self, key: &str, value: Value) -> anyhow::Result<()> {
        self.refresh();
        if self.payload.get(key) == Some(&value) {
            return Ok(());
        }
        self.payload.insert(key.to_string(), value);
        self.removed_keys.retain(|existing| existing != key);
        if !self.dirty_keys.iter().any(|existing| existing == key) {
            self.dirty_keys.push(key.to_string());
        }
        self.flush()
    }

    pub fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        self.refresh();
        if self.payload.remove(key).is_none() {
            return Ok(());
        }
        self.dirty_keys.retain(|existing| existing != key);
        if !self.removed_keys.iter().any(|existing| existing == key) {
            self.removed_keys.push(key.to_string());
        }
        self.flush()
    }

    pub fn flush(&mut self) -> anyhow::Result<()> {
        if self.dirty_keys.is_empty() && self.removed_keys.is_empty() {
            return Ok(());
        }

        let mut on_disk = read_json_object(&self.path).unwrap_or_default();
        for key in &self.dirty_keys {
            if let Some(value) = self.payload.get(key) {
                on_disk.insert(key.clone(), value.clone());
            }
        }
        for key in &self.removed_keys {
            on_disk.remove(key);
        }
        write_json_object(&self.path, &on_disk)?;
        self.payload = on_disk;
        self.dirty_keys.clear();
        self.removed_keys.clear();
        Ok(())
    }

    fn refresh(&mut self) {
        self.payload = read_json_object(&self.path).unwrap_or_default();
    }
}

fn read_json_object(path: &Path) -> Option<Map<String, Value>> {
    let raw = std::fs::read_to_string(path).ok()?;
    let parsed: Value = serde_json::from_str(&raw).ok()?;
    parsed.as_object().cloned()
}

fn write_json_object(path: &Path, payload: &Map<String, Value>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(
        path,
        serde_json::to_string_pretty(&Value::Object(payload.clone()))?,
    )?;
    Ok(())
}
