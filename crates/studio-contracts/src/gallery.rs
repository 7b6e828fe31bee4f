use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Image,
    Video,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub url: String,
    pub prompt: String,
    /// Unix epoch milliseconds.
    pub timestamp: i64,
}

impl GeneratedItem {
    pub fn new(kind: ItemKind, url: impl Into<String>, prompt: impl Into<String>) -> Self {
        let url = url.into();
        let prompt = prompt.into();
        let timestamp = Utc::now().timestamp_millis();
        Self {
            id: item_id(timestamp, &prompt, &url),
            kind,
            url,
            prompt,
            timestamp,
        }
    }
}

/// Most-recent-first list of generated items, optionally backed by a JSON file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Gallery {
    path: Option<PathBuf>,
    items: Vec<GeneratedItem>,
}

impl Gallery {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            items: Vec::new(),
        }
    }

    /// Loads `path` if it exists; unreadable rows are skipped.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut gallery = Self::new(path.clone());
        let Some(payload) = read_json(&path) else {
            return gallery;
        };
        if let Some(rows) = payload.get("items").and_then(Value::as_array) {
            for row in rows {
                if let Ok(item) = serde_json::from_value::<GeneratedItem>(row.clone()) {
                    gallery.items.push(item);
                }
            }
        }
        gallery
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn prepend(&mut self, item: GeneratedItem) {
        self.items.insert(0, item);
    }

    pub fn items(&self) -> &[GeneratedItem] {
        &self.items
    }

    pub fn latest(&self) -> Option<&GeneratedItem> {
        self.items.first()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut payload = Map::new();
        payload.insert("schema_version".to_string(), Value::Number(1.into()));
        payload.insert("items".to_string(), serde_json::to_value(&self.items)?);
        std::fs::write(path, serde_json::to_string_pretty(&Value::Object(payload))?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}

fn item_id(timestamp: i64, prompt: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(timestamp.to_be_bytes());
    hasher.update(prompt.as_bytes());
    hasher.update(url.as_bytes());
    let digest = hasher.finalize();
    format!("{timestamp}-{}", hex::encode(&digest[..4]))
}

fn read_json(path: &Path) -> Option<Value> {
    let raw = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{Gallery, GeneratedItem, ItemKind};

    #[test]
    fn prepend_keeps_most_recent_first() {
        let mut gallery = Gallery::in_memory();
        gallery.prepend(GeneratedItem::new(ItemKind::Image, "https://a", "first"));
        gallery.prepend(GeneratedItem::new(ItemKind::Video, "https://b", "second"));

        assert_eq!(gallery.len(), 2);
        assert_eq!(gallery.latest().map(|item| item.prompt.as_str()), Some("second"));
        assert_eq!(gallery.items()[1].kind, ItemKind::Image);
    }

    #[test]
    fn item_ids_differ_for_different_results() {
        let a = GeneratedItem::new(ItemKind::Image, "https://a", "same");
        let b = GeneratedItem::new(ItemKind::Image, "https://b", "same");
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with(&a.timestamp.to_string()));
    }

    #[test]
    fn save_and_load_preserve_order() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("gallery.json");
        let mut gallery = Gallery::new(&path);
        gallery.prepend(GeneratedItem::new(ItemKind::Image, "https://a", "older"));
        gallery.prepend(GeneratedItem::new(ItemKind::Video, "https://b", "newer"));
        gallery.save()?;

        let reloaded = Gallery::load(&path);
        assert_eq!(reloaded.items(), gallery.items());

        let parsed: Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        assert_eq!(parsed["items"][0]["type"], json!("video"));
        assert_eq!(parsed["items"][1]["prompt"], json!("older"));
        Ok(())
    }

    #[test]
    fn load_missing_file_is_empty() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let gallery = Gallery::load(temp.path().join("missing.json"));
        assert!(gallery.is_empty());
        assert!(gallery.path().is_some());
        Ok(())
    }

    #[test]
    fn in_memory_save_is_noop() -> anyhow::Result<()> {
        let mut gallery = Gallery::in_memory();
        gallery.prepend(GeneratedItem::new(ItemKind::Image, "https://a", "x"));
        gallery.save()?;
        assert!(gallery.path().is_none());
        Ok(())
    }
}
