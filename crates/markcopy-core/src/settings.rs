//! Conversion settings and the read-only settings store seam.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Paragraph line-break style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineBreaks {
    /// Blank line between paragraphs.
    #[default]
    #[serde(rename = "soft")]
    Soft,
    /// Each paragraph on its own line, no spacing.
    #[serde(rename = "one-per-paragraph")]
    OnePerParagraph,
}

/// User settings read by the agent on every conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionOptions {
    #[serde(default = "default_true")]
    pub notify: bool,
    #[serde(default = "default_true")]
    pub auto_readability: bool,
    #[serde(default)]
    pub line_breaks: LineBreaks,
}

fn default_true() -> bool {
    true
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            notify: true,
            auto_readability: true,
            line_breaks: LineBreaks::Soft,
        }
    }
}

/// Read-only access to the persisted settings.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Fetch the current options, with defaults filled in for missing keys.
    async fn conversion_options(&self) -> Result<ConversionOptions>;
}

/// Settings kept in a JSON file (`settings.json` in a config directory).
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(config_dir: &Path) -> Self {
        Self {
            path: config_dir.join("settings.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings, or return defaults when the file is missing or unreadable.
    pub fn load(&self) -> ConversionOptions {
        match std::fs::read_to_string(&self.path) {
            Ok(data) => serde_json::from_str(&data).unwrap_or_else(|e| {
                debug!("Ignoring malformed settings at {}: {}", self.path.display(), e);
                ConversionOptions::default()
            }),
            Err(_) => ConversionOptions::default(),
        }
    }

    /// Save settings to disk.
    pub fn save(&self, options: &ConversionOptions) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(options)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn conversion_options(&self) -> Result<ConversionOptions> {
        Ok(self.load())
    }
}

/// In-memory settings, used by tests and embedders that own their settings.
#[derive(Default)]
pub struct MemorySettingsStore {
    options: RwLock<ConversionOptions>,
}

impl MemorySettingsStore {
    pub fn new(options: ConversionOptions) -> Self {
        Self {
            options: RwLock::new(options),
        }
    }

    pub fn set(&self, options: ConversionOptions) {
        *self.options.write() = options;
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn conversion_options(&self) -> Result<ConversionOptions> {
        Ok(self.options.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_keys() {
        let partial: ConversionOptions = serde_json::from_str(r#"{"notify": false}"#).unwrap();
        assert!(!partial.notify);
        assert!(partial.auto_readability);
        assert_eq!(partial.line_breaks, LineBreaks::Soft);
    }

    #[test]
    fn test_line_breaks_wire_names() {
        let opts: ConversionOptions =
            serde_json::from_str(r#"{"lineBreaks": "one-per-paragraph"}"#).unwrap();
        assert_eq!(opts.line_breaks, LineBreaks::OnePerParagraph);

        let json = serde_json::to_value(ConversionOptions::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "notify": true, "autoReadability": true, "lineBreaks": "soft" })
        );
    }

    #[test]
    fn test_file_store_round_trip_and_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSettingsStore::new(dir.path());
        assert_eq!(store.load(), ConversionOptions::default());

        let custom = ConversionOptions {
            notify: false,
            auto_readability: false,
            line_breaks: LineBreaks::OnePerParagraph,
        };
        store.save(&custom).unwrap();
        assert_eq!(store.load(), custom);

        std::fs::write(store.path(), "{not json").unwrap();
        assert_eq!(store.load(), ConversionOptions::default());
    }

    #[tokio::test]
    async fn test_memory_store_reflects_updates() {
        let store = MemorySettingsStore::default();
        assert!(store.conversion_options().await.unwrap().notify);
        store.set(ConversionOptions {
            notify: false,
            ..Default::default()
        });
        assert!(!store.conversion_options().await.unwrap().notify);
    }
}
