//! Configuration for building, linking, combining, and storing maps.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::schema::CategorySchema;
use crate::tags::TagWeighting;

/// Default top-level categories (the STEEPLE taxonomy).
pub const DEFAULT_CATEGORIES: [&str; 7] = [
    "Social",
    "Technological",
    "Economic",
    "Environmental",
    "Political",
    "Legal",
    "Ethical",
];

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MindmapConfig {
    /// Ordered top-level categories new maps start from.
    pub category_schema: Vec<String>,

    /// How tag suggestions weigh against the outline's category hints.
    pub weighting: TagWeighting,

    /// Whether cross-branch secondary links are discovered.
    pub multi_parent: bool,

    /// Cross-link discovery settings.
    pub linker: LinkerConfig,

    /// Combine settings.
    pub combine: CombineConfig,

    /// Directory holding stored maps.
    pub storage_dir: PathBuf,

    /// Whether saves also write the metadata record.
    pub metadata_backup: bool,

    /// Upper bound on the outline provider call, in seconds.
    pub outline_timeout_secs: u64,
}

impl MindmapConfig {
    /// Create a configuration storing maps under `storage_dir`.
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            category_schema: DEFAULT_CATEGORIES.map(String::from).to_vec(),
            weighting: TagWeighting::default(),
            multi_parent: true,
            linker: LinkerConfig::default(),
            combine: CombineConfig::default(),
            storage_dir: storage_dir.into(),
            metadata_backup: false,
            outline_timeout_secs: 60,
        }
    }

    /// Parse a configuration from TOML text. Missing keys take defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// The configured schema.
    pub fn schema(&self) -> CategorySchema {
        CategorySchema::new(self.category_schema.iter().cloned())
    }

    /// Provider call timeout.
    pub fn outline_timeout(&self) -> Duration {
        Duration::from_secs(self.outline_timeout_secs)
    }

    /// Replace the category schema.
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.category_schema = categories.into_iter().map(Into::into).collect();
        self
    }

    /// Set the tag weighting mode.
    pub fn with_weighting(mut self, weighting: TagWeighting) -> Self {
        self.weighting = weighting;
        self
    }

    /// Enable or disable multi-parent linking.
    pub fn with_multi_parent(mut self, enabled: bool) -> Self {
        self.multi_parent = enabled;
        self
    }

    /// Enable or disable the metadata record on save.
    pub fn with_metadata_backup(mut self, enabled: bool) -> Self {
        self.metadata_backup = enabled;
        self
    }
}

impl Default for MindmapConfig {
    fn default() -> Self {
        Self::new(dirs::data_dir().unwrap_or_default().join("notemap/mindmaps"))
    }
}

/// Configuration for cross-link discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkerConfig {
    /// Minimum title overlap (shared words over the larger word count)
    /// for two nodes to be linked.
    pub title_overlap_threshold: f32,

    /// Whether a shared tag alone links two nodes.
    pub link_shared_tags: bool,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            title_overlap_threshold: 0.75,
            link_shared_tags: true,
        }
    }
}

/// Fallback category used when none is configured.
pub const DEFAULT_FALLBACK_CATEGORY: &str = "Uncategorized";

/// Configuration for combining maps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CombineConfig {
    /// Minimum tag-set Jaccard similarity for two nodes to count as duplicates.
    pub dedup_tag_overlap: f32,

    /// Name of the fallback category for unknown categories.
    pub fallback_category: String,
}

impl Default for CombineConfig {
    fn default() -> Self {
        Self {
            dedup_tag_overlap: 0.8,
            fallback_category: DEFAULT_FALLBACK_CATEGORY.to_string(),
        }
    }
}

impl CombineConfig {
    /// The fallback category name, never blank.
    pub fn fallback_name(&self) -> &str {
        match self.fallback_category.trim() {
            "" => DEFAULT_FALLBACK_CATEGORY,
            name => name,
        }
    }
}
