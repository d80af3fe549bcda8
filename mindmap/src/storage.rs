//! Persistent storage for maps.
//!
//! Each map is stored as its outline text in `<id>.md`. The previous
//! version is kept as `<id>.md.bak`, and an optional `<id>.meta.json`
//! records what the outline cannot carry (creation time, source list).

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::MindmapConfig;
use crate::error::{MindmapError, Result};
use crate::node::Mindmap;
use crate::schema::CategorySchema;
use crate::serializer::{OutlineSerializer, ParseResult};

const OUTLINE_EXT: &str = "md";
const METADATA_SUFFIX: &str = ".meta.json";

/// Options for a single save.
#[derive(Debug, Clone, Copy, Default)]
pub struct SaveOptions {
    /// Also write the metadata record.
    pub metadata_backup: bool,
}

/// Side record written next to the outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MindmapMetadata {
    pub version: u32,
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub source_files: Vec<String>,
    pub category_schema: CategorySchema,
}

impl MindmapMetadata {
    const CURRENT_VERSION: u32 = 1;

    fn from_mindmap(mindmap: &Mindmap) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            id: mindmap.id.clone(),
            created_at: mindmap.created_at,
            source_files: mindmap.source_files.clone(),
            category_schema: mindmap.category_schema.clone(),
        }
    }
}

/// File-backed map store.
pub struct MindmapStore {
    base_path: PathBuf,
    serializer: OutlineSerializer,
}

impl MindmapStore {
    /// Create a store rooted at `base_path`. The directory is created on
    /// first save.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            serializer: OutlineSerializer::new(),
        }
    }

    /// Create a store in the configured storage directory.
    pub fn from_config(config: &MindmapConfig) -> Self {
        Self::new(&config.storage_dir)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn ensure_dir(&self) -> Result<()> {
        if !self.base_path.exists() {
            fs::create_dir_all(&self.base_path)?;
            info!("Created storage directory: {}", self.base_path.display());
        }
        Ok(())
    }

    fn outline_path(&self, id: &str) -> PathBuf {
        self.base_path.join(format!("{id}.{OUTLINE_EXT}"))
    }

    fn backup_path(&self, id: &str) -> PathBuf {
        self.base_path.join(format!("{id}.{OUTLINE_EXT}.bak"))
    }

    fn metadata_path(&self, id: &str) -> PathBuf {
        self.base_path.join(format!("{id}{METADATA_SUFFIX}"))
    }

    /// Save a map, rotating any previous outline to the backup file.
    pub fn save(&self, mindmap: &Mindmap, options: SaveOptions) -> Result<PathBuf> {
        validate_id(&mindmap.id)?;
        self.ensure_dir()?;

        let path = self.outline_path(&mindmap.id);
        if path.exists() {
            let backup = self.backup_path(&mindmap.id);
            fs::copy(&path, &backup)?;
            debug!("Created backup at {}", backup.display());
        }
        write_atomic(&path, &self.serializer.render(mindmap))?;

        if options.metadata_backup {
            let metadata = MindmapMetadata::from_mindmap(mindmap);
            write_atomic(
                &self.metadata_path(&mindmap.id),
                &serde_json::to_string_pretty(&metadata)?,
            )?;
        }

        info!(
            "Saved mindmap {} ({} nodes) to {}",
            mindmap.id,
            mindmap.node_count(),
            path.display()
        );
        Ok(path)
    }

    /// Load a stored map.
    ///
    /// The outline decides the tree. Metadata, when present, restores the
    /// creation time and source list, and its schema seeds the category
    /// order. Irregularities found in the outline are returned as warnings.
    pub fn load(&self, id: &str) -> Result<ParseResult> {
        validate_id(id)?;
        let path = self.outline_path(id);
        if !path.exists() {
            return Err(MindmapError::NotFound(id.to_string()));
        }

        let text = fs::read_to_string(&path)?;
        let ParseResult {
            mut mindmap,
            warnings,
        } = self.serializer.parse(&text)?;
        mindmap.id = id.to_string();

        if let Some(metadata) = self.load_metadata(id)? {
            if metadata.version != MindmapMetadata::CURRENT_VERSION {
                warn!(
                    "Metadata version mismatch for {id}: found {}, expected {}",
                    metadata.version,
                    MindmapMetadata::CURRENT_VERSION
                );
            }
            let mut schema = metadata.category_schema;
            for name in mindmap.category_schema.names() {
                schema.ensure(name);
            }
            mindmap.category_schema = schema;
            mindmap.created_at = metadata.created_at;
            mindmap.source_files = metadata.source_files;
        }

        info!(
            "Loaded mindmap {id} ({} nodes, {} warnings) from {}",
            mindmap.node_count(),
            warnings.len(),
            path.display()
        );
        Ok(ParseResult { mindmap, warnings })
    }

    /// Load the metadata record, if one was written.
    pub fn load_metadata(&self, id: &str) -> Result<Option<MindmapMetadata>> {
        validate_id(id)?;
        let path = self.metadata_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    pub fn exists(&self, id: &str) -> bool {
        validate_id(id).is_ok() && self.outline_path(id).exists()
    }

    /// Ids of all stored maps, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.base_path.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == OUTLINE_EXT) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Delete a stored map with its backup and metadata.
    pub fn delete(&self, id: &str) -> Result<()> {
        validate_id(id)?;
        let path = self.outline_path(id);
        if !path.exists() {
            return Err(MindmapError::NotFound(id.to_string()));
        }
        for file in [path, self.backup_path(id), self.metadata_path(id)] {
            if file.exists() {
                fs::remove_file(&file)?;
            }
        }
        info!("Deleted stored mindmap {id}");
        Ok(())
    }
}

/// Ids become file names, so they may not be empty, hidden, or contain
/// path separators.
fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() || id.starts_with('.') || id.contains(['/', '\\']) {
        return Err(MindmapError::NotFound(id.to_string()));
    }
    Ok(())
}

fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);
    fs::write(&temp, content)?;
    fs::rename(&temp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::MindmapNode;
    use crate::warning::Warning;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn sample() -> Mindmap {
        let mut map = Mindmap::new(CategorySchema::new(["Frontend", "Backend", "Ops"]));
        map.root.children.push(
            MindmapNode::category("Frontend")
                .with_source("ui.md")
                .with_child(MindmapNode::new("State Management").with_tag("state").with_source("ui.md")),
        );
        map.root.children.push(
            MindmapNode::category("Backend")
                .with_source("api.md")
                .with_child(MindmapNode::new("State Management").with_source("api.md")),
        );
        map.source_files = vec!["ui.md".to_string(), "api.md".to_string()];
        map.renumber();
        map.root.find_mut("0.0").unwrap().secondary_parents.insert("1.0".to_string());
        map
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = MindmapStore::new(temp_dir.path());
        let map = sample();

        let path = store.save(&map, SaveOptions::default()).unwrap();
        assert!(path.ends_with(format!("{}.md", map.id)));
        assert!(store.exists(&map.id));

        let loaded = store.load(&map.id).unwrap();
        assert!(loaded.warnings.is_empty(), "{:?}", loaded.warnings);
        let loaded = loaded.mindmap;
        assert_eq!(loaded.id, map.id);
        assert_eq!(loaded.root, map.root);
        assert_eq!(loaded.category_schema, map.category_schema);
    }

    #[test]
    fn test_metadata_restores_side_fields() {
        let temp_dir = TempDir::new().unwrap();
        let store = MindmapStore::new(temp_dir.path());
        let map = sample();

        store
            .save(&map, SaveOptions { metadata_backup: true })
            .unwrap();
        let metadata = store.load_metadata(&map.id).unwrap().unwrap();
        assert_eq!(metadata.version, 1);
        assert_eq!(metadata.source_files, map.source_files);

        let loaded = store.load(&map.id).unwrap().mindmap;
        assert_eq!(loaded.created_at, map.created_at);
        assert_eq!(loaded.source_files, map.source_files);
    }

    #[test]
    fn test_without_metadata_has_no_record() {
        let temp_dir = TempDir::new().unwrap();
        let store = MindmapStore::new(temp_dir.path());
        let map = sample();
        store.save(&map, SaveOptions::default()).unwrap();
        assert!(store.load_metadata(&map.id).unwrap().is_none());
    }

    #[test]
    fn test_save_creates_backup() {
        let temp_dir = TempDir::new().unwrap();
        let store = MindmapStore::new(temp_dir.path());
        let map = sample();

        store.save(&map, SaveOptions::default()).unwrap();
        assert!(!store.backup_path(&map.id).exists());
        store.save(&map, SaveOptions::default()).unwrap();
        assert!(store.backup_path(&map.id).exists());
    }

    #[test]
    fn test_list_and_delete() {
        let temp_dir = TempDir::new().unwrap();
        let store = MindmapStore::new(temp_dir.path().join("maps"));
        assert!(store.list().unwrap().is_empty());

        let mut first = sample();
        first.id = "b-map".to_string();
        let mut second = sample();
        second.id = "a-map".to_string();
        store.save(&first, SaveOptions { metadata_backup: true }).unwrap();
        store.save(&first, SaveOptions::default()).unwrap();
        store.save(&second, SaveOptions::default()).unwrap();

        assert_eq!(store.list().unwrap(), vec!["a-map".to_string(), "b-map".to_string()]);

        store.delete("b-map").unwrap();
        assert!(!store.exists("b-map"));
        assert!(store.load_metadata("b-map").unwrap().is_none());
        assert_eq!(store.list().unwrap(), vec!["a-map".to_string()]);
    }

    #[test]
    fn test_load_returns_outline_warnings() {
        let temp_dir = TempDir::new().unwrap();
        let store = MindmapStore::new(temp_dir.path());
        fs::write(
            temp_dir.path().join("edited.md"),
            "# Ops {sources: ops.md}\n  - Deploy [ALSO: Nowhere]\n",
        )
        .unwrap();

        let loaded = store.load("edited").unwrap();
        assert_eq!(loaded.mindmap.id, "edited");
        assert_eq!(loaded.warnings.len(), 2);
        assert!(loaded
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::MissingSources { title, .. } if title == "Deploy")));
        assert!(loaded
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::DroppedAnnotation { target, .. } if target == "Nowhere")));
    }

    #[test]
    fn test_missing_and_invalid_ids() {
        let temp_dir = TempDir::new().unwrap();
        let store = MindmapStore::new(temp_dir.path());

        assert!(matches!(store.load("nope"), Err(MindmapError::NotFound(_))));
        assert!(matches!(store.delete("nope"), Err(MindmapError::NotFound(_))));
        assert!(matches!(store.load("../escape"), Err(MindmapError::NotFound(_))));
        assert!(!store.exists(""));
    }
}
