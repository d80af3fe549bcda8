//! Inputs produced by external collaborators.
//!
//! `RawOutline` is the nested outline suggested by the model service and
//! `SourceContent` is what content aggregation yields per note. Both are
//! plain data; the builder validates them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One entry of a model-suggested outline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOutlineNode {
    /// Concept title. `None` when the model produced no usable string.
    #[serde(default)]
    pub title: Option<String>,

    /// Category the model suggests (only meaningful at the top level).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Tag hints attached by the model.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Nested entries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RawOutlineNode>,
}

impl RawOutlineNode {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// An entry without a usable title.
    pub fn untitled() -> Self {
        Self::default()
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_child(mut self, child: RawOutlineNode) -> Self {
        self.children.push(child);
        self
    }

    /// The trimmed title, with inner whitespace collapsed, if non-empty.
    pub fn clean_title(&self) -> Option<String> {
        let title = self.title.as_deref()?;
        let cleaned = title.split_whitespace().collect::<Vec<_>>().join(" ");
        (!cleaned.is_empty()).then_some(cleaned)
    }

    /// Whether this entry or any descendant has a usable title.
    pub fn has_any_title(&self) -> bool {
        self.clean_title().is_some() || self.children.iter().any(RawOutlineNode::has_any_title)
    }

    /// Parse one entry leniently from JSON.
    ///
    /// A non-string title is treated as absent; `name` and `text` are
    /// accepted as title aliases; unknown fields are ignored.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(title) => Self::new(title.clone()),
            Value::Object(map) => {
                let title = ["title", "name", "text"]
                    .iter()
                    .find_map(|key| map.get(*key).and_then(Value::as_str))
                    .map(str::to_string);
                let category = map
                    .get("category")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let tags = map
                    .get("tags")
                    .and_then(Value::as_array)
                    .map(|tags| {
                        tags.iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                let children = map
                    .get("children")
                    .and_then(Value::as_array)
                    .map(|children| children.iter().map(Self::from_value).collect())
                    .unwrap_or_default();
                Self {
                    title,
                    category,
                    tags,
                    children,
                }
            }
            _ => Self::untitled(),
        }
    }
}

/// A complete model-suggested outline: the top-level entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawOutline {
    pub nodes: Vec<RawOutlineNode>,
}

impl RawOutline {
    pub fn new(nodes: Vec<RawOutlineNode>) -> Self {
        Self { nodes }
    }

    /// Whether the outline has at least one usable title anywhere.
    pub fn has_any_title(&self) -> bool {
        self.nodes.iter().any(RawOutlineNode::has_any_title)
    }

    /// Parse an outline leniently from JSON.
    ///
    /// Accepts a top-level array of entries, or an object carrying them under
    /// `children`, `nodes`, or `categories`.
    pub fn from_value(value: &Value) -> Self {
        let entries = match value {
            Value::Array(entries) => Some(entries),
            Value::Object(map) => ["children", "nodes", "categories"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_array)),
            _ => None,
        };
        Self {
            nodes: entries
                .map(|entries| entries.iter().map(RawOutlineNode::from_value).collect())
                .unwrap_or_default(),
        }
    }

    /// Parse an outline from JSON text.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::from_value(&value))
    }
}

/// Per-note data yielded by content aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceContent {
    /// Source identifier, usually a note path.
    pub id: String,

    /// Tags extracted from the note.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Length of the raw text. The text itself stays opaque to the core.
    #[serde(default)]
    pub text_len: usize,
}

impl SourceContent {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tags: Vec::new(),
            text_len: 0,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_text_len(mut self, text_len: usize) -> Self {
        self.text_len = text_len;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_is_lenient() {
        let value = json!([
            {"title": "Technological", "category": "Technological", "children": [
                {"title": "AI Research", "tags": ["ai", 3]},
                {"title": 42, "children": [{"name": "Nested"}]},
                "Plain string entry"
            ]},
            null
        ]);
        let outline = RawOutline::from_value(&value);

        assert_eq!(outline.nodes.len(), 2);
        let tech = &outline.nodes[0];
        assert_eq!(tech.category.as_deref(), Some("Technological"));
        assert_eq!(tech.children[0].tags, vec!["ai".to_string()]);
        assert_eq!(tech.children[1].title, None);
        assert_eq!(tech.children[1].children[0].title.as_deref(), Some("Nested"));
        assert_eq!(tech.children[2].title.as_deref(), Some("Plain string entry"));
        assert!(!outline.nodes[1].has_any_title());
    }

    #[test]
    fn test_from_json_object_wrapper() {
        let outline = RawOutline::from_json(r#"{"nodes": [{"title": "Economic"}]}"#).unwrap();
        assert_eq!(outline.nodes.len(), 1);
        assert!(outline.has_any_title());

        let empty = RawOutline::from_json(r#"{"something": 1}"#).unwrap();
        assert!(!empty.has_any_title());
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(
            RawOutlineNode::new("  AI \n Research ").clean_title().as_deref(),
            Some("AI Research")
        );
        assert_eq!(RawOutlineNode::new("   ").clean_title(), None);
    }
}
