//! Core types for the knowledge map tree.
//!
//! A map is one owning tree of `MindmapNode`s plus, on each node, a set of
//! weak secondary-parent ids that cross-link nodes in other branches.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::CategorySchema;

/// Id of the root node in every canonical tree.
pub const ROOT_ID: &str = "root";

/// Source reference recorded on nodes no source could be attributed to.
pub const UNATTRIBUTED: &str = "unattributed";

/// A node in the knowledge map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MindmapNode {
    /// Positional id, stable within one tree.
    pub id: String,

    /// Concept title. Empty on the root.
    pub title: String,

    /// Top-level category; only set on depth-1 nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Depth in the tree (0 = root).
    pub depth: u32,

    /// Tags attached to this concept.
    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// Sources that contributed this node, in first-seen order.
    #[serde(default)]
    pub source_refs: Vec<String>,

    /// Owned children, in rendering order.
    #[serde(default)]
    pub children: Vec<MindmapNode>,

    /// Ids of non-owning parents in other branches.
    #[serde(default)]
    pub secondary_parents: BTreeSet<String>,
}

impl MindmapNode {
    /// Create a detached node with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            title: title.into(),
            category: None,
            depth: 0,
            tags: BTreeSet::new(),
            source_refs: Vec::new(),
            children: Vec::new(),
            secondary_parents: BTreeSet::new(),
        }
    }

    /// Create an untitled root node.
    pub fn root() -> Self {
        let mut node = Self::new("");
        node.id = ROOT_ID.to_string();
        node
    }

    /// Create a depth-1 category node.
    pub fn category(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut node = Self::new(name.clone());
        node.category = Some(name);
        node.depth = 1;
        node
    }

    /// Add a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.add_tag(tag);
        self
    }

    /// Add a source reference.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.add_source(source);
        self
    }

    /// Append a child.
    pub fn with_child(mut self, child: MindmapNode) -> Self {
        self.children.push(child);
        self
    }

    /// Add a tag unless an equal tag (ignoring case) is already present.
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        let tag = tag.trim();
        if tag.is_empty() || self.has_tag(tag) {
            return;
        }
        self.tags.insert(tag.to_string());
    }

    /// Check for a tag, ignoring case.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Add a source reference, keeping first-seen order.
    ///
    /// A real source replaces the `unattributed` sentinel.
    pub fn add_source(&mut self, source: impl Into<String>) {
        let source = source.into();
        if self.source_refs.contains(&source) {
            return;
        }
        if source != UNATTRIBUTED {
            self.source_refs.retain(|s| s != UNATTRIBUTED);
        } else if !self.source_refs.is_empty() {
            return;
        }
        self.source_refs.push(source);
    }

    /// Whether no real source contributed this node.
    pub fn is_unattributed(&self) -> bool {
        self.source_refs.iter().all(|s| s == UNATTRIBUTED)
    }

    /// Check if this node is a leaf node (no children).
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// All nodes of this subtree in depth-first pre-order, including self.
    pub fn walk(&self) -> Vec<&MindmapNode> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Find a node in this subtree by id.
    pub fn find(&self, id: &str) -> Option<&MindmapNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    /// Find a mutable node in this subtree by id.
    pub fn find_mut(&mut self, id: &str) -> Option<&mut MindmapNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }

    /// Number of nodes in this subtree, including self.
    pub fn subtree_size(&self) -> usize {
        1 + self.children.iter().map(MindmapNode::subtree_size).sum::<usize>()
    }
}

/// A complete knowledge map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mindmap {
    /// Storage identifier.
    pub id: String,

    /// Untitled root owning the category nodes.
    pub root: MindmapNode,

    /// Allowed top-level categories.
    pub category_schema: CategorySchema,

    /// When this map was created.
    pub created_at: DateTime<Utc>,

    /// Sources this map was built from.
    #[serde(default)]
    pub source_files: Vec<String>,
}

impl Mindmap {
    /// Create an empty map with the given schema.
    pub fn new(category_schema: CategorySchema) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            root: MindmapNode::root(),
            category_schema,
            created_at: Utc::now(),
            source_files: Vec::new(),
        }
    }

    /// Depth-1 nodes.
    pub fn categories(&self) -> &[MindmapNode] {
        &self.root.children
    }

    /// First depth-1 node with the given category, matched case-insensitively.
    pub fn category_node(&self, category: &str) -> Option<&MindmapNode> {
        self.root.children.iter().find(|n| {
            n.category
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case(category))
        })
    }

    /// Get a node by id.
    pub fn node(&self, id: &str) -> Option<&MindmapNode> {
        self.root.find(id)
    }

    /// All non-root nodes in depth-first pre-order.
    pub fn nodes(&self) -> Vec<&MindmapNode> {
        let mut nodes = self.root.walk();
        nodes.remove(0);
        nodes
    }

    /// Total number of nodes, including the root.
    pub fn node_count(&self) -> usize {
        self.root.subtree_size()
    }

    /// Maximum depth in the tree.
    pub fn max_depth(&self) -> u32 {
        self.root.walk().iter().map(|n| n.depth).max().unwrap_or(0)
    }

    /// Map from node id to the id of its owning parent.
    pub fn parent_index(&self) -> HashMap<String, String> {
        let mut index = HashMap::new();
        for node in self.root.walk() {
            for child in &node.children {
                index.insert(child.id.clone(), node.id.clone());
            }
        }
        index
    }

    /// All secondary links as `(node id, secondary parent id)` pairs, pre-order.
    pub fn secondary_links(&self) -> Vec<(String, String)> {
        self.root
            .walk()
            .into_iter()
            .flat_map(|n| {
                n.secondary_parents
                    .iter()
                    .map(move |target| (n.id.clone(), target.clone()))
            })
            .collect()
    }

    /// Reassign canonical positional ids and depths.
    ///
    /// The root becomes `root`, its i-th child `i`, and the j-th child of `p`
    /// becomes `p.j`. Secondary parents are rewritten through the old-to-new
    /// id map; references to unknown ids are dropped. Categories are cleared
    /// on every node that is not at depth 1.
    pub fn renumber(&mut self) {
        let mut mapping = HashMap::new();
        if !self.root.id.is_empty() {
            mapping.insert(self.root.id.clone(), ROOT_ID.to_string());
        }
        self.root.id = ROOT_ID.to_string();
        self.root.depth = 0;
        self.root.category = None;
        assign_ids(&mut self.root, &mut mapping);
        remap_secondary(&mut self.root, &mapping);
    }
}

fn assign_ids(node: &mut MindmapNode, mapping: &mut HashMap<String, String>) {
    for (i, child) in node.children.iter_mut().enumerate() {
        let id = if node.depth == 0 {
            i.to_string()
        } else {
            format!("{}.{i}", node.id)
        };
        let old = std::mem::replace(&mut child.id, id);
        if !old.is_empty() {
            mapping.insert(old, child.id.clone());
        }
        child.depth = node.depth + 1;
        if child.depth != 1 {
            child.category = None;
        }
        assign_ids(child, mapping);
    }
}

fn remap_secondary(node: &mut MindmapNode, mapping: &HashMap<String, String>) {
    let own = node.id.clone();
    node.secondary_parents = node
        .secondary_parents
        .iter()
        .filter_map(|id| mapping.get(id).cloned())
        .filter(|id| *id != own)
        .collect();
    for child in &mut node.children {
        remap_secondary(child, mapping);
    }
}

/// Ancestor lookups over a parent index.
pub(crate) struct Ancestry {
    parents: HashMap<String, String>,
}

impl Ancestry {
    pub(crate) fn new(mindmap: &Mindmap) -> Self {
        Self {
            parents: mindmap.parent_index(),
        }
    }

    /// Whether `ancestor` lies on the owning parent chain of `node`.
    pub(crate) fn is_ancestor(&self, ancestor: &str, node: &str) -> bool {
        let mut current = self.parents.get(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parents.get(id);
        }
        false
    }

    /// Whether a secondary link from `node` to `target` would violate the
    /// exclusion rule: self, ancestor, or descendant.
    pub(crate) fn excludes(&self, node: &str, target: &str) -> bool {
        node == target || self.is_ancestor(target, node) || self.is_ancestor(node, target)
    }
}
