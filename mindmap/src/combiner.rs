//! Merges several maps into one map anchored to a unified category set.
//!
//! Category identity from the source map is authoritative: a subtree is
//! only ever grafted under the unified node of the category it came from.
//! Within a category, near-identical concepts from different inputs are
//! folded into one node.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::config::{CombineConfig, MindmapConfig};
use crate::error::{CombineError, Result};
use crate::linker::{self, LinkReport, MultiParentLinker};
use crate::node::{Mindmap, MindmapNode, UNATTRIBUTED};
use crate::schema::CategorySchema;
use crate::similarity::{normalize, tag_overlap};
use crate::warning::{self, Warning};

/// Result of combining maps.
#[derive(Debug, Clone)]
pub struct CombineResult {
    /// The merged map.
    pub mindmap: Mindmap,

    /// Irregularities that were tolerated.
    pub warnings: Vec<Warning>,

    /// Outcome of the cross-link pass over the merged tree.
    pub links: LinkReport,
}

/// Combines built maps.
#[derive(Debug, Clone)]
pub struct MindmapCombiner {
    config: CombineConfig,
    linker: MultiParentLinker,
}

impl Default for MindmapCombiner {
    fn default() -> Self {
        Self::new(CombineConfig::default())
    }
}

impl MindmapCombiner {
    pub fn new(config: CombineConfig) -> Self {
        Self {
            config,
            linker: MultiParentLinker::default(),
        }
    }

    pub fn from_config(config: &MindmapConfig) -> Self {
        Self::new(config.combine.clone()).with_linker(MultiParentLinker::from_config(config))
    }

    /// Use a specific linker for the final cross-link pass.
    pub fn with_linker(mut self, linker: MultiParentLinker) -> Self {
        self.linker = linker;
        self
    }

    /// Combine maps in the order supplied.
    ///
    /// Fails when no maps are given or when any input has an empty schema.
    pub fn combine(&self, inputs: &[Mindmap]) -> Result<CombineResult> {
        if inputs.is_empty() {
            return Err(CombineError::NoInputs.into());
        }
        if let Some(index) = inputs.iter().position(|m| m.category_schema.is_empty()) {
            return Err(CombineError::MissingSchema { index }.into());
        }

        let mut warnings = Vec::new();
        let mut schema = CategorySchema::union(inputs.iter().map(|m| &m.category_schema));
        let mut root = MindmapNode::root();
        for (i, name) in schema.names().iter().enumerate() {
            root.children.push(unified_category(name, i));
        }

        let mut aliases: HashMap<String, String> = HashMap::new();
        let mut source_files: Vec<String> = Vec::new();

        for (t, input) in inputs.iter().enumerate() {
            for source in &input.source_files {
                if !source_files.contains(source) {
                    source_files.push(source.clone());
                }
            }

            let mut tree = input.root.clone();
            prefix_ids(&mut tree, &format!("{t}:"));

            for node in tree.children {
                let category = node
                    .category
                    .clone()
                    .unwrap_or_else(|| node.title.clone());
                let target_name = match schema.canonical(&category) {
                    Some(name) => name.to_string(),
                    None => {
                        warning::push(
                            &mut warnings,
                            Warning::UncategorizedFallback {
                                category: category.clone(),
                            },
                        );
                        schema.ensure(self.config.fallback_name()).0
                    }
                };

                let index = match root
                    .children
                    .iter()
                    .position(|c| c.title.eq_ignore_ascii_case(&target_name))
                {
                    Some(index) => index,
                    None => {
                        let index = root.children.len();
                        root.children.push(unified_category(&target_name, index));
                        index
                    }
                };
                let target = &mut root.children[index];

                if node.title.eq_ignore_ascii_case(&target_name) {
                    absorb(target, node, &mut aliases, self.config.dedup_tag_overlap);
                } else {
                    merge_child(target, node, &mut aliases, self.config.dedup_tag_overlap);
                }
            }
        }

        for category in &mut root.children {
            if category.source_refs.is_empty() {
                category.add_source(UNATTRIBUTED);
            }
        }
        resolve_aliases(&mut root, &aliases);

        let mut mindmap = Mindmap::new(schema);
        mindmap.root = root;
        mindmap.source_files = source_files;
        mindmap.renumber();

        let pruned = linker::prune_invalid(&mut mindmap);
        if pruned > 0 {
            debug!("Dropped {pruned} secondary links invalidated by the merge");
        }
        let links = self.linker.link(&mut mindmap);

        info!(
            "Combined {} mindmaps into {} nodes across {} categories",
            inputs.len(),
            mindmap.node_count(),
            mindmap.category_schema.len()
        );

        Ok(CombineResult {
            mindmap,
            warnings,
            links,
        })
    }
}

fn unified_category(name: &str, index: usize) -> MindmapNode {
    let mut node = MindmapNode::category(name);
    node.id = format!("category:{index}");
    node
}

/// Prefix every id and secondary reference so ids from different inputs
/// cannot collide.
fn prefix_ids(node: &mut MindmapNode, prefix: &str) {
    node.id = format!("{prefix}{}", node.id);
    node.secondary_parents = node
        .secondary_parents
        .iter()
        .map(|id| format!("{prefix}{id}"))
        .collect();
    for child in &mut node.children {
        prefix_ids(child, prefix);
    }
}

/// Whether two sibling candidates describe the same concept.
fn is_duplicate(a: &MindmapNode, b: &MindmapNode, tag_threshold: f32) -> bool {
    let title_a = normalize(&a.title);
    if !title_a.is_empty() && title_a == normalize(&b.title) {
        return true;
    }
    tag_overlap(&a.tags, &b.tags) >= tag_threshold && !a.tags.is_empty()
}

/// Add `incoming` under `parent`, folding it into an existing duplicate child.
fn merge_child(
    parent: &mut MindmapNode,
    incoming: MindmapNode,
    aliases: &mut HashMap<String, String>,
    tag_threshold: f32,
) {
    match parent
        .children
        .iter_mut()
        .find(|c| is_duplicate(c, &incoming, tag_threshold))
    {
        Some(existing) => absorb(existing, incoming, aliases, tag_threshold),
        None => parent.children.push(incoming),
    }
}

/// Fold `incoming` into `existing`: union of tags, sources, and secondary
/// parents, children merged recursively.
fn absorb(
    existing: &mut MindmapNode,
    incoming: MindmapNode,
    aliases: &mut HashMap<String, String>,
    tag_threshold: f32,
) {
    for tag in incoming.tags {
        existing.add_tag(tag);
    }
    for source in incoming.source_refs {
        existing.add_source(source);
    }
    existing
        .secondary_parents
        .extend(incoming.secondary_parents);
    aliases.insert(incoming.id, existing.id.clone());
    for child in incoming.children {
        merge_child(existing, child, aliases, tag_threshold);
    }
}

/// Point secondary references at the surviving node of every merge.
fn resolve_aliases(node: &mut MindmapNode, aliases: &HashMap<String, String>) {
    let own = node.id.clone();
    node.secondary_parents = node
        .secondary_parents
        .iter()
        .map(|id| follow(aliases, id))
        .filter(|id| *id != own)
        .collect();
    for child in &mut node.children {
        resolve_aliases(child, aliases);
    }
}

fn follow(aliases: &HashMap<String, String>, id: &str) -> String {
    let mut current = id;
    for _ in 0..=aliases.len() {
        match aliases.get(current) {
            Some(next) if next != current => current = next,
            _ => break,
        }
    }
    current.to_string()
}
