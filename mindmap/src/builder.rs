//! Builds a validated knowledge map from a model-suggested outline.
//!
//! The builder walks the raw outline depth-first, keeping outline order as
//! child order, attributes every node to the sources whose tags mention it,
//! and settles each top-level node's category by arbitrating between the
//! outline's own hint and the categories suggested by tags.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::config::MindmapConfig;
use crate::error::{Result, StructureError};
use crate::node::{Mindmap, MindmapNode, UNATTRIBUTED};
use crate::outline::{RawOutline, RawOutlineNode, SourceContent};
use crate::schema::CategorySchema;
use crate::similarity::normalize;
use crate::tags::{CategoryTally, ResolvedTag, TagHierarchyResolver, TagWeighting};
use crate::warning::{self, Warning};

/// Result of building a map.
#[derive(Debug, Clone)]
pub struct BuildResult {
    /// The finished map.
    pub mindmap: Mindmap,

    /// Irregularities that were tolerated.
    pub warnings: Vec<Warning>,
}

/// Converts raw outlines plus source tags into a `Mindmap`.
#[derive(Debug, Clone)]
pub struct StructureBuilder {
    schema: CategorySchema,
    weighting: TagWeighting,
}

/// A source with its tags already resolved.
struct ResolvedSource {
    id: String,
    tags: Vec<ResolvedTag>,
}

/// A top-level node together with the category the outline suggested.
struct TopLevel {
    node: MindmapNode,
    hint: Option<String>,
}

impl StructureBuilder {
    /// Create a builder for the given schema with medium weighting.
    pub fn new(schema: CategorySchema) -> Self {
        Self {
            schema,
            weighting: TagWeighting::default(),
        }
    }

    /// Create a builder from configuration.
    pub fn from_config(config: &MindmapConfig) -> Self {
        Self::new(config.schema()).with_weighting(config.weighting)
    }

    /// Set the tag weighting mode.
    pub fn with_weighting(mut self, weighting: TagWeighting) -> Self {
        self.weighting = weighting;
        self
    }

    pub fn weighting(&self) -> TagWeighting {
        self.weighting
    }

    /// Build a map.
    ///
    /// Fails only when the outline contains no title at all.
    pub fn build(&self, outline: &RawOutline, sources: &[SourceContent]) -> Result<BuildResult> {
        if !outline.has_any_title() {
            return Err(StructureError::EmptyOutline.into());
        }

        let mut warnings = Vec::new();
        let mut schema = self.schema.clone();

        let resolved_sources: Vec<ResolvedSource> = {
            let resolver = TagHierarchyResolver::new(&schema);
            sources
                .iter()
                .map(|source| ResolvedSource {
                    id: source.id.clone(),
                    tags: resolver.resolve(&source.tags, &mut warnings),
                })
                .collect()
        };

        let mut top_level = Vec::new();
        self.build_top_level(
            &outline.nodes,
            &schema,
            &resolved_sources,
            &mut top_level,
            &mut warnings,
        );

        let mut mindmap_children = Vec::with_capacity(top_level.len());
        for TopLevel { mut node, hint } in top_level {
            let chosen = self.resolve_category(&node, hint.as_deref(), &schema, &resolved_sources);
            let (category, added) = schema.ensure(&chosen);
            if added {
                warning::push(
                    &mut warnings,
                    Warning::CategoryAdded {
                        category: category.clone(),
                    },
                );
            }
            debug!("Resolved '{}' to category '{}'", node.title, category);
            node.category = Some(category);
            mindmap_children.push(node);
        }

        let mut mindmap = Mindmap::new(schema);
        mindmap.root.children = mindmap_children;
        let mut seen = BTreeSet::new();
        mindmap.source_files = sources
            .iter()
            .filter(|s| seen.insert(s.id.clone()))
            .map(|s| s.id.clone())
            .collect();
        mindmap.renumber();

        info!(
            "Built mindmap with {} nodes from {} sources ({} warnings)",
            mindmap.node_count(),
            mindmap.source_files.len(),
            warnings.len()
        );

        Ok(BuildResult { mindmap, warnings })
    }

    fn build_top_level(
        &self,
        entries: &[RawOutlineNode],
        schema: &CategorySchema,
        sources: &[ResolvedSource],
        out: &mut Vec<TopLevel>,
        warnings: &mut Vec<Warning>,
    ) {
        for entry in entries {
            if entry.clean_title().is_none() {
                warning::push(
                    warnings,
                    Warning::UntitledEntry {
                        hoisted_children: entry.children.len(),
                    },
                );
                self.build_top_level(&entry.children, schema, sources, out, warnings);
                continue;
            }
            if let Some(node) = self.build_node(entry, schema, sources, warnings) {
                out.push(TopLevel {
                    node,
                    hint: entry.category.clone(),
                });
            }
        }
    }

    fn build_children(
        &self,
        entries: &[RawOutlineNode],
        schema: &CategorySchema,
        sources: &[ResolvedSource],
        warnings: &mut Vec<Warning>,
    ) -> Vec<MindmapNode> {
        let mut nodes = Vec::new();
        for entry in entries {
            if entry.clean_title().is_none() {
                warning::push(
                    warnings,
                    Warning::UntitledEntry {
                        hoisted_children: entry.children.len(),
                    },
                );
                nodes.extend(self.build_children(&entry.children, schema, sources, warnings));
                continue;
            }
            nodes.extend(self.build_node(entry, schema, sources, warnings));
        }
        nodes
    }

    fn build_node(
        &self,
        entry: &RawOutlineNode,
        schema: &CategorySchema,
        sources: &[ResolvedSource],
        warnings: &mut Vec<Warning>,
    ) -> Option<MindmapNode> {
        let title = entry.clean_title()?;
        let mut node = MindmapNode::new(title);

        let hints = TagHierarchyResolver::new(schema).resolve(&entry.tags, warnings);
        for hint in &hints {
            node.add_tag(hint.raw.clone());
        }
        attribute(&mut node, &hints, sources);
        if node.source_refs.is_empty() {
            warning::push(
                warnings,
                Warning::UnattributedNode {
                    title: node.title.clone(),
                },
            );
            node.add_source(UNATTRIBUTED);
        }

        node.children = self.build_children(&entry.children, schema, sources, warnings);
        Some(node)
    }

    /// Arbitrate between the outline hint and tag suggestions.
    fn resolve_category(
        &self,
        node: &MindmapNode,
        hint: Option<&str>,
        schema: &CategorySchema,
        sources: &[ResolvedSource],
    ) -> String {
        let tally = tally_subtree(node, schema, sources, self.weighting);
        let hint = hint
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(|h| schema.canonical(h).unwrap_or(h).to_string());
        let suggested = tally.best(schema).map(str::to_string);

        let chosen = match self.weighting {
            TagWeighting::High => suggested.or(hint),
            TagWeighting::Low => hint.or(suggested),
            TagWeighting::Medium => match (hint, suggested) {
                (Some(hint), Some(suggested)) => {
                    if tally.corroboration(&suggested) > tally.corroboration(&hint) {
                        Some(suggested)
                    } else {
                        Some(hint)
                    }
                }
                (hint, suggested) => hint.or(suggested),
            },
        };
        chosen.unwrap_or_else(|| node.title.clone())
    }
}

/// Attach every source whose tags match the node's hints or title.
fn attribute(node: &mut MindmapNode, hints: &[ResolvedTag], sources: &[ResolvedSource]) {
    let title = normalize(&node.title);
    for source in sources {
        for tag in &source.tags {
            let hint_match = hints.iter().any(|h| h.raw.eq_ignore_ascii_case(&tag.raw));
            let title_match = !title.is_empty() && tag.path.iter().any(|seg| normalize(seg) == title);
            if hint_match || title_match {
                node.add_tag(tag.raw.clone());
                node.add_source(source.id.clone());
            }
        }
    }
}

/// The category a tag suggests.
///
/// A first segment naming a schema category suggests that category. Under
/// high weighting an unmatched hierarchical tag suggests a new category
/// spelled from its first segment.
fn suggestion(
    tag: &ResolvedTag,
    schema: &CategorySchema,
    weighting: TagWeighting,
) -> Option<String> {
    if let Some(category) = schema.canonical(tag.root_segment()) {
        return Some(category.to_string());
    }
    match weighting {
        TagWeighting::High => tag.derived_category(),
        TagWeighting::Medium | TagWeighting::Low => None,
    }
}

/// Count category suggestions across a top-level subtree.
///
/// Tags on the nodes count as hits; tags of sources attributed anywhere in
/// the subtree count as corroborating sources.
fn tally_subtree(
    node: &MindmapNode,
    schema: &CategorySchema,
    sources: &[ResolvedSource],
    weighting: TagWeighting,
) -> CategoryTally {
    let resolver = TagHierarchyResolver::new(schema);
    let mut tally = CategoryTally::new();
    let mut attributed = BTreeSet::new();

    for n in node.walk() {
        for tag in &n.tags {
            if let Some(category) = resolver
                .resolve_one(tag)
                .and_then(|t| suggestion(&t, schema, weighting))
            {
                tally.record(&category, None);
            }
        }
        attributed.extend(n.source_refs.iter().filter(|s| *s != UNATTRIBUTED));
    }

    for source in sources.iter().filter(|s| attributed.contains(&s.id)) {
        for tag in &source.tags {
            if let Some(category) = suggestion(tag, schema, weighting) {
                tally.record(&category, Some(&source.id));
            }
        }
    }
    tally
}
