//! Summaries over a built map.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::node::{Mindmap, MindmapNode, UNATTRIBUTED};

/// Shape of a map at a glance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MindmapStats {
    /// Nodes excluding the root.
    pub total_nodes: usize,
    pub categories: usize,
    pub max_depth: u32,
    /// Node count per depth, starting at depth 1.
    pub nodes_per_depth: BTreeMap<u32, usize>,
    pub secondary_links: usize,
    /// Nodes carrying only the unattributed sentinel.
    pub unattributed: usize,
    pub source_files: usize,
}

impl MindmapStats {
    pub fn from_mindmap(mindmap: &Mindmap) -> Self {
        let nodes = mindmap.nodes();
        let mut nodes_per_depth = BTreeMap::new();
        for node in &nodes {
            *nodes_per_depth.entry(node.depth).or_insert(0) += 1;
        }
        Self {
            total_nodes: nodes.len(),
            categories: mindmap.root.children.len(),
            max_depth: mindmap.max_depth(),
            nodes_per_depth,
            secondary_links: mindmap.secondary_links().len(),
            unattributed: nodes.iter().filter(|n| n.is_unattributed()).count(),
            source_files: mindmap.source_files.len(),
        }
    }
}

impl fmt::Display for MindmapStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mindmap Statistics:")?;
        writeln!(f, "  Nodes: {}", self.total_nodes)?;
        writeln!(f, "  Categories: {}", self.categories)?;
        writeln!(f, "  Max depth: {}", self.max_depth)?;
        for (depth, count) in &self.nodes_per_depth {
            writeln!(f, "    depth {depth}: {count}")?;
        }
        writeln!(f, "  Cross-links: {}", self.secondary_links)?;
        writeln!(f, "  Unattributed nodes: {}", self.unattributed)?;
        write!(f, "  Source files: {}", self.source_files)
    }
}

/// Per-category totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: String,
    /// Nodes in the category subtree, including the category node.
    pub nodes: usize,
    /// Distinct real sources referenced anywhere in the subtree.
    pub sources: Vec<String>,
}

/// Summaries for each depth-1 node, in tree order.
pub fn category_summaries(mindmap: &Mindmap) -> Vec<CategorySummary> {
    mindmap
        .root
        .children
        .iter()
        .map(|category| {
            let mut sources: Vec<String> = Vec::new();
            for node in category.walk() {
                for source in &node.source_refs {
                    if source != UNATTRIBUTED && !sources.contains(source) {
                        sources.push(source.clone());
                    }
                }
            }
            CategorySummary {
                category: category
                    .category
                    .clone()
                    .unwrap_or_else(|| category.title.clone()),
                nodes: category.subtree_size(),
                sources,
            }
        })
        .collect()
}

/// How often a tag occurs across the map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSummary {
    pub tag: String,
    pub count: usize,
}

/// Tag usage, most frequent first, ties broken by name.
///
/// Tags are counted case-insensitively and reported in the spelling first seen.
pub fn tag_summaries(mindmap: &Mindmap) -> Vec<TagSummary> {
    let mut counts: HashMap<String, TagSummary> = HashMap::new();
    let nodes: Vec<&MindmapNode> = mindmap.nodes();
    for node in nodes {
        for tag in &node.tags {
            counts
                .entry(tag.to_lowercase())
                .or_insert_with(|| TagSummary {
                    tag: tag.clone(),
                    count: 0,
                })
                .count += 1;
        }
    }
    let mut summaries: Vec<TagSummary> = counts.into_values().collect();
    summaries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    summaries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CategorySchema;
    use pretty_assertions::assert_eq;

    fn sample() -> Mindmap {
        let mut map = Mindmap::new(CategorySchema::new(["Technological", "Economic"]));
        map.root.children.push(
            MindmapNode::category("Technological")
                .with_source("a.md")
                .with_child(
                    MindmapNode::new("AI Research")
                        .with_tag("ai")
                        .with_source("a.md")
                        .with_child(MindmapNode::new("Scaling").with_tag("AI").with_source("b.md")),
                ),
        );
        map.root.children.push(
            MindmapNode::category("Economic")
                .with_source(UNATTRIBUTED)
                .with_child(MindmapNode::new("Markets").with_tag("finance").with_source(UNATTRIBUTED)),
        );
        map.source_files = vec!["a.md".to_string(), "b.md".to_string()];
        map.renumber();
        map.root.find_mut("1.0").unwrap().secondary_parents.insert("0.0".to_string());
        map
    }

    #[test]
    fn test_stats() {
        let stats = MindmapStats::from_mindmap(&sample());
        assert_eq!(stats.total_nodes, 5);
        assert_eq!(stats.categories, 2);
        assert_eq!(stats.max_depth, 3);
        assert_eq!(stats.nodes_per_depth, BTreeMap::from([(1, 2), (2, 2), (3, 1)]));
        assert_eq!(stats.secondary_links, 1);
        assert_eq!(stats.unattributed, 2);
        assert_eq!(stats.source_files, 2);

        let text = stats.to_string();
        assert!(text.contains("Nodes: 5"));
        assert!(text.contains("depth 3: 1"));
    }

    #[test]
    fn test_category_summaries() {
        let summaries = category_summaries(&sample());
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].category, "Technological");
        assert_eq!(summaries[0].nodes, 3);
        assert_eq!(summaries[0].sources, vec!["a.md".to_string(), "b.md".to_string()]);
        assert_eq!(summaries[1].nodes, 2);
        assert!(summaries[1].sources.is_empty());
    }

    #[test]
    fn test_tag_summaries() {
        let summaries = tag_summaries(&sample());
        assert_eq!(
            summaries,
            vec![
                TagSummary {
                    tag: "ai".to_string(),
                    count: 2
                },
                TagSummary {
                    tag: "finance".to_string(),
                    count: 1
                },
            ]
        );
    }
}
