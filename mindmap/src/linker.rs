//! Cross-branch secondary links.
//!
//! The linker never adds owning children. It only records, on a node, the
//! ids of nodes in other branches it is related to. Links are directional:
//! the node discovered first in a depth-first walk carries the reference,
//! so each related pair is annotated exactly once.

use std::collections::{BTreeSet, HashSet};

use tracing::debug;

use crate::config::{LinkerConfig, MindmapConfig};
use crate::node::{Ancestry, Mindmap};
use crate::similarity::{shares_tag, title_overlap};

/// Outcome of a linking pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkReport {
    /// Links added.
    pub added: usize,

    /// Related pairs rejected because one node is an ancestor of the other.
    pub skipped: usize,
}

/// Discovers secondary parents between related nodes.
#[derive(Debug, Clone)]
pub struct MultiParentLinker {
    config: LinkerConfig,
    enabled: bool,
}

impl Default for MultiParentLinker {
    fn default() -> Self {
        Self::new(LinkerConfig::default())
    }
}

/// Snapshot of a node used during discovery.
struct Candidate {
    id: String,
    title: String,
    tags: BTreeSet<String>,
}

impl MultiParentLinker {
    /// Create an enabled linker.
    pub fn new(config: LinkerConfig) -> Self {
        Self {
            config,
            enabled: true,
        }
    }

    /// Create a linker from configuration, honoring the multi-parent flag.
    pub fn from_config(config: &MindmapConfig) -> Self {
        Self::new(config.linker.clone()).with_enabled(config.multi_parent)
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Add secondary links between related nodes of depth 2 and below.
    ///
    /// Category nodes are never linked. A pair already linked in either
    /// direction is left alone. When disabled this is a no-op.
    pub fn link(&self, mindmap: &mut Mindmap) -> LinkReport {
        let mut report = LinkReport::default();
        if !self.enabled {
            return report;
        }

        let ancestry = Ancestry::new(mindmap);
        let candidates: Vec<Candidate> = mindmap
            .nodes()
            .into_iter()
            .filter(|n| n.depth >= 2)
            .map(|n| Candidate {
                id: n.id.clone(),
                title: n.title.clone(),
                tags: n.tags.clone(),
            })
            .collect();

        let mut linked: HashSet<(String, String)> = mindmap
            .secondary_links()
            .into_iter()
            .map(|(a, b)| unordered(a, b))
            .collect();
        let mut new_links = Vec::new();

        for (i, a) in candidates.iter().enumerate() {
            for b in &candidates[i + 1..] {
                if !self.related(a, b) {
                    continue;
                }
                let key = unordered(a.id.clone(), b.id.clone());
                if linked.contains(&key) {
                    continue;
                }
                if ancestry.excludes(&a.id, &b.id) {
                    report.skipped += 1;
                    continue;
                }
                linked.insert(key);
                new_links.push((a.id.clone(), b.id.clone()));
            }
        }

        for (from, to) in new_links {
            if let Some(node) = mindmap.root.find_mut(&from) {
                node.secondary_parents.insert(to);
                report.added += 1;
            }
        }

        debug!(
            "Linked mindmap: {} added, {} skipped",
            report.added, report.skipped
        );
        report
    }

    fn related(&self, a: &Candidate, b: &Candidate) -> bool {
        (self.config.link_shared_tags && shares_tag(&a.tags, &b.tags))
            || title_overlap(&a.title, &b.title) >= self.config.title_overlap_threshold
    }
}

/// Remove secondary links that name unknown nodes, violate the
/// ancestor/descendant exclusion, or repeat a pair already linked from the
/// other end. Returns the number of links removed.
pub fn prune_invalid(mindmap: &mut Mindmap) -> usize {
    let ancestry = Ancestry::new(mindmap);
    let known: HashSet<String> = mindmap.root.walk().iter().map(|n| n.id.clone()).collect();

    let mut seen = HashSet::new();
    let mut invalid = Vec::new();
    for (from, to) in mindmap.secondary_links() {
        if !known.contains(&to) || ancestry.excludes(&from, &to) {
            invalid.push((from, to));
            continue;
        }
        if !seen.insert(unordered(from.clone(), to.clone())) {
            invalid.push((from, to));
        }
    }

    for (from, to) in &invalid {
        if let Some(node) = mindmap.root.find_mut(from) {
            node.secondary_parents.remove(to);
        }
    }
    if !invalid.is_empty() {
        debug!("Pruned {} invalid secondary links", invalid.len());
    }
    invalid.len()
}

fn unordered(a: String, b: String) -> (String, String) {
    if a <= b { (a, b) } else { (b, a) }
}
