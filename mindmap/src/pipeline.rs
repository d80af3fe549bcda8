//! End-to-end generation: outline provider, builder, linker, combiner.
//!
//! Only the provider call is asynchronous. Everything after it is a
//! synchronous transform over values.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::builder::StructureBuilder;
use crate::combiner::{CombineResult, MindmapCombiner};
use crate::config::MindmapConfig;
use crate::error::{MindmapError, Result};
use crate::linker::{LinkReport, MultiParentLinker};
use crate::node::Mindmap;
use crate::outline::{RawOutline, RawOutlineNode, SourceContent};
use crate::schema::CategorySchema;
use crate::tags::TagHierarchyResolver;
use crate::warning::Warning;

/// Suggests a raw outline for a batch of sources.
///
/// Implementations typically wrap a language model. The suggestion is
/// advisory: the builder validates and corrects it.
#[async_trait]
pub trait OutlineProvider: Send + Sync {
    /// Suggest an outline for `sources` using the categories in `schema`.
    async fn suggest_outline(
        &self,
        sources: &[SourceContent],
        schema: &CategorySchema,
    ) -> Result<RawOutline>;

    /// Provider name, for logs.
    fn name(&self) -> &str {
        "outline-provider"
    }
}

/// Returns the same outline on every call.
#[derive(Debug, Clone)]
pub struct StaticOutlineProvider {
    outline: RawOutline,
}

impl StaticOutlineProvider {
    pub fn new(outline: RawOutline) -> Self {
        Self { outline }
    }

    /// Parse the outline from a model-style JSON answer.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(Self::new(RawOutline::from_json(text)?))
    }
}

#[async_trait]
impl OutlineProvider for StaticOutlineProvider {
    async fn suggest_outline(
        &self,
        _sources: &[SourceContent],
        _schema: &CategorySchema,
    ) -> Result<RawOutline> {
        Ok(self.outline.clone())
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Derives an outline from hierarchical source tags alone.
///
/// Every tag path becomes a chain under a top-level entry named after its
/// first segment. Used when no model is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagOutlineProvider;

#[async_trait]
impl OutlineProvider for TagOutlineProvider {
    async fn suggest_outline(
        &self,
        sources: &[SourceContent],
        schema: &CategorySchema,
    ) -> Result<RawOutline> {
        let resolver = TagHierarchyResolver::new(schema);
        let mut ignored = Vec::new();
        let mut nodes: Vec<RawOutlineNode> = Vec::new();

        for source in sources {
            for tag in resolver.resolve(&source.tags, &mut ignored) {
                let Some((first, rest)) = tag.path.split_first() else {
                    continue;
                };
                if rest.is_empty() {
                    continue;
                }
                let top_title = tag.suggested_category.clone().unwrap_or_else(|| first.clone());
                let index = match nodes.iter().position(|n| {
                    n.title
                        .as_deref()
                        .is_some_and(|t| t.eq_ignore_ascii_case(&top_title))
                }) {
                    Some(index) => index,
                    None => {
                        nodes.push(RawOutlineNode::new(&top_title).with_category(&top_title));
                        nodes.len() - 1
                    }
                };
                insert_chain(&mut nodes[index], rest);
            }
        }

        debug!("Derived {} top-level entries from tags", nodes.len());
        Ok(RawOutline::new(nodes))
    }

    fn name(&self) -> &str {
        "tags"
    }
}

fn insert_chain(parent: &mut RawOutlineNode, segments: &[String]) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    let index = match parent.children.iter().position(|c| {
        c.title
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case(head))
    }) {
        Some(index) => index,
        None => {
            parent.children.push(RawOutlineNode::new(head));
            parent.children.len() - 1
        }
    };
    insert_chain(&mut parent.children[index], rest);
}

/// Output of one generation run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub mindmap: Mindmap,
    pub warnings: Vec<Warning>,
    pub links: LinkReport,
}

/// Runs provider, builder, and linker with one configuration.
pub struct MindmapPipeline {
    config: MindmapConfig,
    provider: Arc<dyn OutlineProvider>,
}

impl MindmapPipeline {
    pub fn new(config: MindmapConfig, provider: Arc<dyn OutlineProvider>) -> Self {
        Self { config, provider }
    }

    pub fn config(&self) -> &MindmapConfig {
        &self.config
    }

    /// Generate one map from a batch of sources.
    pub async fn generate(&self, sources: &[SourceContent]) -> Result<PipelineOutput> {
        let schema = self.config.schema();
        info!(
            "Generating mindmap from {} sources with provider '{}'",
            sources.len(),
            self.provider.name()
        );

        let outline = tokio::time::timeout(
            self.config.outline_timeout(),
            self.provider.suggest_outline(sources, &schema),
        )
        .await
        .map_err(|_| MindmapError::Timeout(self.config.outline_timeout_secs))??;

        let built = StructureBuilder::from_config(&self.config).build(&outline, sources)?;
        let mut mindmap = built.mindmap;
        let links = MultiParentLinker::from_config(&self.config).link(&mut mindmap);

        Ok(PipelineOutput {
            mindmap,
            warnings: built.warnings,
            links,
        })
    }

    /// Generate one map per batch, in order, and combine them.
    pub async fn generate_combined(&self, batches: &[Vec<SourceContent>]) -> Result<CombineResult> {
        let mut maps = Vec::with_capacity(batches.len());
        let mut warnings = Vec::new();
        for batch in batches {
            let output = self.generate(batch).await?;
            warnings.extend(output.warnings);
            maps.push(output.mindmap);
        }

        let mut combined = MindmapCombiner::from_config(&self.config).combine(&maps)?;
        warnings.append(&mut combined.warnings);
        combined.warnings = warnings;
        Ok(combined)
    }
}
