//! # Knowledge Map Core
//!
//! Turns a set of tagged sources into a hierarchical knowledge map and
//! keeps it in a plain-text outline form that survives round trips.
//!
//! - **Structure building**: validates a model-suggested outline against an
//!   ordered category schema, arbitrating categories with source tags
//! - **Multi-parent linking**: records cross-branch relationships as weak
//!   secondary parents without ever creating cycles
//! - **Outline format**: renders and re-parses maps losslessly
//! - **Combining**: merges maps under a unified schema without moving any
//!   subtree out of the category it came from
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Generation                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  SourceContent ──► OutlineProvider ──► RawOutline               │
//! │                                            │                    │
//! │                                            ▼                    │
//! │  TagHierarchyResolver ──► StructureBuilder ──► Mindmap          │
//! │                                                   │             │
//! │                                                   ▼             │
//! │                                          MultiParentLinker      │
//! └─────────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Persistence & Merging                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Mindmap ◄──► OutlineSerializer ◄──► MindmapStore (<id>.md)     │
//! │                                                                 │
//! │  [Mindmap, ..] ──► MindmapCombiner ──► Mindmap                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

// Core modules
pub mod config;
pub mod error;
pub mod node;
pub mod schema;
pub mod similarity;
pub mod warning;

// Transform modules
pub mod builder;
pub mod combiner;
pub mod linker;
pub mod outline;
pub mod serializer;
pub mod tags;

// Services
pub mod pipeline;
pub mod stats;
pub mod storage;

// Core re-exports
pub use config::{CombineConfig, DEFAULT_CATEGORIES, LinkerConfig, MindmapConfig};
pub use error::{CombineError, MindmapError, ParseError, Result, StructureError};
pub use node::{Mindmap, MindmapNode, ROOT_ID, UNATTRIBUTED};
pub use schema::CategorySchema;
pub use warning::Warning;

// Transform re-exports
pub use builder::{BuildResult, StructureBuilder};
pub use combiner::{CombineResult, MindmapCombiner};
pub use linker::{LinkReport, MultiParentLinker};
pub use outline::{RawOutline, RawOutlineNode, SourceContent};
pub use serializer::{OutlineSerializer, ParseResult};
pub use tags::{ResolvedTag, TagHierarchyResolver, TagWeighting};

// Service re-exports
pub use pipeline::{
    MindmapPipeline, OutlineProvider, PipelineOutput, StaticOutlineProvider, TagOutlineProvider,
};
pub use stats::{CategorySummary, MindmapStats, TagSummary, category_summaries, tag_summaries};
pub use storage::{MindmapMetadata, MindmapStore, SaveOptions};
