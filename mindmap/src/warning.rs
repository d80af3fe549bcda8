//! Non-fatal diagnostics collected while processing a map.
//!
//! Warnings never stop an operation. Each stage pushes them into the
//! result it returns and logs them as they are raised.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// A non-fatal irregularity encountered during processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// An empty or whitespace-only tag was ignored.
    TagDropped { raw: String },

    /// An outline entry without a usable title was removed; its children were kept.
    UntitledEntry { hoisted_children: usize },

    /// No source could be attributed to a node.
    UnattributedNode { title: String },

    /// A category outside the schema was appended to it.
    CategoryAdded { category: String },

    /// A secondary-link annotation could not be restored.
    DroppedAnnotation {
        title: String,
        target: String,
        reason: String,
    },

    /// A category absent from every schema was placed under the fallback.
    UncategorizedFallback { category: String },

    /// A parsed line carried no source list.
    MissingSources { line: usize, title: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::TagDropped { raw } => write!(f, "dropped empty tag {raw:?}"),
            Warning::UntitledEntry { hoisted_children } => write!(
                f,
                "outline entry without title removed, {hoisted_children} children hoisted"
            ),
            Warning::UnattributedNode { title } => {
                write!(f, "no source attributed to node '{title}'")
            }
            Warning::CategoryAdded { category } => {
                write!(f, "category '{category}' appended to schema")
            }
            Warning::DroppedAnnotation {
                title,
                target,
                reason,
            } => write!(f, "dropped link '{title}' -> '{target}': {reason}"),
            Warning::UncategorizedFallback { category } => {
                write!(f, "category '{category}' unknown, placed under fallback")
            }
            Warning::MissingSources { line, title } => {
                write!(f, "line {line}: node '{title}' has no sources")
            }
        }
    }
}

/// Record a warning and log it.
pub(crate) fn push(warnings: &mut Vec<Warning>, warning: Warning) {
    warn!("{warning}");
    warnings.push(warning);
}
