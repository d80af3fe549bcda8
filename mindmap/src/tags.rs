//! Hierarchical tag resolution.
//!
//! Tags such as `deeptech/quantum-ai` are split into path segments. When the
//! first segment names a schema category, the tag suggests that category
//! for the top-level node it ends up under.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::schema::CategorySchema;
use crate::warning::{self, Warning};

/// How strongly tag suggestions count against the outline's own category hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagWeighting {
    /// Tag suggestion wins on conflict.
    High,
    /// The suggestion backed by more source files wins; a tie keeps the hint.
    #[default]
    Medium,
    /// The hint wins; tags only fill in when there is no hint.
    Low,
}

impl TagWeighting {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagWeighting::High => "high",
            TagWeighting::Medium => "medium",
            TagWeighting::Low => "low",
        }
    }
}

impl fmt::Display for TagWeighting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TagWeighting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(TagWeighting::High),
            "medium" => Ok(TagWeighting::Medium),
            "low" => Ok(TagWeighting::Low),
            other => Err(format!("unknown tag weighting: {other}")),
        }
    }
}

/// A tag split into its hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTag {
    /// Cleaned tag text, segments joined with `/`.
    pub raw: String,

    /// Non-empty path segments, outermost first.
    pub path: Vec<String>,

    /// Schema spelling of the first segment, when it names a category.
    pub suggested_category: Option<String>,
}

impl ResolvedTag {
    /// The outermost segment.
    pub fn root_segment(&self) -> &str {
        self.path.first().map(String::as_str).unwrap_or_default()
    }

    /// The innermost segment.
    pub fn leaf(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or_default()
    }

    pub fn is_hierarchical(&self) -> bool {
        self.path.len() > 1
    }

    /// Category name spelled from the outermost segment of a hierarchical
    /// tag: `deeptech/quantum-ai` gives `Deeptech`, `deep-tech/x` gives
    /// `Deep Tech`. Flat tags give nothing.
    pub fn derived_category(&self) -> Option<String> {
        if !self.is_hierarchical() {
            return None;
        }
        let words: Vec<String> = self
            .root_segment()
            .split(['-', '_', ' '])
            .filter(|w| !w.is_empty())
            .map(capitalize)
            .collect();
        if words.is_empty() {
            None
        } else {
            Some(words.join(" "))
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Splits raw tags into paths and category suggestions.
pub struct TagHierarchyResolver<'a> {
    schema: &'a CategorySchema,
}

impl<'a> TagHierarchyResolver<'a> {
    pub fn new(schema: &'a CategorySchema) -> Self {
        Self { schema }
    }

    /// Resolve a single tag. Returns `None` for blank tags.
    pub fn resolve_one(&self, raw: &str) -> Option<ResolvedTag> {
        let trimmed = raw.trim().trim_start_matches('#');
        let path: Vec<String> = trimmed
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let first = path.first()?;
        let suggested_category = self.schema.canonical(first).map(str::to_string);
        Some(ResolvedTag {
            raw: path.join("/"),
            path,
            suggested_category,
        })
    }

    /// Resolve a set of tags, dropping blanks with a warning and duplicates
    /// (ignoring case) silently.
    pub fn resolve<I, S>(&self, tags: I, warnings: &mut Vec<Warning>) -> Vec<ResolvedTag>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = BTreeSet::new();
        let mut resolved = Vec::new();
        for tag in tags {
            let tag = tag.as_ref();
            match self.resolve_one(tag) {
                Some(r) => {
                    if seen.insert(r.raw.to_lowercase()) {
                        resolved.push(r);
                    }
                }
                None => warning::push(
                    warnings,
                    Warning::TagDropped {
                        raw: tag.to_string(),
                    },
                ),
            }
        }
        resolved
    }
}

/// Per-category tally of tag suggestions and the sources backing them.
#[derive(Debug, Clone, Default)]
pub struct CategoryTally {
    entries: Vec<TallyEntry>,
}

#[derive(Debug, Clone)]
struct TallyEntry {
    category: String,
    sources: BTreeSet<String>,
    hits: usize,
}

impl CategoryTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one suggestion for `category`, optionally backed by a source.
    pub fn record(&mut self, category: &str, source: Option<&str>) {
        let idx = match self
            .entries
            .iter()
            .position(|e| e.category.eq_ignore_ascii_case(category))
        {
            Some(idx) => idx,
            None => {
                self.entries.push(TallyEntry {
                    category: category.to_string(),
                    sources: BTreeSet::new(),
                    hits: 0,
                });
                self.entries.len() - 1
            }
        };
        let entry = &mut self.entries[idx];
        entry.hits += 1;
        if let Some(source) = source {
            entry.sources.insert(source.to_string());
        }
    }

    /// Number of distinct source files backing `category`.
    pub fn corroboration(&self, category: &str) -> usize {
        self.entries
            .iter()
            .find(|e| e.category.eq_ignore_ascii_case(category))
            .map_or(0, |e| e.sources.len())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The strongest suggestion: most sources, then most hits, then
    /// earliest in the schema.
    pub fn best(&self, schema: &CategorySchema) -> Option<&str> {
        self.entries
            .iter()
            .min_by_key(|e| {
                (
                    std::cmp::Reverse(e.sources.len()),
                    std::cmp::Reverse(e.hits),
                    schema.position(&e.category).unwrap_or(usize::MAX),
                )
            })
            .map(|e| e.category.as_str())
    }
}
