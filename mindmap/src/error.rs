//! Error types for the knowledge map core.

use thiserror::Error;

/// Result type alias for mindmap operations.
pub type Result<T> = std::result::Result<T, MindmapError>;

/// Errors that can occur while building, combining, or persisting maps.
#[derive(Error, Debug)]
pub enum MindmapError {
    /// The raw outline could not be turned into a tree.
    #[error("structure error: {0}")]
    Structure(#[from] StructureError),

    /// Input maps could not be combined.
    #[error("combine error: {0}")]
    Combine(#[from] CombineError),

    /// Outline text could not be parsed.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Stored map not found.
    #[error("mindmap not found: {0}")]
    NotFound(String),

    /// The outline provider failed.
    #[error("outline provider error: {0}")]
    Provider(String),

    /// The outline provider did not answer in time.
    #[error("outline provider timed out after {0}s")]
    Timeout(u64),

    /// Invalid configuration file.
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the structure builder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructureError {
    /// The outline contains no titled entry at all.
    #[error("raw outline contains no titles")]
    EmptyOutline,
}

/// Errors raised by the combiner.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CombineError {
    /// Nothing to combine.
    #[error("no mindmaps supplied")]
    NoInputs,

    /// An input map has no category schema, so its subtrees cannot be placed.
    #[error("input mindmap #{index} has an empty category schema")]
    MissingSchema { index: usize },
}

/// Errors raised while parsing outline text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A line is neither a heading nor a bullet.
    #[error("line {line}: unrecognized outline line")]
    UnrecognizedLine { line: usize },

    /// Indentation is not a multiple of the indent width.
    #[error("line {line}: indentation of {spaces} spaces is not a multiple of 2")]
    OddIndentation { line: usize, spaces: usize },

    /// A line skips one or more depth levels.
    #[error("line {line}: depth {depth} follows depth {previous}")]
    UnbalancedIndentation {
        line: usize,
        depth: u32,
        previous: u32,
    },

    /// A bullet appears before any heading.
    #[error("line {line}: bullet outside of any category heading")]
    OrphanBullet { line: usize },

    /// A heading is indented.
    #[error("line {line}: headings must not be indented")]
    IndentedHeading { line: usize },
}
