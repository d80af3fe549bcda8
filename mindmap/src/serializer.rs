//! Plain-text outline format.
//!
//! ```text
//! <!-- categories: Frontend | Backend -->
//! # Frontend {sources: ui.md}
//!   - State Management {tags: state} {sources: ui.md} [ALSO: State Management]
//!     - Stores {sources: ui.md}
//! # Backend {sources: api.md}
//!   - State Management {sources: api.md}
//! ```
//!
//! Depth 1 is always a `#` heading and every deeper level is always a `-`
//! bullet, indented by two spaces per level below the first. The marker is
//! chosen from the depth alone. Metadata rides along as trailing inline
//! annotations in a fixed order: `{category: ..}`, `{tags: ..}`,
//! `{sources: ..}`, then one `[ALSO: <title>]` per secondary parent.
//!
//! Text that would read as markup is backslash-escaped. Outline lines
//! escape `\` and brackets and braces, list items also escape `,`, and
//! header names escape `\` and `|`. For example, a title `Arrays [1]`
//! is written `Arrays \[1\]`.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex_lite::Regex;
use tracing::debug;

use crate::error::{ParseError, Result};
use crate::node::{Ancestry, Mindmap, MindmapNode, UNATTRIBUTED};
use crate::schema::CategorySchema;
use crate::warning::{self, Warning};

/// Spaces per depth level.
pub const INDENT_WIDTH: usize = 2;

const HEADING_MARKER: &str = "#";
const BULLET_MARKER: &str = "-";
const HEADER_PREFIX: &str = "<!-- categories:";
const HEADER_SUFFIX: &str = "-->";

/// Characters escaped in titles, category names, and `[ALSO: ..]` targets.
const TEXT_SPECIALS: &[char] = &['\\', '[', ']', '{', '}'];
/// Characters escaped in tag and source list items.
const LIST_SPECIALS: &[char] = &['\\', '[', ']', '{', '}', ','];
/// Characters escaped in category header names.
const HEADER_SPECIALS: &[char] = &['\\', '|'];
/// Characters a backslash may escape.
const ESCAPABLE: &[char] = &['\\', '[', ']', '{', '}', ',', '|'];

static ANNOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:^|\s+)(?:\[ALSO: ((?:[^\\\]]|\\.)*)\]|\{(category|tags|sources): ((?:[^\\}]|\\.)*)\})$",
    )
    .unwrap_or_else(|err| panic!("invalid annotation pattern: {err}"))
});

/// Result of parsing outline text.
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// The reconstructed map.
    pub mindmap: Mindmap,

    /// Annotations that could not be restored, and similar irregularities.
    pub warnings: Vec<Warning>,
}

/// Renders maps to outline text and parses them back.
#[derive(Debug, Clone)]
pub struct OutlineSerializer {
    schema_header: bool,
}

impl Default for OutlineSerializer {
    fn default() -> Self {
        Self::new()
    }
}

/// The marker used for every line at `depth`.
pub fn marker_for_depth(depth: u32) -> &'static str {
    if depth <= 1 { HEADING_MARKER } else { BULLET_MARKER }
}

/// One parsed outline line before it is placed in the tree.
#[derive(Debug, Default)]
struct ParsedLine {
    line: usize,
    depth: u32,
    title: String,
    category: Option<String>,
    tags: Vec<String>,
    sources: Option<Vec<String>>,
    also: Vec<String>,
}

impl OutlineSerializer {
    /// Create a serializer that writes the category header line.
    pub fn new() -> Self {
        Self {
            schema_header: true,
        }
    }

    /// Whether the `<!-- categories: .. -->` header is written.
    pub fn with_schema_header(mut self, enabled: bool) -> Self {
        self.schema_header = enabled;
        self
    }

    /// Render a map as outline text. Never mutates the map.
    pub fn render(&self, mindmap: &Mindmap) -> String {
        let titles: HashMap<&str, &str> = mindmap
            .nodes()
            .into_iter()
            .map(|n| (n.id.as_str(), n.title.as_str()))
            .collect();

        let mut out = String::new();
        if self.schema_header {
            let names: Vec<String> = mindmap
                .category_schema
                .names()
                .iter()
                .map(|name| escape(name, HEADER_SPECIALS))
                .collect();
            out.push_str(&format!(
                "{HEADER_PREFIX} {} {HEADER_SUFFIX}\n",
                names.join(" | ")
            ));
        }
        for node in mindmap.nodes() {
            out.push_str(&render_line(node, &titles));
            out.push('\n');
        }
        out
    }

    /// Parse outline text back into a map.
    ///
    /// Structural problems fail with `ParseError`. Secondary-link
    /// annotations that name no other node, or that would link a node to
    /// its own ancestor or descendant, are dropped with a warning.
    pub fn parse(&self, text: &str) -> Result<ParseResult> {
        let mut warnings = Vec::new();
        let mut header: Option<CategorySchema> = None;
        let mut lines = Vec::new();
        let mut previous_depth = 0u32;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim_end();
            if line.trim().is_empty() {
                continue;
            }
            if let Some(schema) = parse_header(line) {
                if lines.is_empty() && header.is_none() {
                    header = Some(schema);
                }
                continue;
            }
            if line.trim_start().starts_with("<!--") {
                continue;
            }

            let parsed = parse_line(line, line_no, previous_depth)?;
            previous_depth = parsed.depth;
            lines.push(parsed);
        }

        let mindmap = assemble(lines, header, &mut warnings);
        debug!(
            "Parsed outline into {} nodes ({} warnings)",
            mindmap.node_count(),
            warnings.len()
        );
        Ok(ParseResult { mindmap, warnings })
    }
}

fn render_line(node: &MindmapNode, titles: &HashMap<&str, &str>) -> String {
    let depth = node.depth.max(1);
    let indent = " ".repeat(INDENT_WIDTH * (depth as usize - 1));
    let mut line = format!(
        "{indent}{} {}",
        marker_for_depth(depth),
        escape(&node.title, TEXT_SPECIALS)
    );

    if depth == 1 {
        if let Some(category) = node.category.as_deref().filter(|c| *c != node.title) {
            line.push_str(&format!(" {{category: {}}}", escape(category, TEXT_SPECIALS)));
        }
    }
    if !node.tags.is_empty() {
        line.push_str(&format!(" {{tags: {}}}", join_list(&node.tags)));
    }
    if !node.source_refs.is_empty() {
        line.push_str(&format!(" {{sources: {}}}", join_list(&node.source_refs)));
    }
    for target in &node.secondary_parents {
        if let Some(title) = titles.get(target.as_str()) {
            line.push_str(&format!(" [ALSO: {}]", escape(title, TEXT_SPECIALS)));
        }
    }
    line.trim_end().to_string()
}

fn parse_header(line: &str) -> Option<CategorySchema> {
    let inner = line
        .trim()
        .strip_prefix(HEADER_PREFIX)?
        .strip_suffix(HEADER_SUFFIX)?;
    Some(CategorySchema::new(split_escaped(inner, '|')))
}

fn parse_line(line: &str, line_no: usize, previous_depth: u32) -> Result<ParsedLine> {
    let spaces = line.len() - line.trim_start_matches(' ').len();
    let body = &line[spaces..];

    let (depth, rest) = if let Some(rest) = strip_marker(body, HEADING_MARKER) {
        if spaces > 0 {
            return Err(ParseError::IndentedHeading { line: line_no }.into());
        }
        (1, rest)
    } else if let Some(rest) = strip_marker(body, BULLET_MARKER) {
        if spaces % INDENT_WIDTH != 0 {
            return Err(ParseError::OddIndentation {
                line: line_no,
                spaces,
            }
            .into());
        }
        if spaces == 0 || previous_depth == 0 {
            return Err(ParseError::OrphanBullet { line: line_no }.into());
        }
        ((spaces / INDENT_WIDTH) as u32 + 1, rest)
    } else {
        return Err(ParseError::UnrecognizedLine { line: line_no }.into());
    };

    if depth > previous_depth + 1 {
        return Err(ParseError::UnbalancedIndentation {
            line: line_no,
            depth,
            previous: previous_depth,
        }
        .into());
    }

    let mut parsed = split_annotations(rest);
    parsed.line = line_no;
    parsed.depth = depth;
    Ok(parsed)
}

/// Strip `marker` followed by a space, or a bare marker (empty title).
fn strip_marker<'a>(body: &'a str, marker: &str) -> Option<&'a str> {
    let rest = body.strip_prefix(marker)?;
    if rest.is_empty() {
        Some(rest)
    } else {
        rest.strip_prefix(' ')
    }
}

/// Peel trailing annotations off a line body.
fn split_annotations(rest: &str) -> ParsedLine {
    let mut parsed = ParsedLine::default();
    let mut remaining = rest.trim_end();
    let mut also = Vec::new();

    while let Some(caps) = ANNOTATION.captures(remaining) {
        let Some(whole) = caps.get(0) else { break };
        if let Some(title) = caps.get(1) {
            also.push(unescape(title.as_str()));
        } else if let (Some(key), Some(value)) = (caps.get(2), caps.get(3)) {
            let value = value.as_str();
            match key.as_str() {
                "category" => parsed.category = Some(unescape(value.trim())),
                "tags" => parsed.tags = split_escaped(value, ','),
                _ => parsed.sources = Some(split_escaped(value, ',')),
            }
        }
        remaining = &remaining[..whole.start()];
    }

    also.reverse();
    parsed.also = also;
    parsed.title = unescape(remaining.trim());
    parsed
}

/// Backslash-escape every character of `text` found in `specials`.
fn escape(text: &str, specials: &[char]) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if specials.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Undo `escape`. A backslash before any other character is kept.
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next_if(|n| ESCAPABLE.contains(n)) {
                out.push(next);
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn join_list<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    items
        .into_iter()
        .map(|item| escape(item, LIST_SPECIALS))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Split on unescaped `delimiter`, unescaping and trimming each item.
fn split_escaped(value: &str, delimiter: char) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next_if(|n| ESCAPABLE.contains(n)) {
                current.push(next);
                continue;
            }
        }
        if c == delimiter {
            items.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    items.push(current);
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Build the tree from parsed lines and restore secondary links.
fn assemble(
    lines: Vec<ParsedLine>,
    header: Option<CategorySchema>,
    warnings: &mut Vec<Warning>,
) -> Mindmap {
    let has_header = header.is_some();
    let mut schema = header.unwrap_or_default();
    let mut stack: Vec<MindmapNode> = vec![MindmapNode::root()];
    let mut links: Vec<Vec<String>> = Vec::with_capacity(lines.len());
    let mut source_files: Vec<String> = Vec::new();

    for line in lines {
        let mut node = MindmapNode::new(line.title);
        for tag in line.tags {
            node.add_tag(tag);
        }
        match line.sources {
            Some(sources) if !sources.is_empty() => {
                for source in sources {
                    if source != UNATTRIBUTED && !source_files.contains(&source) {
                        source_files.push(source.clone());
                    }
                    node.add_source(source);
                }
            }
            _ => {
                warning::push(
                    warnings,
                    Warning::MissingSources {
                        line: line.line,
                        title: node.title.clone(),
                    },
                );
                node.add_source(UNATTRIBUTED);
            }
        }
        if line.depth == 1 {
            let category = line.category.unwrap_or_else(|| node.title.clone());
            let (category, added) = schema.ensure(&category);
            if added && has_header {
                warning::push(
                    warnings,
                    Warning::CategoryAdded {
                        category: category.clone(),
                    },
                );
            }
            node.category = Some(category);
        }
        links.push(line.also);

        let depth = line.depth as usize;
        while stack.len() > depth {
            collapse_top(&mut stack);
        }
        stack.push(node);
    }
    while stack.len() > 1 {
        collapse_top(&mut stack);
    }

    let mut mindmap = Mindmap::new(schema);
    if let Some(root) = stack.pop() {
        mindmap.root = root;
    }
    mindmap.source_files = source_files;
    mindmap.renumber();
    restore_links(&mut mindmap, links, warnings);
    mindmap
}

fn collapse_top(stack: &mut Vec<MindmapNode>) {
    if let Some(child) = stack.pop() {
        if let Some(parent) = stack.last_mut() {
            parent.children.push(child);
        }
    }
}

/// Resolve `[ALSO: title]` annotations, first match by title wins.
///
/// `links[i]` holds the annotations of the i-th node in pre-order.
fn restore_links(mindmap: &mut Mindmap, links: Vec<Vec<String>>, warnings: &mut Vec<Warning>) {
    let order: Vec<(String, String)> = mindmap
        .nodes()
        .into_iter()
        .map(|n| (n.id.clone(), n.title.clone()))
        .collect();
    let ancestry = Ancestry::new(mindmap);

    let mut resolved = Vec::new();
    for (i, targets) in links.into_iter().enumerate() {
        let Some((id, title)) = order.get(i) else { continue };
        for target in targets {
            let found = order
                .iter()
                .enumerate()
                .find(|(j, (_, t))| *j != i && *t == target)
                .map(|(_, (target_id, _))| target_id.clone());
            let reason = match &found {
                None => Some("no node with that title"),
                Some(target_id) if ancestry.excludes(id, target_id) => {
                    Some("target is an ancestor or descendant")
                }
                Some(_) => None,
            };
            match (found, reason) {
                (Some(target_id), None) => resolved.push((id.clone(), target_id)),
                (_, reason) => warning::push(
                    warnings,
                    Warning::DroppedAnnotation {
                        title: title.clone(),
                        target,
                        reason: reason.unwrap_or_default().to_string(),
                    },
                ),
            }
        }
    }

    for (from, to) in resolved {
        if let Some(node) = mindmap.root.find_mut(&from) {
            node.secondary_parents.insert(to);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MindmapError;
    use pretty_assertions::assert_eq;

    fn sample() -> Mindmap {
        let mut map = Mindmap::new(CategorySchema::new(["Frontend", "Backend", "Ops"]));
        map.root.children.push(
            MindmapNode::category("Frontend")
                .with_source("ui.md")
                .with_child(
                    MindmapNode::new("State Management")
                        .with_tag("state")
                        .with_tag("frontend/react")
                        .with_source("ui.md")
                        .with_child(MindmapNode::new("Stores").with_source("ui.md")),
                ),
        );
        let mut backend = MindmapNode::category("Backend")
            .with_source("api.md")
            .with_child(
                MindmapNode::new("State Management")
                    .with_source("api.md")
                    .with_source("db.md"),
            );
        backend.title = "Server Side".to_string();
        map.root.children.push(backend);
        map.renumber();
        map.root
            .find_mut("0.0")
            .unwrap()
            .secondary_parents
            .insert("1.0".to_string());
        map
    }

    #[test]
    fn test_render_format() {
        let text = OutlineSerializer::new().render(&sample());
        let expected = "\
<!-- categories: Frontend | Backend | Ops -->
# Frontend {sources: ui.md}
  - State Management {tags: frontend/react, state} {sources: ui.md} [ALSO: State Management]
    - Stores {sources: ui.md}
# Server Side {category: Backend} {sources: api.md}
  - State Management {sources: api.md, db.md}
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_round_trip() {
        let map = sample();
        let serializer = OutlineSerializer::new();
        let parsed = serializer.parse(&serializer.render(&map)).unwrap();

        assert!(parsed.warnings.is_empty(), "{:?}", parsed.warnings);
        assert_eq!(parsed.mindmap.root, map.root);
        assert_eq!(parsed.mindmap.category_schema, map.category_schema);
        assert_eq!(
            parsed.mindmap.source_files,
            vec!["ui.md".to_string(), "api.md".to_string(), "db.md".to_string()]
        );
    }

    #[test]
    fn test_marker_depends_only_on_depth() {
        let text = OutlineSerializer::new()
            .with_schema_header(false)
            .render(&sample());
        for line in text.lines() {
            let spaces = line.len() - line.trim_start().len();
            let depth = if spaces == 0 { 1 } else { spaces / INDENT_WIDTH + 1 };
            let marker = marker_for_depth(depth as u32);
            assert!(line.trim_start().starts_with(marker), "{line}");
        }
        assert_eq!(marker_for_depth(1), "#");
        assert_eq!(marker_for_depth(2), "-");
        assert_eq!(marker_for_depth(7), "-");
    }

    #[test]
    fn test_parse_without_header_derives_schema() {
        let text = "# Economic {sources: a.md}\n  - Market Shift {sources: a.md}\n# Social {sources: b.md}\n";
        let parsed = OutlineSerializer::new().parse(text).unwrap();
        assert_eq!(
            parsed.mindmap.category_schema.names(),
            &["Economic".to_string(), "Social".to_string()]
        );
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn test_parse_drops_unknown_and_invalid_annotations() {
        let text = "\
# Tech {sources: a.md}
  - AI {sources: a.md} [ALSO: Nowhere] [ALSO: Tech]
    - Deep {sources: a.md} [ALSO: AI]
";
        let parsed = OutlineSerializer::new().parse(text).unwrap();
        assert!(parsed.mindmap.secondary_links().is_empty());
        let dropped = parsed
            .warnings
            .iter()
            .filter(|w| matches!(w, Warning::DroppedAnnotation { .. }))
            .count();
        assert_eq!(dropped, 3);
    }

    #[test]
    fn test_parse_first_title_match_wins() {
        let text = "\
# A {sources: s}
  - Dup {sources: s}
  - Other {sources: s} [ALSO: Dup]
# B {sources: s}
  - Dup {sources: s}
";
        let parsed = OutlineSerializer::new().parse(text).unwrap();
        assert_eq!(
            parsed.mindmap.secondary_links(),
            vec![("0.1".to_string(), "0.0".to_string())]
        );
    }

    #[test]
    fn test_parse_missing_sources_marks_unattributed() {
        let parsed = OutlineSerializer::new().parse("# Ideas\n  - Loose thought\n").unwrap();
        let node = parsed.mindmap.node("0.0").unwrap();
        assert_eq!(node.source_refs, vec![UNATTRIBUTED.to_string()]);
        assert_eq!(parsed.warnings.len(), 2);
    }

    #[test]
    fn test_parse_errors() {
        let serializer = OutlineSerializer::new();
        let cases = [
            ("  - Orphan\n", ParseError::OrphanBullet { line: 1 }),
            ("- Flat\n", ParseError::OrphanBullet { line: 1 }),
            ("  # Indented\n", ParseError::IndentedHeading { line: 1 }),
            ("# A\n   - Odd\n", ParseError::OddIndentation { line: 2, spaces: 3 }),
            (
                "# A\n\n      - Too deep\n",
                ParseError::UnbalancedIndentation {
                    line: 3,
                    depth: 4,
                    previous: 1,
                },
            ),
            ("# A\nplain text\n", ParseError::UnrecognizedLine { line: 2 }),
        ];
        for (text, expected) in cases {
            match serializer.parse(text) {
                Err(MindmapError::Parse(err)) => assert_eq!(err, expected, "{text:?}"),
                other => panic!("expected parse error for {text:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_annotation_pattern_compiles() {
        assert!(ANNOTATION.is_match("Title {sources: a.md}"));
        assert!(ANNOTATION.is_match("Title [ALSO: Arrays \\[1\\]]"));
        assert!(!ANNOTATION.is_match("Arrays \\[1\\]"));
    }

    #[test]
    fn test_markup_characters_are_escaped() {
        let mut map = Mindmap::new(CategorySchema::new(["Front|End", "Back"]));
        map.root.children.push(
            MindmapNode::category("Front|End")
                .with_source("a.md")
                .with_child(
                    MindmapNode::new("Arrays [1]")
                        .with_tag("data, structures")
                        .with_source("notes/q1, draft.md"),
                ),
        );
        map.root.children.push(
            MindmapNode::category("Back")
                .with_source("b.md")
                .with_child(MindmapNode::new("Arrays [1]").with_source("b.md")),
        );
        map.renumber();
        map.root
            .find_mut("0.0")
            .unwrap()
            .secondary_parents
            .insert("1.0".to_string());

        let serializer = OutlineSerializer::new();
        let text = serializer.render(&map);
        let expected = r"<!-- categories: Front\|End | Back -->
# Front|End {sources: a.md}
  - Arrays \[1\] {tags: data\, structures} {sources: notes/q1\, draft.md} [ALSO: Arrays \[1\]]
# Back {sources: b.md}
  - Arrays \[1\] {sources: b.md}
";
        assert_eq!(text, expected);

        let parsed = serializer.parse(&text).unwrap();
        assert!(parsed.warnings.is_empty(), "{:?}", parsed.warnings);
        assert_eq!(parsed.mindmap.root, map.root);
        assert_eq!(parsed.mindmap.category_schema, map.category_schema);
        assert_eq!(
            parsed.mindmap.node("0.0").unwrap().source_refs,
            vec!["notes/q1, draft.md".to_string()]
        );
    }

    #[test]
    fn test_escape_helpers() {
        assert_eq!(escape(r"C:\{x}", TEXT_SPECIALS), r"C:\\\{x\}");
        assert_eq!(unescape(r"C:\\\{x\}"), r"C:\{x}");
        assert_eq!(unescape(r"keep\n"), r"keep\n");
        assert_eq!(
            split_escaped(r"a\, b, c ,, ", ','),
            vec!["a, b".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn test_empty_title_round_trips() {
        let mut map = Mindmap::new(CategorySchema::new(["Tech"]));
        map.root.children.push(
            MindmapNode::category("Tech")
                .with_source("a.md")
                .with_child(MindmapNode::new("").with_source("a.md")),
        );
        map.renumber();
        let serializer = OutlineSerializer::new();
        let parsed = serializer.parse(&serializer.render(&map)).unwrap();
        assert_eq!(parsed.mindmap.root, map.root);
    }
}
