//! Position-carrying YAML document model with comment-preserving patches.
//!
//! `yamlgraft` parses a YAML document once into an owned node tree in
//! which every node knows its 1-based line/column position, its byte
//! span, and (for scalars) its resolved value and presentation style.
//! Consumers walk the tree to build their own typed models and record
//! symbolic [`Route`]s back into it; [`patch`] operations later resolve
//! those routes against the current document text and splice in edits
//! without disturbing comments, key order, or the quoting style of
//! untouched spans.
//!
//! Anchors, aliases, and tags are rejected: the CI workflow dialect this
//! crate exists to serve does not permit them.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

use line_index::LineIndex;
use tree_sitter::{Language, Node as TsNode, Parser};

pub mod patch;

pub use patch::{Anchor, Op, Patch, apply_patch, apply_patches};

/// Errors produced while loading or editing a document.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The tree-sitter backend couldn't accept the YAML grammar.
    #[error("malformed or unsupported tree-sitter grammar")]
    InvalidLanguage(#[from] tree_sitter::LanguageError),
    /// The input is not valid YAML at all (no recoverable structure).
    #[error("input is not valid YAML")]
    InvalidInput,
    /// A patch operation could not be applied.
    #[error("invalid patch: {0}")]
    InvalidPatch(String),
    /// A value could not be serialized into the document.
    #[error("YAML serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),
}

/// A 1-based line/column position within a document.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    /// 1-based line number.
    pub line: usize,
    /// 1-based column number.
    pub col: usize,
}

impl Position {
    /// Constructs a position from 1-based coordinates.
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }

    fn from_ts(point: tree_sitter::Point) -> Self {
        Self {
            line: point.row + 1,
            col: point.column + 1,
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// A single component of a [`Route`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Component {
    /// A mapping key.
    Key(String),
    /// A sequence index.
    Index(usize),
}

impl From<&str> for Component {
    fn from(value: &str) -> Self {
        Self::Key(value.to_string())
    }
}

impl From<String> for Component {
    fn from(value: String) -> Self {
        Self::Key(value)
    }
}

impl From<usize> for Component {
    fn from(value: usize) -> Self {
        Self::Index(value)
    }
}

/// A symbolic path from the document root down to a node.
///
/// Routes are the document handles that outlive re-parses: they identify
/// a node by the keys and indices leading to it rather than by byte
/// offsets, so a route recorded during analysis still resolves after
/// earlier patches have shifted the text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Route {
    components: Vec<Component>,
}

impl Route {
    /// An empty route, i.e. the document's top-level node.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new route with `key` appended.
    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut components = self.components.clone();
        components.push(Component::Key(key.into()));
        Self { components }
    }

    /// Returns a new route with `index` appended.
    pub fn index(&self, index: usize) -> Self {
        let mut components = self.components.clone();
        components.push(Component::Index(index));
        Self { components }
    }

    /// Returns the route for this route's parent, or `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        if self.components.is_empty() {
            return None;
        }

        let mut components = self.components.clone();
        components.pop();
        Some(Self { components })
    }

    /// Whether this route addresses the document's top-level node.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// The route's components, root-first.
    pub fn components(&self) -> &[Component] {
        &self.components
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for component in &self.components {
            match component {
                Component::Key(key) => write!(f, "/{key}")?,
                Component::Index(idx) => write!(f, "/{idx}")?,
            }
        }
        Ok(())
    }
}

/// Presentation style of a scalar in the source text.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScalarStyle {
    /// An unquoted scalar.
    Plain,
    /// A `'single quoted'` scalar.
    SingleQuoted,
    /// A `"double quoted"` scalar.
    DoubleQuoted,
    /// A `|` literal block scalar.
    Literal,
    /// A `>` folded block scalar.
    Folded,
}

impl ScalarStyle {
    /// Whether the scalar was quoted in the source.
    pub fn is_quoted(&self) -> bool {
        matches!(self, Self::SingleQuoted | Self::DoubleQuoted)
    }

    /// Whether the scalar is a `|` literal block.
    pub fn is_literal_block(&self) -> bool {
        matches!(self, Self::Literal)
    }
}

/// A scalar's resolved value, per the YAML 1.2 core schema.
#[derive(Clone, Debug, PartialEq)]
pub enum ScalarValue {
    /// `null`, `~`, or an empty plain scalar.
    Null,
    /// `true` or `false`.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// A float.
    Float(f64),
    /// Everything else, including all quoted and block scalars.
    Str(String),
}

impl ScalarValue {
    /// The value as a string, using YAML's stringification for
    /// non-string scalars.
    pub fn to_string_lossy(&self) -> String {
        match self {
            ScalarValue::Null => String::new(),
            ScalarValue::Bool(b) => b.to_string(),
            ScalarValue::Int(i) => i.to_string(),
            ScalarValue::Float(f) => f.to_string(),
            ScalarValue::Str(s) => s.clone(),
        }
    }
}

/// A scalar node.
#[derive(Clone, Debug)]
pub struct Scalar {
    /// The resolved value.
    pub value: ScalarValue,
    /// The presentation style.
    pub style: ScalarStyle,
    /// The raw source text of the scalar, including quotes or the
    /// block header.
    pub raw: String,
}

/// A single `key: value` entry within a mapping node.
#[derive(Clone, Debug)]
pub struct Entry {
    /// The key, unquoted.
    pub key: String,
    /// The key's position.
    pub key_pos: Position,
    /// The key's byte span.
    pub key_span: (usize, usize),
    /// The entry's value. `None` models an absent value (`key:`).
    pub value: Option<YamlNode>,
    /// The byte span of the whole entry (key through value).
    pub entry_span: (usize, usize),
}

/// The kind-specific payload of a node.
#[derive(Clone, Debug)]
pub enum NodeKind {
    /// A scalar.
    Scalar(Scalar),
    /// A mapping, entries in source order.
    Mapping(Vec<Entry>),
    /// A sequence, items in source order.
    Sequence(Vec<YamlNode>),
}

/// An owned node in the parsed document tree.
#[derive(Clone, Debug)]
pub struct YamlNode {
    /// The node's payload.
    pub kind: NodeKind,
    /// The node's position.
    pub pos: Position,
    /// The node's byte span within the source.
    pub span: (usize, usize),
    /// Whether the node was written in flow (`{…}`/`[…]`) style.
    pub flow: bool,
}

impl YamlNode {
    /// The node as a scalar, if it is one.
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match &self.kind {
            NodeKind::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// The node's mapping entries, if it is a mapping.
    pub fn as_mapping(&self) -> Option<&[Entry]> {
        match &self.kind {
            NodeKind::Mapping(entries) => Some(entries),
            _ => None,
        }
    }

    /// The node's sequence items, if it is a sequence.
    pub fn as_sequence(&self) -> Option<&[YamlNode]> {
        match &self.kind {
            NodeKind::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Looks up a mapping entry by key.
    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.as_mapping()?.iter().find(|e| e.key == key)
    }

    /// A short human-readable name for the node's kind.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Scalar(_) => "scalar",
            NodeKind::Mapping(_) => "mapping",
            NodeKind::Sequence(_) => "sequence",
        }
    }
}

/// A structural problem encountered while loading the tree.
///
/// These are recoverable: the offending subtree is dropped and the rest
/// of the document remains usable.
#[derive(Clone, Debug)]
pub struct LoadError {
    /// Where the problem is.
    pub pos: Position,
    /// What the problem is.
    pub message: String,
}

/// A parsed, owned YAML document.
pub struct Document {
    source: String,
    line_index: LineIndex,
    root: Option<YamlNode>,
    errors: Vec<LoadError>,
}

impl Document {
    /// Parses `source` into a document.
    ///
    /// Returns `Err(Error::InvalidInput)` only when the text yields no
    /// usable structure at all; lesser structural problems are recorded
    /// in [`Document::load_errors`] and the affected subtrees dropped.
    pub fn parse(source: impl Into<String>) -> Result<Self, Error> {
        let source = source.into();

        let mut parser = Parser::new();
        let language: Language = tree_sitter_yaml::LANGUAGE.into();
        parser.set_language(&language)?;

        // NOTE: Infallible, assuming `language` is correctly constructed above.
        let tree = parser.parse(&source, None).ok_or(Error::InvalidInput)?;

        let mut builder = TreeBuilder {
            source: &source,
            errors: vec![],
        };

        let root = builder.document_root(tree.root_node());

        if root.is_none() && tree.root_node().has_error() {
            return Err(Error::InvalidInput);
        }

        if tree.root_node().has_error() {
            builder.errors.push(LoadError {
                pos: Position::new(1, 1),
                message: "document contains invalid YAML syntax".into(),
            });
        }

        let errors = builder.errors;
        let line_index = LineIndex::new(&source);

        Ok(Self {
            source,
            line_index,
            root,
            errors,
        })
    }

    /// The original source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// A [`LineIndex`] over the source text.
    pub fn line_index(&self) -> &LineIndex {
        &self.line_index
    }

    /// The document's top-level node, if any.
    pub fn root(&self) -> Option<&YamlNode> {
        self.root.as_ref()
    }

    /// Structural problems recorded while loading.
    pub fn load_errors(&self) -> &[LoadError] {
        &self.errors
    }

    /// Resolves a route to the node it addresses.
    pub fn resolve(&self, route: &Route) -> Option<&YamlNode> {
        let mut node = self.root()?;
        for component in route.components() {
            match component {
                Component::Key(key) => {
                    node = node.get(key)?.value.as_ref()?;
                }
                Component::Index(idx) => {
                    node = node.as_sequence()?.get(*idx)?;
                }
            }
        }
        Some(node)
    }

    /// Resolves a route whose final component is a key to the mapping
    /// [`Entry`] it addresses (rather than the entry's value).
    pub fn resolve_entry(&self, route: &Route) -> Option<&Entry> {
        let (last, init) = route.components().split_last()?;
        let Component::Key(key) = last else {
            return None;
        };

        let parent = self.resolve(&Route {
            components: init.to_vec(),
        })?;
        parent.get(key)
    }

    /// Extracts the source text for `span`.
    pub fn extract(&self, span: (usize, usize)) -> &str {
        &self.source[span.0..span.1]
    }

    /// Returns the byte range of the full line containing `offset`.
    pub(crate) fn line_span(&self, offset: usize) -> std::ops::Range<usize> {
        let pos = line_index::TextSize::new(offset as u32);
        let line_col = self.line_index.line_col(pos);
        match self.line_index.line(line_col.line) {
            Some(range) => range.into(),
            None => offset..offset,
        }
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("root", &self.root.as_ref().map(|r| r.kind_name()))
            .field("errors", &self.errors.len())
            .finish()
    }
}

struct TreeBuilder<'src> {
    source: &'src str,
    errors: Vec<LoadError>,
}

impl TreeBuilder<'_> {
    fn error(&mut self, node: TsNode<'_>, message: impl Into<String>) {
        self.errors.push(LoadError {
            pos: Position::from_ts(node.start_position()),
            message: message.into(),
        });
    }

    fn text(&self, node: TsNode<'_>) -> &str {
        // Infallible: the source is UTF-8 and spans come from its parse.
        node.utf8_text(self.source.as_bytes()).unwrap_or_default()
    }

    /// Finds the top-level value node of the first document in the stream.
    fn document_root(&mut self, stream: TsNode<'_>) -> Option<YamlNode> {
        let mut cursor = stream.walk();
        let document = stream
            .named_children(&mut cursor)
            .find(|c| c.kind() == "document")?;

        let value = document
            .named_children(&mut cursor)
            .find(|c| matches!(c.kind(), "block_node" | "flow_node"))?;

        self.build(value)
    }

    /// Builds an owned node from a `block_node`/`flow_node` wrapper or
    /// from a bare content node.
    fn build(&mut self, node: TsNode<'_>) -> Option<YamlNode> {
        let content = if matches!(node.kind(), "block_node" | "flow_node") {
            let mut cursor = node.walk();
            let children: Vec<_> = node.named_children(&mut cursor).collect();
            if let Some(anchor) = children.iter().find(|c| c.kind() == "anchor") {
                self.error(*anchor, "anchors are not supported in workflow files");
            }
            children
                .into_iter()
                .find(|c| !matches!(c.kind(), "comment" | "anchor" | "tag" | "yaml_directive"))?
        } else {
            node
        };

        match content.kind() {
            "block_mapping" | "flow_mapping" => self.build_mapping(content),
            "block_sequence" | "flow_sequence" => self.build_sequence(content),
            "plain_scalar" | "single_quote_scalar" | "double_quote_scalar" | "block_scalar" => {
                self.build_scalar(content)
            }
            "alias" => {
                self.error(content, "aliases are not supported in workflow files");
                None
            }
            "anchor" => {
                self.error(content, "anchors are not supported in workflow files");
                None
            }
            other => {
                self.error(content, format!("unexpected YAML node \"{other}\""));
                None
            }
        }
    }

    fn build_mapping(&mut self, node: TsNode<'_>) -> Option<YamlNode> {
        let flow = node.kind() == "flow_mapping";
        let mut entries = vec![];
        let mut cursor = node.walk();

        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "block_mapping_pair" | "flow_pair" => {
                    if let Some(entry) = self.build_entry(child) {
                        entries.push(entry);
                    }
                }
                // `{ foo }`: a bare key with no value.
                "flow_node" => {
                    if let Some(scalar_node) = self.build(child)
                        && let Some(scalar) = scalar_node.as_scalar()
                    {
                        entries.push(Entry {
                            key: scalar.value.to_string_lossy(),
                            key_pos: scalar_node.pos,
                            key_span: scalar_node.span,
                            value: None,
                            entry_span: scalar_node.span,
                        });
                    }
                }
                "comment" => {}
                other => {
                    self.error(child, format!("unexpected node \"{other}\" in mapping"));
                }
            }
        }

        Some(YamlNode {
            kind: NodeKind::Mapping(entries),
            pos: Position::from_ts(node.start_position()),
            span: (node.start_byte(), node.end_byte()),
            flow,
        })
    }

    fn build_entry(&mut self, pair: TsNode<'_>) -> Option<Entry> {
        let Some(key_node) = pair.child_by_field_name("key") else {
            self.error(pair, "mapping entry is missing a key");
            return None;
        };

        let key_scalar = self.build(key_node)?;
        let Some(scalar) = key_scalar.as_scalar() else {
            self.error(key_node, "mapping keys must be scalars");
            return None;
        };
        let key = scalar.value.to_string_lossy();

        let value = pair
            .child_by_field_name("value")
            .and_then(|value_node| self.build(value_node));

        let entry_end = match &value {
            Some(v) => v.span.1,
            None => key_scalar.span.1,
        };

        Some(Entry {
            key,
            key_pos: key_scalar.pos,
            key_span: key_scalar.span,
            value,
            entry_span: (key_scalar.span.0, entry_end),
        })
    }

    fn build_sequence(&mut self, node: TsNode<'_>) -> Option<YamlNode> {
        let flow = node.kind() == "flow_sequence";
        let mut items = vec![];
        let mut cursor = node.walk();

        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "block_sequence_item" => {
                    let mut inner_cursor = child.walk();
                    let inner = child
                        .named_children(&mut inner_cursor)
                        .find(|c| matches!(c.kind(), "block_node" | "flow_node"));
                    match inner {
                        Some(inner) => {
                            if let Some(item) = self.build(inner) {
                                items.push(item);
                            }
                        }
                        // A bare `-` is an explicit null item.
                        None => items.push(YamlNode {
                            kind: NodeKind::Scalar(Scalar {
                                value: ScalarValue::Null,
                                style: ScalarStyle::Plain,
                                raw: String::new(),
                            }),
                            pos: Position::from_ts(child.start_position()),
                            span: (child.start_byte(), child.end_byte()),
                            flow: false,
                        }),
                    }
                }
                "flow_node" => {
                    if let Some(item) = self.build(child) {
                        items.push(item);
                    }
                }
                "comment" => {}
                other => {
                    self.error(child, format!("unexpected node \"{other}\" in sequence"));
                }
            }
        }

        Some(YamlNode {
            kind: NodeKind::Sequence(items),
            pos: Position::from_ts(node.start_position()),
            span: (node.start_byte(), node.end_byte()),
            flow,
        })
    }

    fn build_scalar(&mut self, node: TsNode<'_>) -> Option<YamlNode> {
        let raw = self.text(node).to_string();

        let (value, style) = match node.kind() {
            "plain_scalar" => (resolve_plain(raw.trim_end()), ScalarStyle::Plain),
            "single_quote_scalar" => (
                ScalarValue::Str(unquote_single(&raw)),
                ScalarStyle::SingleQuoted,
            ),
            "double_quote_scalar" => (
                ScalarValue::Str(unquote_double(&raw)),
                ScalarStyle::DoubleQuoted,
            ),
            "block_scalar" => {
                let (value, style) = resolve_block_scalar(&raw);
                (ScalarValue::Str(value), style)
            }
            _ => return None,
        };

        Some(YamlNode {
            kind: NodeKind::Scalar(Scalar { value, style, raw }),
            pos: Position::from_ts(node.start_position()),
            span: (node.start_byte(), node.end_byte()),
            flow: false,
        })
    }
}

/// Resolves a plain scalar per the YAML 1.2 core schema.
fn resolve_plain(raw: &str) -> ScalarValue {
    match raw {
        "" | "~" | "null" | "Null" | "NULL" => return ScalarValue::Null,
        "true" | "True" | "TRUE" => return ScalarValue::Bool(true),
        "false" | "False" | "FALSE" => return ScalarValue::Bool(false),
        ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" => {
            return ScalarValue::Float(f64::INFINITY);
        }
        "-.inf" | "-.Inf" | "-.INF" => return ScalarValue::Float(f64::NEG_INFINITY),
        ".nan" | ".NaN" | ".NAN" => return ScalarValue::Float(f64::NAN),
        _ => {}
    }

    if let Some(hex) = raw.strip_prefix("0x")
        && let Ok(i) = i64::from_str_radix(hex, 16)
    {
        return ScalarValue::Int(i);
    }

    if let Some(octal) = raw.strip_prefix("0o")
        && let Ok(i) = i64::from_str_radix(octal, 8)
    {
        return ScalarValue::Int(i);
    }

    if let Ok(i) = raw.parse::<i64>() {
        return ScalarValue::Int(i);
    }

    // Floats must look like numbers: `parse::<f64>` would also accept
    // forms like `infinity` that YAML treats as strings.
    if raw
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
        && raw.bytes().any(|b| b.is_ascii_digit())
        && let Ok(f) = raw.parse::<f64>()
    {
        return ScalarValue::Float(f);
    }

    ScalarValue::Str(raw.to_string())
}

fn unquote_single(raw: &str) -> String {
    let inner = raw
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(raw);
    inner.replace("''", "'")
}

fn unquote_double(raw: &str) -> String {
    let inner = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw);

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('u') => {
                let code: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&code, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&code);
                    }
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Resolves a `|`/`>` block scalar, handling the indentation and
/// chomping indicators in its header.
fn resolve_block_scalar(raw: &str) -> (String, ScalarStyle) {
    let mut lines = raw.lines();
    let header = lines.next().unwrap_or_default();
    let style = if header.starts_with('>') {
        ScalarStyle::Folded
    } else {
        ScalarStyle::Literal
    };

    let chomp = if header.contains('-') {
        Chomp::Strip
    } else if header.contains('+') {
        Chomp::Keep
    } else {
        Chomp::Clip
    };

    let body: Vec<&str> = lines.collect();

    // The node's text carries each continuation line with its full
    // source indentation, so the content indentation is simply that of
    // the first non-empty line. (An explicit indentation indicator in
    // the header is relative to the parent and is subsumed by this.)
    let indent = body
        .iter()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start_matches(' ').len())
        .unwrap_or(0);

    let stripped: Vec<&str> = body
        .iter()
        .map(|line| {
            if line.len() >= indent {
                &line[indent..]
            } else {
                line.trim_start_matches(' ')
            }
        })
        .collect();

    let mut value = match style {
        ScalarStyle::Folded => fold_lines(&stripped),
        _ => stripped.join("\n"),
    };

    match chomp {
        Chomp::Strip => {
            while value.ends_with('\n') {
                value.pop();
            }
        }
        Chomp::Clip => {
            while value.ends_with('\n') {
                value.pop();
            }
            if !value.is_empty() {
                value.push('\n');
            }
        }
        Chomp::Keep => {
            if !value.ends_with('\n') && !value.is_empty() {
                value.push('\n');
            }
        }
    }

    (value, style)
}

enum Chomp {
    Strip,
    Clip,
    Keep,
}

/// Folds `>`-style lines: adjacent non-empty lines join with a space,
/// blank lines become newlines.
fn fold_lines(lines: &[&str]) -> String {
    let mut out = String::new();
    let mut prev_nonempty = false;

    for line in lines {
        if line.trim().is_empty() {
            out.push('\n');
            prev_nonempty = false;
        } else {
            if prev_nonempty {
                out.push(' ');
            }
            out.push_str(line);
            prev_nonempty = true;
        }
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_positions() {
        let doc = Document::parse("foo: bar\nbaz:\n  - 1\n  - 2\n").unwrap();
        let root = doc.root().unwrap();

        let foo = root.get("foo").unwrap();
        assert_eq!(foo.key_pos, Position::new(1, 1));
        let value = foo.value.as_ref().unwrap();
        assert_eq!(value.pos, Position::new(1, 6));
        assert_eq!(
            value.as_scalar().unwrap().value,
            ScalarValue::Str("bar".into())
        );

        let baz = root.get("baz").unwrap().value.as_ref().unwrap();
        let items = baz.as_sequence().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_scalar().unwrap().value, ScalarValue::Int(1));
        assert_eq!(items[1].pos, Position::new(4, 5));
    }

    #[test]
    fn test_parse_scalar_styles() {
        let doc = Document::parse(
            "plain: hello\nsingle: 'it''s'\ndouble: \"a\\nb\"\nliteral: |\n  line one\n  line two\nfolded: >\n  joined\n  text\n",
        )
        .unwrap();
        let root = doc.root().unwrap();

        let get = |key: &str| {
            root.get(key)
                .unwrap()
                .value
                .as_ref()
                .unwrap()
                .as_scalar()
                .unwrap()
                .clone()
        };

        assert_eq!(get("plain").style, ScalarStyle::Plain);
        let single = get("single");
        assert_eq!(single.style, ScalarStyle::SingleQuoted);
        assert_eq!(single.value, ScalarValue::Str("it's".into()));
        let double = get("double");
        assert_eq!(double.style, ScalarStyle::DoubleQuoted);
        assert_eq!(double.value, ScalarValue::Str("a\nb".into()));
        let literal = get("literal");
        assert_eq!(literal.style, ScalarStyle::Literal);
        assert_eq!(literal.value, ScalarValue::Str("line one\nline two\n".into()));
        let folded = get("folded");
        assert_eq!(folded.style, ScalarStyle::Folded);
        assert_eq!(folded.value, ScalarValue::Str("joined text\n".into()));
    }

    #[test]
    fn test_parse_core_schema() {
        let doc =
            Document::parse("a: 42\nb: 4.5\nc: true\nd: null\ne: ~\nf: 0x1f\ng: hello\n").unwrap();
        let root = doc.root().unwrap();

        let value = |key: &str| {
            root.get(key)
                .unwrap()
                .value
                .as_ref()
                .unwrap()
                .as_scalar()
                .unwrap()
                .value
                .clone()
        };

        assert_eq!(value("a"), ScalarValue::Int(42));
        assert_eq!(value("b"), ScalarValue::Float(4.5));
        assert_eq!(value("c"), ScalarValue::Bool(true));
        assert_eq!(value("d"), ScalarValue::Null);
        assert_eq!(value("e"), ScalarValue::Null);
        assert_eq!(value("f"), ScalarValue::Int(31));
        assert_eq!(value("g"), ScalarValue::Str("hello".into()));
    }

    #[test]
    fn test_resolve_route() {
        let doc = Document::parse("jobs:\n  build:\n    steps:\n      - run: make\n").unwrap();

        let route = Route::new()
            .key("jobs")
            .key("build")
            .key("steps")
            .index(0)
            .key("run");
        let node = doc.resolve(&route).unwrap();
        assert_eq!(
            node.as_scalar().unwrap().value,
            ScalarValue::Str("make".into())
        );

        assert!(doc.resolve(&Route::new().key("nope")).is_none());
    }

    #[test]
    fn test_absent_value() {
        let doc = Document::parse("foo:\nbar: 1\n").unwrap();
        let root = doc.root().unwrap();

        assert!(root.get("foo").unwrap().value.is_none());
        assert!(root.get("bar").unwrap().value.is_some());
    }

    #[test]
    fn test_flow_styles() {
        let doc = Document::parse("map: { a: 1, b: 2 }\nseq: [x, y]\n").unwrap();
        let root = doc.root().unwrap();

        let map = root.get("map").unwrap().value.as_ref().unwrap();
        assert!(map.flow);
        assert_eq!(map.as_mapping().unwrap().len(), 2);

        let seq = root.get("seq").unwrap().value.as_ref().unwrap();
        assert!(seq.flow);
        assert_eq!(seq.as_sequence().unwrap().len(), 2);
    }

    #[test]
    fn test_anchors_are_load_errors() {
        let doc = Document::parse("base: &ref 1\nother: *ref\n").unwrap();
        assert!(!doc.load_errors().is_empty());
    }

    #[test]
    fn test_garbage_is_diagnosed() {
        match Document::parse("foo: [unclosed\n") {
            Err(Error::InvalidInput) => {}
            Ok(doc) => assert!(!doc.load_errors().is_empty()),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
}
