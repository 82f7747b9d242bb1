//! Structured document tree nodes.

use serde::Serialize;

use crate::markdown::MdNode;

/// Identity of a node inside one editor, stable across transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeKey(pub(crate) u64);

impl NodeKey {
    /// The key every editor's root node carries.
    pub const ROOT: Self = Self(0);
}

/// Name under which a node kind is registered with an editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NodeKind(pub &'static str);

impl NodeKind {
    pub const ROOT: Self = Self("root");
    pub const PARAGRAPH: Self = Self("paragraph");
    pub const TEXT: Self = Self("text");
    pub const LINE_BREAK: Self = Self("linebreak");
    pub const HEADING: Self = Self("heading");
    pub const QUOTE: Self = Self("quote");
    pub const LIST: Self = Self("list");
    pub const LIST_ITEM: Self = Self("listitem");
    pub const LINK: Self = Self("link");
    pub const IMAGE: Self = Self("image");
    pub const CODE_BLOCK: Self = Self("codeblock");
    pub const HORIZONTAL_RULE: Self = Self("horizontalrule");
    pub const TABLE: Self = Self("table");
    pub const DIRECTIVE: Self = Self("directive");
    pub const FRONTMATTER: Self = Self("frontmatter");
    pub const GENERIC_HTML: Self = Self("generic-html");

    pub const fn name(self) -> &'static str {
        self.0
    }
}

/// Inline formatting carried by text nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct TextFormat {
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    pub code: bool,
}

/// A single toggleable format, as dispatched by the format command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatKind {
    Bold,
    Italic,
    Strikethrough,
    Code,
}

impl TextFormat {
    pub const fn has(self, kind: FormatKind) -> bool {
        match kind {
            FormatKind::Bold => self.bold,
            FormatKind::Italic => self.italic,
            FormatKind::Strikethrough => self.strikethrough,
            FormatKind::Code => self.code,
        }
    }

    #[must_use]
    pub const fn with(mut self, kind: FormatKind, on: bool) -> Self {
        match kind {
            FormatKind::Bold => self.bold = on,
            FormatKind::Italic => self.italic = on,
            FormatKind::Strikethrough => self.strikethrough = on,
            FormatKind::Code => self.code = on,
        }
        self
    }

    pub const fn is_plain(self) -> bool {
        !(self.bold || self.italic || self.strikethrough || self.code)
    }
}

/// Payload of a structured tree node.
///
/// Decorator-style constructs (tables, directives) keep their markdown tree
/// verbatim; their editing UI works on it directly.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum NodeData {
    Root,
    Paragraph,
    Text { text: String, format: TextFormat },
    LineBreak,
    Heading { level: u8 },
    Quote,
    List { ordered: bool, start: u64, tight: bool },
    ListItem { checked: Option<bool> },
    Link { url: String, title: Option<String> },
    Image { src: String, alt: String, title: Option<String> },
    CodeBlock { language: String, meta: String, code: String },
    HorizontalRule,
    Table(MdNode),
    Directive(MdNode),
    Frontmatter { yaml: String },
    GenericHtml {
        tag: String,
        attributes: Vec<(String, Option<String>)>,
        flow: bool,
    },
}

impl NodeData {
    pub const fn kind(&self) -> NodeKind {
        match self {
            Self::Root => NodeKind::ROOT,
            Self::Paragraph => NodeKind::PARAGRAPH,
            Self::Text { .. } => NodeKind::TEXT,
            Self::LineBreak => NodeKind::LINE_BREAK,
            Self::Heading { .. } => NodeKind::HEADING,
            Self::Quote => NodeKind::QUOTE,
            Self::List { .. } => NodeKind::LIST,
            Self::ListItem { .. } => NodeKind::LIST_ITEM,
            Self::Link { .. } => NodeKind::LINK,
            Self::Image { .. } => NodeKind::IMAGE,
            Self::CodeBlock { .. } => NodeKind::CODE_BLOCK,
            Self::HorizontalRule => NodeKind::HORIZONTAL_RULE,
            Self::Table(_) => NodeKind::TABLE,
            Self::Directive(_) => NodeKind::DIRECTIVE,
            Self::Frontmatter { .. } => NodeKind::FRONTMATTER,
            Self::GenericHtml { .. } => NodeKind::GENERIC_HTML,
        }
    }

    /// Element nodes may hold children; everything else is a leaf.
    pub const fn is_element(&self) -> bool {
        matches!(
            self,
            Self::Root
                | Self::Paragraph
                | Self::Heading { .. }
                | Self::Quote
                | Self::List { .. }
                | Self::ListItem { .. }
                | Self::Link { .. }
                | Self::GenericHtml { .. }
        )
    }

    /// Phrasing content, which lives inside a block rather than at the root.
    pub fn is_inline(&self) -> bool {
        match self {
            Self::Text { .. } | Self::LineBreak | Self::Link { .. } | Self::Image { .. } => true,
            Self::GenericHtml { flow, .. } => !flow,
            Self::Directive(md) => md.is_inline(),
            _ => false,
        }
    }

    /// Blocks that must not be split or reformatted by block-type changes.
    pub const fn is_decorator(&self) -> bool {
        matches!(
            self,
            Self::CodeBlock { .. }
                | Self::HorizontalRule
                | Self::Table(_)
                | Self::Directive(_)
                | Self::Frontmatter { .. }
        )
    }
}

/// A node of the structured tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    key: NodeKey,
    #[serde(flatten)]
    pub data: NodeData,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl Node {
    pub(crate) const fn new(key: NodeKey, data: NodeData) -> Self {
        Self {
            key,
            data,
            children: Vec::new(),
        }
    }

    pub(crate) const fn root() -> Self {
        Self::new(NodeKey::ROOT, NodeData::Root)
    }

    pub const fn key(&self) -> NodeKey {
        self.key
    }

    pub const fn kind(&self) -> NodeKind {
        self.data.kind()
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match &self.data {
            NodeData::Text { text, .. } => out.push_str(text),
            NodeData::LineBreak => out.push('\n'),
            _ => {
                for child in &self.children {
                    child.collect_text(out);
                }
            }
        }
    }

    /// Find a descendant (or self) by key.
    pub fn find(&self, key: NodeKey) -> Option<&Self> {
        if self.key == key {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(key))
    }

    pub(crate) fn find_mut(&mut self, key: NodeKey) -> Option<&mut Self> {
        if self.key == key {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| child.find_mut(key))
    }

    /// Depth-first visit of self and every descendant.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Self)) {
        f(self);
        for child in &self.children {
            child.walk(f);
        }
    }

    pub(crate) fn walk_mut(&mut self, f: &mut impl FnMut(&mut Self)) {
        f(self);
        for child in &mut self.children {
            child.walk_mut(f);
        }
    }

    /// Structural equality that ignores node keys.
    pub fn same_shape(&self, other: &Self) -> bool {
        self.data == other.data
            && self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(&other.children)
                .all(|(a, b)| a.same_shape(b))
    }
}

/// A caret position inside a text node (or at an element boundary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Point {
    pub key: NodeKey,
    pub offset: usize,
}

/// The discrete text selection of one editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RangeSelection {
    pub anchor: Point,
    pub focus: Point,
}

impl RangeSelection {
    pub const fn collapsed(point: Point) -> Self {
        Self {
            anchor: point,
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(key: u64, s: &str) -> Node {
        Node::new(
            NodeKey(key),
            NodeData::Text {
                text: s.to_string(),
                format: TextFormat::default(),
            },
        )
    }

    #[test]
    fn test_text_content_joins_descendants() {
        let mut para = Node::new(NodeKey(1), NodeData::Paragraph);
        para.children.push(text(2, "Hello "));
        para.children.push(Node::new(NodeKey(3), NodeData::LineBreak));
        para.children.push(text(4, "world"));
        assert_eq!(para.text_content(), "Hello \nworld");
    }

    #[test]
    fn test_same_shape_ignores_keys() {
        let mut a = Node::new(NodeKey(1), NodeData::Paragraph);
        a.children.push(text(2, "x"));
        let mut b = Node::new(NodeKey(10), NodeData::Paragraph);
        b.children.push(text(20, "x"));
        assert!(a.same_shape(&b));
        b.children.push(text(21, "y"));
        assert!(!a.same_shape(&b));
    }

    #[test]
    fn test_format_toggle_roundtrips() {
        let format = TextFormat::default().with(FormatKind::Bold, true);
        assert!(format.has(FormatKind::Bold));
        assert!(!format.is_plain());
        assert!(format.with(FormatKind::Bold, false).is_plain());
    }

    #[test]
    fn test_decorators_are_leaves() {
        assert!(!NodeData::HorizontalRule.is_element());
        assert!(NodeData::HorizontalRule.is_decorator());
        assert!(NodeData::Quote.is_element());
    }
}
