//! The markdown tree: an mdast-shaped intermediate used only while parsing
//! and serializing.

use serde::{Deserialize, Serialize};

/// Source lines a node was parsed from (one-based, inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub start_line: usize,
    pub end_line: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    None,
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectiveKind {
    Leaf,
    Container,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MdKind {
    Root,
    Paragraph,
    Heading {
        depth: u8,
    },
    Blockquote,
    List {
        ordered: bool,
        start: Option<u64>,
        spread: bool,
    },
    ListItem {
        checked: Option<bool>,
        spread: bool,
    },
    ThematicBreak,
    Code {
        lang: Option<String>,
        meta: Option<String>,
        value: String,
    },
    Html {
        value: String,
    },
    Text {
        value: String,
    },
    Emphasis,
    Strong,
    Delete,
    InlineCode {
        value: String,
    },
    Break,
    Link {
        url: String,
        title: Option<String>,
    },
    Image {
        url: String,
        title: Option<String>,
        alt: String,
    },
    Table {
        align: Vec<Align>,
    },
    TableRow,
    TableCell,
    Yaml {
        value: String,
    },
    Directive {
        directive: DirectiveKind,
        name: String,
        attributes: Vec<(String, String)>,
    },
    JsxElement {
        name: String,
        attributes: Vec<(String, Option<String>)>,
        flow: bool,
    },
    /// A construct the parser produced but this tree has no shape for.
    Other {
        name: String,
    },
}

/// A node of the markdown tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MdNode {
    #[serde(flatten)]
    pub kind: MdKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MdNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl MdNode {
    pub const fn new(kind: MdKind) -> Self {
        Self {
            kind,
            children: Vec::new(),
            position: None,
        }
    }

    pub const fn with_children(kind: MdKind, children: Vec<Self>) -> Self {
        Self {
            kind,
            children,
            position: None,
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::new(MdKind::Text {
            value: value.into(),
        })
    }

    /// The mdast type name, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            MdKind::Root => "root",
            MdKind::Paragraph => "paragraph",
            MdKind::Heading { .. } => "heading",
            MdKind::Blockquote => "blockquote",
            MdKind::List { .. } => "list",
            MdKind::ListItem { .. } => "listItem",
            MdKind::ThematicBreak => "thematicBreak",
            MdKind::Code { .. } => "code",
            MdKind::Html { .. } => "html",
            MdKind::Text { .. } => "text",
            MdKind::Emphasis => "emphasis",
            MdKind::Strong => "strong",
            MdKind::Delete => "delete",
            MdKind::InlineCode { .. } => "inlineCode",
            MdKind::Break => "break",
            MdKind::Link { .. } => "link",
            MdKind::Image { .. } => "image",
            MdKind::Table { .. } => "table",
            MdKind::TableRow => "tableRow",
            MdKind::TableCell => "tableCell",
            MdKind::Yaml { .. } => "yaml",
            MdKind::Directive { directive, .. } => match directive {
                DirectiveKind::Leaf => "leafDirective",
                DirectiveKind::Container => "containerDirective",
                DirectiveKind::Text => "textDirective",
            },
            MdKind::JsxElement { flow: true, .. } => "mdxJsxFlowElement",
            MdKind::JsxElement { flow: false, .. } => "mdxJsxTextElement",
            MdKind::Other { .. } => "unknown",
        }
    }

    /// Whether the node is phrasing content (lives inside a paragraph).
    pub const fn is_inline(&self) -> bool {
        matches!(
            self.kind,
            MdKind::Text { .. }
                | MdKind::Emphasis
                | MdKind::Strong
                | MdKind::Delete
                | MdKind::InlineCode { .. }
                | MdKind::Break
                | MdKind::Link { .. }
                | MdKind::Image { .. }
                | MdKind::JsxElement { flow: false, .. }
                | MdKind::Directive {
                    directive: DirectiveKind::Text,
                    ..
                }
        )
    }

    /// Concatenated text of all descendant text-like nodes.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match &self.kind {
            MdKind::Text { value } | MdKind::InlineCode { value } => out.push_str(value),
            MdKind::Break => out.push('\n'),
            _ => {
                for child in &self.children {
                    child.collect_text(out);
                }
            }
        }
    }

    /// A copy with every position stripped, for storing inside the
    /// structured tree where source lines are meaningless.
    #[must_use]
    pub fn without_positions(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            children: self.children.iter().map(Self::without_positions).collect(),
            position: None,
        }
    }
}
