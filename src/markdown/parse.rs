//! Markdown text to markdown tree.
//!
//! Blocks claimed by syntax extensions are cut out first; the text between
//! them goes through comrak. Link reference definitions are collected from
//! the whole document and given to every chunk. The comrak tree is then
//! reshaped into [`MdNode`]s and handed to the tree extensions in order.

use comrak::nodes::{AstNode, ListType, NodeValue, TableAlignment};
use comrak::{Arena, Options, parse_document};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ParseError;

use super::ast::{Align, MdKind, MdNode, Position};
use super::syntax::{FenceTracker, SyntaxExtension, TreeExtension};

const FRONTMATTER_DELIMITER: &str = "---";

static REFERENCE_DEFINITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^ {0,3}\[(?:[^\]\\]|\\.)+\]:[ \t]*(?:<[^>\n]*>|\S+)(?:[ \t]+(?:"[^"]*"|'[^']*'|\([^)]*\)))?[ \t]*$"#,
    )
    .unwrap()
});

static DIRECTIVE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^:{2,}").unwrap());

/// Parse markdown into a markdown tree.
///
/// # Errors
/// Returns an error if an extension rejects a construct.
pub fn parse_markdown(
    source: &str,
    syntax: &[&'static dyn SyntaxExtension],
    tree: &[&'static dyn TreeExtension],
) -> Result<MdNode, ParseError> {
    let lines: Vec<&str> = source.split_inclusive('\n').collect();
    let definitions = reference_definitions(&lines);
    let chunks = Chunks {
        lines: &lines,
        syntax,
        definitions: &definitions,
    };
    let children = chunks.blocks(0, lines.len())?;
    let mut root = MdNode::with_children(MdKind::Root, children);
    root.position = Some(Position {
        start_line: 1,
        end_line: lines.len().max(1),
    });
    for extension in tree {
        tracing::trace!(extension = extension.name(), "tree extension");
        extension.transform(&mut root)?;
    }
    Ok(root)
}

/// Document-wide inputs shared by every comrak chunk.
struct Chunks<'a> {
    lines: &'a [&'a str],
    syntax: &'a [&'static dyn SyntaxExtension],
    definitions: &'a str,
}

impl Chunks<'_> {
    fn blocks(&self, start: usize, end: usize) -> Result<Vec<MdNode>, ParseError> {
        let region = &self.lines[..end];
        let mut nodes = Vec::new();
        let mut fence = FenceTracker::default();
        let mut chunk_start = start;
        let mut index = start;
        while index < end {
            if fence.feed(region[index]) {
                index += 1;
                continue;
            }
            let mut claim = None;
            for extension in self.syntax {
                if let Some(found) = extension.claim_block(region, index)? {
                    claim = Some(found);
                    break;
                }
            }
            let Some(claim) = claim else {
                index += 1;
                continue;
            };
            nodes.extend(self.chunk(chunk_start, index));
            let mut node = claim.node;
            node.position = Some(Position {
                start_line: index + 1,
                end_line: claim.end.max(index + 1),
            });
            if let Some(body) = claim.body {
                node.children = self.blocks(body.start, body.end)?;
            }
            nodes.push(node);
            index = claim.end.max(index + 1);
            chunk_start = index;
        }
        nodes.extend(self.chunk(chunk_start, end));
        Ok(nodes)
    }

    /// Run comrak over `lines[start..end]`, shifting positions back into
    /// document coordinates.
    fn chunk(&self, start: usize, end: usize) -> Vec<MdNode> {
        if start >= end {
            return Vec::new();
        }
        let mut text: String = self.lines[start..end].concat();
        if text.trim().is_empty() {
            return Vec::new();
        }
        if !self.definitions.is_empty() && !ends_inside_fence(&self.lines[start..end]) {
            text.push_str("\n\n");
            text.push_str(self.definitions);
        }
        let arena = Arena::new();
        let options = create_options(self.syntax, start == 0);
        let root = parse_document(&arena, &text, &options);
        root.children().map(|child| convert(child, start)).collect()
    }
}

/// Every link reference definition outside code fences, in document order.
/// A definition cannot interrupt a paragraph, so it must follow a blank
/// line, another definition or a directive fence.
fn reference_definitions(lines: &[&str]) -> String {
    let mut fence = FenceTracker::default();
    let mut definitions = String::new();
    let mut can_start = true;
    for line in lines {
        if fence.feed(line) {
            can_start = true;
            continue;
        }
        let content = line.trim_end_matches(['\n', '\r']);
        if can_start && REFERENCE_DEFINITION.is_match(content) {
            definitions.push_str(content.trim_start());
            definitions.push('\n');
            continue;
        }
        can_start = content.trim().is_empty() || DIRECTIVE_FENCE.is_match(content.trim_start());
    }
    definitions
}

fn ends_inside_fence(lines: &[&str]) -> bool {
    let mut fence = FenceTracker::default();
    for line in lines {
        fence.feed(line);
    }
    fence.is_open()
}

fn create_options(syntax: &[&'static dyn SyntaxExtension], document_start: bool) -> Options {
    let mut options = Options::default();
    for extension in syntax {
        extension.configure(&mut options.extension);
    }
    if !document_start {
        options.extension.front_matter_delimiter = None;
    }
    options
}

fn convert<'a>(node: &'a AstNode<'a>, offset: usize) -> MdNode {
    let ast = node.data.borrow();
    let position = Some(Position {
        start_line: ast.sourcepos.start.line + offset,
        end_line: ast.sourcepos.end.line.max(ast.sourcepos.start.line) + offset,
    });
    let kind = match &ast.value {
        NodeValue::Paragraph => MdKind::Paragraph,
        NodeValue::Heading(heading) => MdKind::Heading {
            depth: heading.level,
        },
        NodeValue::BlockQuote => MdKind::Blockquote,
        NodeValue::List(list) => MdKind::List {
            ordered: list.list_type == ListType::Ordered,
            start: (list.list_type == ListType::Ordered).then(|| u64::try_from(list.start).unwrap_or(1)),
            spread: !list.tight,
        },
        NodeValue::Item(_) => MdKind::ListItem {
            checked: None,
            spread: false,
        },
        NodeValue::TaskItem(symbol) => MdKind::ListItem {
            checked: Some(symbol.is_some()),
            spread: false,
        },
        NodeValue::ThematicBreak => MdKind::ThematicBreak,
        NodeValue::CodeBlock(code) => {
            let info = code.info.trim();
            let (lang, meta) = info
                .split_once(char::is_whitespace)
                .map_or((info, ""), |(lang, meta)| (lang, meta.trim()));
            let mut value = code.literal.clone();
            if value.ends_with('\n') {
                value.pop();
            }
            MdKind::Code {
                lang: (!lang.is_empty()).then(|| lang.to_string()),
                meta: (!meta.is_empty()).then(|| meta.to_string()),
                value,
            }
        }
        NodeValue::HtmlBlock(html) => MdKind::Html {
            value: html.literal.clone(),
        },
        NodeValue::HtmlInline(raw) => MdKind::Html { value: raw.clone() },
        NodeValue::Text(text) => MdKind::Text {
            value: text.clone(),
        },
        NodeValue::SoftBreak => MdKind::Text {
            value: "\n".to_string(),
        },
        NodeValue::LineBreak => MdKind::Break,
        NodeValue::Code(code) => MdKind::InlineCode {
            value: code.literal.clone(),
        },
        NodeValue::Emph => MdKind::Emphasis,
        NodeValue::Strong => MdKind::Strong,
        NodeValue::Strikethrough => MdKind::Delete,
        NodeValue::Link(link) => MdKind::Link {
            url: link.url.clone(),
            title: (!link.title.is_empty()).then(|| link.title.clone()),
        },
        NodeValue::Image(image) => MdKind::Image {
            url: image.url.clone(),
            title: (!image.title.is_empty()).then(|| image.title.clone()),
            alt: node.children().map(plain_text).collect(),
        },
        NodeValue::Table(table) => MdKind::Table {
            align: table.alignments.iter().map(|a| convert_align(*a)).collect(),
        },
        NodeValue::TableRow(_) => MdKind::TableRow,
        NodeValue::TableCell => MdKind::TableCell,
        NodeValue::FrontMatter(raw) => MdKind::Yaml {
            value: strip_frontmatter(raw),
        },
        other => MdKind::Other {
            name: format!("{other:?}")
                .split(['(', ' ', '{'])
                .next()
                .unwrap_or_default()
                .to_string(),
        },
    };
    drop(ast);

    let mut md = MdNode::new(kind);
    md.position = position;
    if !matches!(md.kind, MdKind::Image { .. }) {
        for child in node.children() {
            push_merged(&mut md.children, convert(child, offset));
        }
    }
    if let MdKind::List { spread, .. } = md.kind {
        for item in &mut md.children {
            if let MdKind::ListItem { spread: item_spread, .. } = &mut item.kind {
                *item_spread = spread;
            }
        }
    }
    md
}

/// Append, merging adjacent text runs (soft breaks arrive as their own node).
fn push_merged(children: &mut Vec<MdNode>, node: MdNode) {
    if let (
        Some(MdNode {
            kind: MdKind::Text { value: previous },
            position: previous_position,
            ..
        }),
        MdKind::Text { value },
    ) = (children.last_mut(), &node.kind)
    {
        previous.push_str(value);
        if let (Some(p), Some(n)) = (previous_position.as_mut(), node.position) {
            p.end_line = p.end_line.max(n.end_line);
        }
        return;
    }
    children.push(node);
}

fn plain_text<'a>(node: &'a AstNode<'a>) -> String {
    match &node.data.borrow().value {
        NodeValue::Text(text) => text.clone(),
        NodeValue::Code(code) => code.literal.clone(),
        NodeValue::SoftBreak | NodeValue::LineBreak => " ".to_string(),
        _ => node.children().map(plain_text).collect(),
    }
}

const fn convert_align(align: TableAlignment) -> Align {
    match align {
        TableAlignment::None => Align::None,
        TableAlignment::Left => Align::Left,
        TableAlignment::Center => Align::Center,
        TableAlignment::Right => Align::Right,
    }
}

fn strip_frontmatter(raw: &str) -> String {
    let body = raw.trim_end();
    let body = body
        .strip_prefix(FRONTMATTER_DELIMITER)
        .unwrap_or(body)
        .trim_start_matches(['\r', '\n']);
    let body = body.strip_suffix(FRONTMATTER_DELIMITER).unwrap_or(body);
    body.trim_end_matches(['\r', '\n']).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::directive::DIRECTIVE_SYNTAX;
    use crate::markdown::syntax::ComrakSyntax;

    static TABLES: ComrakSyntax = ComrakSyntax::new("table", |options| options.table = true);
    static FRONTMATTER: ComrakSyntax = ComrakSyntax::new("frontmatter", |options| {
        options.front_matter_delimiter = Some("---".to_string());
    });

    fn parse(source: &str) -> MdNode {
        parse_markdown(source, &[&DIRECTIVE_SYNTAX, &TABLES, &FRONTMATTER], &[]).unwrap()
    }

    #[test]
    fn test_paragraph_soft_breaks_merge_into_one_text() {
        let root = parse("Hello\nworld\n");
        let para = &root.children[0];
        assert_eq!(para.children.len(), 1);
        assert_eq!(para.text_content(), "Hello\nworld");
    }

    #[test]
    fn test_heading_and_emphasis() {
        let root = parse("# Title *it*\n");
        assert_eq!(root.children[0].kind, MdKind::Heading { depth: 1 });
        assert_eq!(root.children[0].children[1].kind, MdKind::Emphasis);
    }

    #[test]
    fn test_directive_positions_are_document_lines() {
        let root = parse("Intro\n\n:::note\nInside\n:::\n\nOutro\n");
        assert_eq!(root.children.len(), 3);
        let directive = &root.children[1];
        assert_eq!(directive.type_name(), "containerDirective");
        assert_eq!(directive.position.unwrap().start_line, 3);
        assert_eq!(directive.children[0].position.unwrap().start_line, 4);
        assert_eq!(root.children[2].position.unwrap().start_line, 7);
    }

    #[test]
    fn test_directive_inside_code_fence_is_code() {
        let root = parse("```\n:::note\n```\n");
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].type_name(), "code");
    }

    #[test]
    fn test_task_items_and_tight_lists() {
        let root = parse("- [x] done\n- [ ] todo\n");
        let list = &root.children[0];
        assert!(matches!(list.kind, MdKind::List { spread: false, .. }));
        assert_eq!(
            list.children[0].kind,
            MdKind::ListItem {
                checked: Some(true),
                spread: false
            }
        );
    }

    #[test]
    fn test_frontmatter_only_at_document_start() {
        let root = parse("---\ntitle: x\n---\n\n# Body\n");
        assert_eq!(
            root.children[0].kind,
            MdKind::Yaml {
                value: "title: x".to_string()
            }
        );
    }

    #[test]
    fn test_code_block_language_and_meta() {
        let root = parse("```rust title=\"a.rs\"\nfn main() {}\n```\n");
        assert_eq!(
            root.children[0].kind,
            MdKind::Code {
                lang: Some("rust".to_string()),
                meta: Some("title=\"a.rs\"".to_string()),
                value: "fn main() {}".to_string(),
            }
        );
    }

    #[test]
    fn test_table_alignment() {
        let root = parse("| a | b |\n|:--|--:|\n| 1 | 2 |\n");
        assert_eq!(
            root.children[0].kind,
            MdKind::Table {
                align: vec![Align::Left, Align::Right]
            }
        );
        assert_eq!(root.children[0].children.len(), 2);
    }

    #[test]
    fn test_reference_links_resolve_across_directive_blocks() {
        let root = parse("See [docs][r].\n\n::note\n\n[r]: http://example.com \"Docs\"\n");
        assert_eq!(root.children.len(), 2);
        let link = &root.children[0].children[1];
        assert_eq!(
            link.kind,
            MdKind::Link {
                url: "http://example.com".to_string(),
                title: Some("Docs".to_string()),
            }
        );
        assert_eq!(link.text_content(), "docs");
    }

    #[test]
    fn test_definitions_inside_fences_or_paragraphs_are_not_shared() {
        let root = parse("```\n[a]: http://a.test\n```\n\ntext\n[b]: http://b.test\n\n::note\n\n[a] [b]\n");
        let last = root.children.last().unwrap();
        assert_eq!(last.type_name(), "paragraph");
        assert!(last.children.iter().all(|n| !matches!(n.kind, MdKind::Link { .. })));
    }

    #[test]
    fn test_reference_definitions_collection() {
        let lines: Vec<&str> = "[a]: /x\n[b]: </y z>\nbody\n[c]: /no\n"
            .split_inclusive('\n')
            .collect();
        assert_eq!(reference_definitions(&lines), "[a]: /x\n[b]: </y z>\n");
    }
}
