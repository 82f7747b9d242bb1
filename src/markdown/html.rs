//! Raw HTML to element nodes.
//!
//! Block HTML becomes flow elements and inline tag pairs become text
//! elements wrapping the phrasing content between them. Comments and
//! unbalanced tags are rejected, the way an MDX parser rejects them.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ParseError;

use super::ast::{DirectiveKind, MdKind, MdNode};
use super::syntax::TreeExtension;

static OPEN_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^<([A-Za-z][\w.:-]*)((?:\s+[^\s"'>/=]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'=<>`]+))?)*)\s*(/?)>"#)
        .unwrap()
});

static CLOSE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^</([A-Za-z][\w.:-]*)\s*>").unwrap());

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([^\s"'>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#).unwrap()
});

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name.to_ascii_lowercase().as_str())
}

pub struct HtmlElements;

pub static HTML_ELEMENTS: HtmlElements = HtmlElements;

impl TreeExtension for HtmlElements {
    fn name(&self) -> &'static str {
        "html-elements"
    }

    fn transform(&self, root: &mut MdNode) -> Result<(), ParseError> {
        transform_node(root)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Open {
        name: String,
        attributes: Vec<(String, Option<String>)>,
        self_closing: bool,
    },
    Close {
        name: String,
    },
    Comment,
    Text(String),
}

fn tokenize(raw: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut text = String::new();
    let mut rest = raw;
    while let Some(lt) = rest.find('<') {
        text.push_str(&rest[..lt]);
        rest = &rest[lt..];
        let token = if rest.starts_with("<!") {
            let end = rest.find('>').map_or(rest.len(), |i| i + 1);
            let end = if rest.starts_with("<!--") {
                rest.find("-->").map_or(rest.len(), |i| i + 3)
            } else {
                end
            };
            rest = &rest[end..];
            Some(Token::Comment)
        } else if let Some(caps) = CLOSE_TAG.captures(rest) {
            let len = caps[0].len();
            let name = caps[1].to_string();
            rest = &rest[len..];
            Some(Token::Close { name })
        } else if let Some(caps) = OPEN_TAG.captures(rest) {
            let len = caps[0].len();
            let token = Token::Open {
                name: caps[1].to_string(),
                attributes: parse_attributes(&caps[2]),
                self_closing: !caps[3].is_empty(),
            };
            rest = &rest[len..];
            Some(token)
        } else {
            text.push('<');
            rest = &rest[1..];
            None
        };
        if let Some(token) = token {
            if !text.is_empty() {
                tokens.push(Token::Text(std::mem::take(&mut text)));
            }
            tokens.push(token);
        }
    }
    text.push_str(rest);
    if !text.is_empty() {
        tokens.push(Token::Text(text));
    }
    tokens
}

fn parse_attributes(raw: &str) -> Vec<(String, Option<String>)> {
    ATTRIBUTE
        .captures_iter(raw)
        .map(|caps| {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str().to_string());
            (caps[1].to_string(), value)
        })
        .collect()
}

fn comment_error(line: usize) -> ParseError {
    ParseError::new(
        "Unexpected character `!` (U+0021) before name, expected a character that can start a name, such as a letter, `$`, or `_` (note: to create a comment in MDX, use `{/* text */}`)",
        line,
    )
}

fn element(name: String, attributes: Vec<(String, Option<String>)>, flow: bool) -> MdNode {
    MdNode::new(MdKind::JsxElement {
        name,
        attributes,
        flow,
    })
}

const fn holds_blocks(kind: &MdKind) -> bool {
    matches!(
        kind,
        MdKind::Root
            | MdKind::Blockquote
            | MdKind::ListItem { .. }
            | MdKind::Directive {
                directive: DirectiveKind::Container,
                ..
            }
    )
}

fn transform_node(node: &mut MdNode) -> Result<(), ParseError> {
    let line = node.position.map_or(1, |p| p.start_line);
    let children = std::mem::take(&mut node.children);
    let mut children = if holds_blocks(&node.kind) {
        flow_children(children)?
    } else {
        inline_children(children, line)?
    };
    for child in &mut children {
        transform_node(child)?;
    }
    node.children = children;
    Ok(())
}

fn flow_children(children: Vec<MdNode>) -> Result<Vec<MdNode>, ParseError> {
    let mut out = Vec::with_capacity(children.len());
    for child in children {
        if let MdKind::Html { value } = &child.kind {
            let line = child.position.map_or(1, |p| p.start_line);
            out.extend(flow_elements(value, line)?);
        } else {
            out.push(child);
        }
    }
    Ok(out)
}

fn flow_elements(raw: &str, line: usize) -> Result<Vec<MdNode>, ParseError> {
    let mut out: Vec<MdNode> = Vec::new();
    let mut stack: Vec<MdNode> = Vec::new();
    for token in tokenize(raw) {
        match token {
            Token::Comment => return Err(comment_error(line)),
            Token::Open {
                name,
                attributes,
                self_closing,
            } => {
                let void = self_closing || is_void_element(&name);
                let node = element(name, attributes, stack.is_empty());
                if void {
                    push_to(&mut stack, &mut out, node);
                } else {
                    stack.push(node);
                }
            }
            Token::Close { name } => {
                let Some(open) = stack.pop() else {
                    return Err(ParseError::new(
                        format!("Unexpected closing slash `/` in tag, expected an open tag first `</{name}>`"),
                        line,
                    ));
                };
                if let MdKind::JsxElement { name: open_name, .. } = &open.kind {
                    if *open_name != name {
                        return Err(ParseError::new(
                            format!("Unexpected closing tag `</{name}>`, expected corresponding closing tag for `<{open_name}>`"),
                            line,
                        ));
                    }
                }
                push_to(&mut stack, &mut out, open);
            }
            Token::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if stack.is_empty() {
                    out.push(MdNode::with_children(
                        MdKind::Paragraph,
                        vec![MdNode::text(trimmed)],
                    ));
                } else {
                    push_to(&mut stack, &mut out, MdNode::text(trimmed));
                }
            }
        }
    }
    if let Some(MdNode {
        kind: MdKind::JsxElement { name, .. },
        ..
    }) = stack.last()
    {
        return Err(ParseError::new(
            format!("Expected a closing tag for `<{name}>` before the end of `paragraph`"),
            line,
        ));
    }
    Ok(out)
}

fn push_to(stack: &mut [MdNode], out: &mut Vec<MdNode>, node: MdNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => out.push(node),
    }
}

/// The single tag an inline HTML node holds, if that is all it holds.
fn single_tag(node: &MdNode) -> Option<Token> {
    let MdKind::Html { value } = &node.kind else {
        return None;
    };
    let mut tokens = tokenize(value);
    if tokens.len() == 1 { tokens.pop() } else { None }
}

fn inline_children(children: Vec<MdNode>, line: usize) -> Result<Vec<MdNode>, ParseError> {
    let mut out = Vec::with_capacity(children.len());
    let mut iter = children.into_iter();
    let mut pending: Vec<MdNode> = Vec::new();
    while let Some(child) = iter.next() {
        let Some(token) = single_tag(&child) else {
            out.push(child);
            continue;
        };
        match token {
            Token::Comment => return Err(comment_error(line)),
            Token::Close { name } => {
                return Err(ParseError::new(
                    format!("Unexpected closing slash `/` in tag, expected an open tag first `</{name}>`"),
                    line,
                ));
            }
            Token::Open {
                name,
                attributes,
                self_closing,
            } => {
                if self_closing || is_void_element(&name) {
                    out.push(element(name, attributes, false));
                    continue;
                }
                let mut depth = 0usize;
                let mut closed = false;
                for next in iter.by_ref() {
                    match single_tag(&next) {
                        Some(Token::Open {
                            name: inner,
                            self_closing: false,
                            ..
                        }) if inner == name => depth += 1,
                        Some(Token::Close { name: inner }) if inner == name => {
                            if depth == 0 {
                                closed = true;
                                break;
                            }
                            depth -= 1;
                        }
                        _ => {}
                    }
                    pending.push(next);
                }
                if !closed {
                    return Err(ParseError::new(
                        format!("Expected a closing tag for `<{name}>` before the end of `paragraph`"),
                        line,
                    ));
                }
                let mut node = element(name, attributes, false);
                node.children = std::mem::take(&mut pending);
                out.push(node);
            }
            Token::Text(_) => out.push(child),
        }
    }
    Ok(out)
}
