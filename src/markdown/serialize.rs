//! Markdown tree to markdown text.

use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthChar;

use crate::error::SerializeError;

use super::ast::{MdKind, MdNode};
use super::html::is_void_element;

/// Output formatting switches, mirroring the usual markdown stringifier knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToMarkdownOptions {
    /// Unordered list marker: `*`, `-` or `+`.
    pub bullet: char,
    /// Ordered list delimiter: `.` or `)`.
    pub bullet_ordered: char,
    /// `*` or `_`.
    pub emphasis: char,
    /// `*` or `_`.
    pub strong: char,
    /// Thematic break character: `*`, `-` or `_`.
    pub rule: char,
    pub rule_repetition: usize,
    /// Code fence character: `` ` `` or `~`.
    pub fence: char,
    /// Number ordered items upward from the list start instead of repeating it.
    pub increment_list_marker: bool,
    /// Soft-wrap paragraphs at this display width.
    pub line_width: Option<usize>,
}

impl Default for ToMarkdownOptions {
    fn default() -> Self {
        Self {
            bullet: '*',
            bullet_ordered: '.',
            emphasis: '*',
            strong: '*',
            rule: '*',
            rule_repetition: 3,
            fence: '`',
            increment_list_marker: true,
            line_width: None,
        }
    }
}

impl ToMarkdownOptions {
    /// Check every marker is one the markdown grammar accepts.
    ///
    /// # Errors
    /// Names the first invalid option.
    pub fn validate(&self) -> Result<(), String> {
        let checks: [(&str, char, &[char]); 6] = [
            ("bullet", self.bullet, &['*', '-', '+']),
            ("bullet-ordered", self.bullet_ordered, &['.', ')']),
            ("emphasis", self.emphasis, &['*', '_']),
            ("strong", self.strong, &['*', '_']),
            ("rule", self.rule, &['*', '-', '_']),
            ("fence", self.fence, &['`', '~']),
        ];
        for (name, value, allowed) in checks {
            if !allowed.contains(&value) {
                return Err(format!("invalid {name} marker `{value}`"));
            }
        }
        if self.rule_repetition < 3 {
            return Err(format!(
                "rule repetition must be at least 3, got {}",
                self.rule_repetition
            ));
        }
        Ok(())
    }
}

/// Renders markdown tree nodes the built-in serializer has no rule for.
pub trait ToMarkdownExtension {
    fn name(&self) -> &'static str;

    fn handles(&self, node: &MdNode) -> bool;

    /// Render `node` without a trailing newline. Block content may recurse
    /// through `serializer`.
    ///
    /// # Errors
    /// Propagates failures of nested rendering.
    fn render(&self, node: &MdNode, serializer: &Serializer<'_>) -> Result<String, SerializeError>;
}

pub struct Serializer<'a> {
    options: &'a ToMarkdownOptions,
    extensions: &'a [&'static dyn ToMarkdownExtension],
}

impl<'a> Serializer<'a> {
    pub const fn new(
        options: &'a ToMarkdownOptions,
        extensions: &'a [&'static dyn ToMarkdownExtension],
    ) -> Self {
        Self {
            options,
            extensions,
        }
    }

    pub const fn options(&self) -> &ToMarkdownOptions {
        self.options
    }

    /// Serialize a whole document. Non-empty output ends with a newline.
    ///
    /// # Errors
    /// A node nothing knows how to render.
    pub fn serialize(&self, root: &MdNode) -> Result<String, SerializeError> {
        let mut out = self.blocks(&root.children)?;
        if !out.is_empty() {
            out.push('\n');
        }
        Ok(out)
    }

    fn extension_for(&self, node: &MdNode) -> Option<&'static dyn ToMarkdownExtension> {
        self.extensions.iter().copied().find(|ext| ext.handles(node))
    }

    /// Render sibling blocks separated by blank lines.
    ///
    /// # Errors
    /// As [`Self::serialize`].
    pub fn blocks(&self, children: &[MdNode]) -> Result<String, SerializeError> {
        let mut parts = Vec::with_capacity(children.len());
        let mut previous_list: Option<bool> = None;
        let mut alternate = false;
        for child in children {
            let rendered = if let MdKind::List { ordered, .. } = child.kind {
                // Adjacent lists with the same marker would merge.
                alternate = previous_list == Some(ordered) && !alternate;
                previous_list = Some(ordered);
                self.list(child, alternate)?
            } else {
                previous_list = None;
                alternate = false;
                self.block(child)?
            };
            parts.push(rendered);
        }
        Ok(parts.join("\n\n"))
    }

    /// Render one block node.
    ///
    /// # Errors
    /// As [`Self::serialize`].
    pub fn block(&self, node: &MdNode) -> Result<String, SerializeError> {
        if let Some(extension) = self.extension_for(node) {
            return extension.render(node, self);
        }
        match &node.kind {
            MdKind::Paragraph => {
                let text = self.inline(&node.children)?;
                let text = match self.options.line_width {
                    Some(width) => wrap(&text, width),
                    None => text,
                };
                Ok(escape_line_starts(&text))
            }
            MdKind::Heading { depth } => {
                let text = self.inline(&node.children)?.replace('\n', " ");
                let text = escape_closing_hashes(&text);
                let hashes = "#".repeat(usize::from((*depth).clamp(1, 6)));
                if text.is_empty() {
                    Ok(hashes)
                } else {
                    Ok(format!("{hashes} {text}"))
                }
            }
            MdKind::Blockquote => {
                let inner = self.blocks(&node.children)?;
                Ok(prefix_lines(&inner, "> ", ">"))
            }
            MdKind::List { .. } => self.list(node, false),
            MdKind::ThematicBreak => Ok(self
                .options
                .rule
                .to_string()
                .repeat(self.options.rule_repetition.max(3))),
            MdKind::Code { lang, meta, value } => Ok(self.code(
                lang.as_deref(),
                meta.as_deref(),
                value,
            )),
            MdKind::Html { value } => Ok(value.trim_end().to_string()),
            MdKind::JsxElement { .. } => self.jsx(node),
            _ if node.is_inline() => self.inline(std::slice::from_ref(node)),
            _ => Err(SerializeError::UnhandledNode {
                kind: node.type_name(),
            }),
        }
    }

    fn list(&self, node: &MdNode, alternate: bool) -> Result<String, SerializeError> {
        let MdKind::List {
            ordered,
            start,
            spread,
        } = &node.kind
        else {
            return self.block(node);
        };
        let bullet = if alternate {
            other_marker(self.options.bullet, &['*', '-'])
        } else {
            self.options.bullet
        };
        let delimiter = if alternate {
            other_marker(self.options.bullet_ordered, &['.', ')'])
        } else {
            self.options.bullet_ordered
        };
        let first = start.unwrap_or(1);
        let mut items = Vec::with_capacity(node.children.len());
        for (index, item) in node.children.iter().enumerate() {
            let marker = if *ordered {
                let number = if self.options.increment_list_marker {
                    first + index as u64
                } else {
                    first
                };
                format!("{number}{delimiter}")
            } else {
                bullet.to_string()
            };
            items.push(self.list_item(item, &marker, *spread)?);
        }
        Ok(items.join(if *spread { "\n\n" } else { "\n" }))
    }

    fn list_item(&self, item: &MdNode, marker: &str, spread: bool) -> Result<String, SerializeError> {
        let (checked, item_spread) = match &item.kind {
            MdKind::ListItem { checked, spread } => (*checked, *spread),
            _ => (None, spread),
        };
        let separator = if spread || item_spread { "\n\n" } else { "\n" };
        let mut parts = Vec::with_capacity(item.children.len());
        for child in &item.children {
            parts.push(self.block(child)?);
        }
        let mut content = parts.join(separator);
        if let Some(checked) = checked {
            let check = if checked { "[x]" } else { "[ ]" };
            content = if content.is_empty() {
                check.to_string()
            } else {
                format!("{check} {content}")
            };
        }
        if content.is_empty() {
            return Ok(marker.to_string());
        }
        let indent = " ".repeat(marker.len() + 1);
        let mut out = String::new();
        for (index, line) in content.split('\n').enumerate() {
            if index == 0 {
                out.push_str(marker);
                out.push(' ');
                out.push_str(line);
            } else {
                out.push('\n');
                if !line.is_empty() {
                    out.push_str(&indent);
                    out.push_str(line);
                }
            }
        }
        Ok(out)
    }

    /// A fenced code block, with a fence longer than any fence-like run
    /// inside the code.
    pub fn code(&self, lang: Option<&str>, meta: Option<&str>, value: &str) -> String {
        let fence_char = self.options.fence;
        let longest = value
            .lines()
            .map(|line| {
                line.trim_start()
                    .chars()
                    .take_while(|c| *c == fence_char)
                    .count()
            })
            .max()
            .unwrap_or(0);
        let fence = fence_char.to_string().repeat((longest + 1).max(3));
        let mut info = lang.unwrap_or_default().to_string();
        if let Some(meta) = meta.filter(|m| !m.is_empty()) {
            info.push(' ');
            info.push_str(meta);
        }
        if value.is_empty() {
            format!("{fence}{info}\n{fence}")
        } else {
            format!("{fence}{info}\n{value}\n{fence}")
        }
    }

    fn jsx(&self, node: &MdNode) -> Result<String, SerializeError> {
        let MdKind::JsxElement {
            name,
            attributes,
            flow,
        } = &node.kind
        else {
            return self.block(node);
        };
        let mut open = format!("<{name}");
        for (key, value) in attributes {
            open.push(' ');
            open.push_str(key);
            if let Some(value) = value {
                open.push_str("=\"");
                open.push_str(&value.replace('"', "&quot;"));
                open.push('"');
            }
        }
        if node.children.is_empty() && (is_void_element(name) || !*flow) {
            return Ok(format!("{open} />"));
        }
        let all_inline = node.children.iter().all(MdNode::is_inline);
        if all_inline {
            let inner = self.inline(&node.children)?;
            return Ok(format!("{open}>{inner}</{name}>"));
        }
        let inner = self.blocks(&node.children)?;
        Ok(format!("{open}>\n{}\n</{name}>", prefix_lines(&inner, "  ", "")))
    }

    /// Render phrasing content.
    ///
    /// # Errors
    /// As [`Self::serialize`].
    pub fn inline(&self, children: &[MdNode]) -> Result<String, SerializeError> {
        let mut out = String::new();
        for child in children {
            out.push_str(&self.inline_node(child)?);
        }
        Ok(out)
    }

    fn inline_node(&self, node: &MdNode) -> Result<String, SerializeError> {
        if let Some(extension) = self.extension_for(node) {
            return extension.render(node, self);
        }
        match &node.kind {
            MdKind::Text { value } => Ok(escape_text(value)),
            MdKind::Emphasis => {
                let marker = self.options.emphasis.to_string();
                self.wrap_marked(&node.children, &marker)
            }
            MdKind::Strong => {
                let marker = self.options.strong.to_string().repeat(2);
                self.wrap_marked(&node.children, &marker)
            }
            MdKind::Delete => self.wrap_marked(&node.children, "~~"),
            MdKind::InlineCode { value } => Ok(inline_code(value)),
            MdKind::Break => Ok("\\\n".to_string()),
            MdKind::Link { url, title } => {
                let text = self.inline(&node.children)?;
                if title.is_none() && node.text_content() == *url && url.contains("://") {
                    return Ok(format!("<{url}>"));
                }
                Ok(format!("[{text}]({})", destination(url, title.as_deref())))
            }
            MdKind::Image { url, title, alt } => Ok(format!(
                "![{}]({})",
                escape_text(alt),
                destination(url, title.as_deref())
            )),
            MdKind::Html { value } => Ok(value.clone()),
            MdKind::JsxElement { .. } => self.jsx(node),
            _ => Err(SerializeError::UnhandledNode {
                kind: node.type_name(),
            }),
        }
    }

    /// Surround content with a delimiter run, moving edge whitespace outside
    /// so the run stays left- and right-flanking.
    fn wrap_marked(&self, children: &[MdNode], marker: &str) -> Result<String, SerializeError> {
        let inner = self.inline(children)?;
        let trimmed = inner.trim();
        if trimmed.is_empty() {
            return Ok(inner);
        }
        let leading = &inner[..inner.len() - inner.trim_start().len()];
        let trailing = &inner[inner.trim_end().len()..];
        Ok(format!("{leading}{marker}{trimmed}{marker}{trailing}"))
    }
}

fn other_marker(current: char, pair: &[char; 2]) -> char {
    if current == pair[0] { pair[1] } else { pair[0] }
}

fn destination(url: &str, title: Option<&str>) -> String {
    let url = if url.is_empty() || url.contains([' ', '(', ')']) {
        format!("<{url}>")
    } else {
        url.to_string()
    };
    match title {
        Some(title) => format!("{url} \"{}\"", title.replace('"', "\\\"")),
        None => url,
    }
}

fn inline_code(value: &str) -> String {
    let mut ticks = 1;
    loop {
        let run = "`".repeat(ticks);
        let clashes = value
            .split(|c| c != '`')
            .any(|segment| segment.len() == ticks);
        if !clashes {
            let pad = value.starts_with('`')
                || value.ends_with('`')
                || (value.starts_with(' ') && value.ends_with(' ') && !value.trim().is_empty());
            return if pad {
                format!("{run} {value} {run}")
            } else {
                format!("{run}{value}{run}")
            };
        }
        ticks += 1;
    }
}

/// Escape characters that would otherwise start inline markup.
pub fn escape_text(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::with_capacity(value.len());
    for (index, ch) in chars.iter().copied().enumerate() {
        let previous = index.checked_sub(1).map(|i| chars[i]);
        let next = chars.get(index + 1).copied();
        let escape = match ch {
            '\\' | '*' | '`' | '[' | ']' | '~' => true,
            '_' => {
                !previous.is_some_and(char::is_alphanumeric) || !next.is_some_and(char::is_alphanumeric)
            }
            '<' => next.is_some_and(|n| n.is_ascii_alphabetic() || matches!(n, '/' | '!' | '?')),
            '&' => next.is_some_and(|n| n.is_ascii_alphabetic() || n == '#'),
            '!' => next == Some('['),
            _ => false,
        };
        if escape {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Escape characters that would turn a paragraph line into another block.
fn escape_line_starts(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            let trimmed = line.trim_start();
            let indent = &line[..line.len() - trimmed.len()];
            let mut chars = trimmed.chars();
            let first = chars.next();
            let second = chars.next();
            let escape_first = match first {
                Some('#' | '>') => true,
                Some('-' | '+') => {
                    second.is_none_or(char::is_whitespace)
                        || trimmed.chars().all(|c| c == '-' || c.is_whitespace())
                }
                Some('=') => trimmed.chars().all(|c| c == '=' || c.is_whitespace()),
                Some(':') => second == Some(':'),
                _ => false,
            };
            if escape_first {
                return format!("{indent}\\{trimmed}");
            }
            let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
            if digits > 0 && digits <= 9 {
                let rest = &trimmed[digits..];
                if rest.starts_with(". ") || rest.starts_with(") ") || rest == "." || rest == ")" {
                    return format!("{indent}{}\\{rest}", &trimmed[..digits]);
                }
            }
            line.to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Escape a trailing `#` run that would read as a closing sequence.
fn escape_closing_hashes(text: &str) -> String {
    let body = text.trim_end_matches('#');
    if body.len() == text.len() || !(body.is_empty() || body.ends_with([' ', '\t'])) {
        return text.to_string();
    }
    format!("{body}\\{}", &text[body.len()..])
}

fn prefix_lines(text: &str, prefix: &str, empty: &str) -> String {
    text.split('\n')
        .map(|line| {
            if line.is_empty() {
                empty.to_string()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Greedy soft wrap at spaces. Code spans and link destinations are never
/// broken.
fn wrap(text: &str, width: usize) -> String {
    let width = width.max(1);
    let mut out = String::with_capacity(text.len());
    for (index, line) in text.split('\n').enumerate() {
        if index > 0 {
            out.push('\n');
        }
        let mut column = 0usize;
        let mut in_code = false;
        let mut in_destination = false;
        let mut previous: Option<char> = None;
        let mut word = String::new();
        let mut word_width = 0usize;
        let flush = |out: &mut String, word: &mut String, word_width: &mut usize, column: &mut usize| {
            if word.is_empty() {
                return;
            }
            if *column > 0 && *column + 1 + *word_width > width {
                out.push('\n');
                *column = 0;
            } else if *column > 0 {
                out.push(' ');
                *column += 1;
            }
            out.push_str(word);
            *column += *word_width;
            word.clear();
            *word_width = 0;
        };
        for ch in line.chars() {
            match ch {
                '`' if previous != Some('\\') => in_code = !in_code,
                '(' if previous == Some(']') && !in_code => in_destination = true,
                ')' if in_destination => in_destination = false,
                _ => {}
            }
            if ch == ' ' && !in_code && !in_destination {
                flush(&mut out, &mut word, &mut word_width, &mut column);
            } else {
                word.push(ch);
                word_width += ch.width().unwrap_or(0);
            }
            previous = Some(ch);
        }
        flush(&mut out, &mut word, &mut word_width, &mut column);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::ast::Align;

    fn para(children: Vec<MdNode>) -> MdNode {
        MdNode::with_children(MdKind::Paragraph, children)
    }

    fn doc(children: Vec<MdNode>) -> MdNode {
        MdNode::with_children(MdKind::Root, children)
    }

    fn render(root: &MdNode) -> String {
        let options = ToMarkdownOptions::default();
        Serializer::new(&options, &[]).serialize(root).unwrap()
    }

    #[test]
    fn test_blocks_join_with_blank_line() {
        let root = doc(vec![
            MdNode::with_children(MdKind::Heading { depth: 2 }, vec![MdNode::text("Title")]),
            para(vec![MdNode::text("Body")]),
        ]);
        assert_eq!(render(&root), "## Title\n\nBody\n");
    }

    #[test]
    fn test_empty_document_is_empty_string() {
        assert_eq!(render(&doc(Vec::new())), "");
    }

    #[test]
    fn test_emphasis_moves_whitespace_outside() {
        let root = doc(vec![para(vec![
            MdNode::text("a"),
            MdNode::with_children(MdKind::Strong, vec![MdNode::text(" b ")]),
            MdNode::text("c"),
        ])]);
        assert_eq!(render(&root), "a **b** c\n");
    }

    #[test]
    fn test_text_escapes() {
        assert_eq!(escape_text("a*b"), "a\\*b");
        assert_eq!(escape_text("snake_case"), "snake_case");
        assert_eq!(escape_text("_lead"), "\\_lead");
        assert_eq!(escape_text("<div>"), "\\<div>");
        assert_eq!(escape_text("1 < 2"), "1 < 2");
    }

    #[test]
    fn test_line_start_escapes() {
        assert_eq!(escape_line_starts("# not heading"), "\\# not heading");
        assert_eq!(escape_line_starts("1. not list"), "1\\. not list");
        assert_eq!(escape_line_starts("- x\nplain"), "\\- x\nplain");
        assert_eq!(escape_line_starts("-5 degrees"), "-5 degrees");
        assert_eq!(escape_line_starts(":::note"), "\\:::note");
        assert_eq!(escape_line_starts("a\n::leaf"), "a\n\\::leaf");
        assert_eq!(escape_line_starts(":colon"), ":colon");
    }

    #[test]
    fn test_heading_closing_hashes_are_escaped() {
        let heading = |text: &str| {
            doc(vec![MdNode::with_children(
                MdKind::Heading { depth: 1 },
                vec![MdNode::text(text)],
            )])
        };
        assert_eq!(render(&heading("C #")), "# C \\#\n");
        assert_eq!(render(&heading("##")), "# \\##\n");
        assert_eq!(render(&heading("C#")), "# C#\n");
    }

    #[test]
    fn test_tight_and_loose_lists() {
        let item = |text: &str| {
            MdNode::with_children(
                MdKind::ListItem {
                    checked: None,
                    spread: false,
                },
                vec![para(vec![MdNode::text(text)])],
            )
        };
        let tight = doc(vec![MdNode::with_children(
            MdKind::List {
                ordered: true,
                start: Some(3),
                spread: false,
            },
            vec![item("a"), item("b")],
        )]);
        assert_eq!(render(&tight), "3. a\n4. b\n");
        let loose = doc(vec![MdNode::with_children(
            MdKind::List {
                ordered: false,
                start: None,
                spread: true,
            },
            vec![item("a"), item("b")],
        )]);
        assert_eq!(render(&loose), "* a\n\n* b\n");
    }

    #[test]
    fn test_adjacent_lists_use_other_marker() {
        let list = || {
            MdNode::with_children(
                MdKind::List {
                    ordered: false,
                    start: None,
                    spread: false,
                },
                vec![MdNode::with_children(
                    MdKind::ListItem {
                        checked: Some(true),
                        spread: false,
                    },
                    vec![para(vec![MdNode::text("x")])],
                )],
            )
        };
        assert_eq!(render(&doc(vec![list(), list()])), "* [x] x\n\n- [x] x\n");
    }

    #[test]
    fn test_code_fence_outgrows_content() {
        let options = ToMarkdownOptions::default();
        let serializer = Serializer::new(&options, &[]);
        assert_eq!(
            serializer.code(Some("md"), None, "```\ninner\n```"),
            "````md\n```\ninner\n```\n````"
        );
    }

    #[test]
    fn test_inline_code_backtick_runs() {
        assert_eq!(inline_code("a"), "`a`");
        assert_eq!(inline_code("a`b"), "``a`b``");
        assert_eq!(inline_code("`x"), "`` `x ``");
    }

    #[test]
    fn test_blockquote_prefixes_every_line() {
        let root = doc(vec![MdNode::with_children(
            MdKind::Blockquote,
            vec![para(vec![MdNode::text("a")]), para(vec![MdNode::text("b")])],
        )]);
        assert_eq!(render(&root), "> a\n>\n> b\n");
    }

    #[test]
    fn test_unhandled_node_is_reported() {
        let root = doc(vec![MdNode::new(MdKind::Table {
            align: vec![Align::None],
        })]);
        let options = ToMarkdownOptions::default();
        let err = Serializer::new(&options, &[]).serialize(&root).unwrap_err();
        assert_eq!(err, SerializeError::UnhandledNode { kind: "table" });
    }

    #[test]
    fn test_wrap_respects_width_and_code() {
        assert_eq!(wrap("aaa bbb ccc", 7), "aaa bbb\nccc");
        assert_eq!(wrap("`a b c` d", 3), "`a b c`\nd");
    }

    #[test]
    fn test_options_validation() {
        assert!(ToMarkdownOptions::default().validate().is_ok());
        let bad = ToMarkdownOptions {
            bullet: '#',
            ..ToMarkdownOptions::default()
        };
        assert_eq!(bad.validate().unwrap_err(), "invalid bullet marker `#`");
    }

    #[test]
    fn test_options_load_from_json_with_defaults() {
        let options: ToMarkdownOptions =
            serde_json::from_str(r#"{"bullet": "-", "lineWidth": 72}"#).unwrap();
        assert_eq!(options.bullet, '-');
        assert_eq!(options.line_width, Some(72));
        assert_eq!(options.fence, '`');
    }
}
