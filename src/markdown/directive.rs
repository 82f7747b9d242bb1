//! Generic directive syntax: `:::name{attrs}` containers and `::name[label]{attrs}`
//! leaves.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ParseError;

use super::ast::{DirectiveKind, MdKind, MdNode};
use super::syntax::{BlockClaim, FenceTracker, SyntaxExtension};

static CONTAINER_OPEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(:{3,})[ \t]*([A-Za-z][\w-]*)[ \t]*(\{.*)?$").unwrap()
});

static CONTAINER_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^:{3,}[ \t]*$").unwrap());

static LEAF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^::([A-Za-z][\w-]*)(?:\[([^\]]*)\])?[ \t]*(\{.*)?$")
        .unwrap()
});

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"#([\w-]+)|\.([\w-]+)|([A-Za-z_:][\w:.-]*)(?:=(?:"([^"]*)"|'([^']*)'|([^\s"'}]+)))?"#,
    )
    .unwrap()
});

pub struct DirectiveSyntax;

/// Always installed: documents using directive syntax must at least parse,
/// even when nothing knows how to import them.
pub static DIRECTIVE_SYNTAX: DirectiveSyntax = DirectiveSyntax;

impl SyntaxExtension for DirectiveSyntax {
    fn name(&self) -> &'static str {
        "directive"
    }

    fn claim_block(&self, lines: &[&str], start: usize) -> Result<Option<BlockClaim>, ParseError> {
        let line = lines[start].trim_end_matches(['\n', '\r']).trim_end();
        if let Some(caps) = CONTAINER_OPEN.captures(line) {
            let name = caps[2].to_string();
            let attributes = match caps.get(3) {
                Some(raw) => parse_attributes(raw.as_str(), start + 1)?,
                None => Vec::new(),
            };
            let close = find_container_close(lines, start + 1);
            let body_end = close.unwrap_or(lines.len());
            let end = close.map_or(lines.len(), |c| c + 1);
            return Ok(Some(BlockClaim {
                end,
                node: MdNode::new(MdKind::Directive {
                    directive: DirectiveKind::Container,
                    name,
                    attributes,
                }),
                body: Some(start + 1..body_end),
            }));
        }
        if let Some(caps) = LEAF.captures(line) {
            let name = caps[1].to_string();
            let attributes = match caps.get(3) {
                Some(raw) => parse_attributes(raw.as_str(), start + 1)?,
                None => Vec::new(),
            };
            let children = caps
                .get(2)
                .filter(|label| !label.as_str().is_empty())
                .map(|label| vec![MdNode::text(label.as_str())])
                .unwrap_or_default();
            return Ok(Some(BlockClaim {
                end: start + 1,
                node: MdNode::with_children(
                    MdKind::Directive {
                        directive: DirectiveKind::Leaf,
                        name,
                        attributes,
                    },
                    children,
                ),
                body: None,
            }));
        }
        Ok(None)
    }
}

/// Index of the line closing the container opened just before `from`.
/// Nested containers and fenced code are skipped.
fn find_container_close(lines: &[&str], from: usize) -> Option<usize> {
    let mut depth = 1usize;
    let mut fence = FenceTracker::default();
    for (index, raw) in lines.iter().enumerate().skip(from) {
        if fence.feed(raw) {
            continue;
        }
        let line = raw.trim_end_matches(['\n', '\r']).trim_end();
        if CONTAINER_CLOSE.is_match(line) {
            depth -= 1;
            if depth == 0 {
                return Some(index);
            }
        } else if CONTAINER_OPEN.is_match(line) {
            depth += 1;
        }
    }
    None
}

/// Parse a `{#id .class key="value" flag}` attribute block.
///
/// # Errors
/// An attribute block without its closing brace.
pub fn parse_attributes(raw: &str, line: usize) -> Result<Vec<(String, String)>, ParseError> {
    let Some(inner) = raw
        .strip_prefix('{')
        .and_then(|rest| rest.trim_end().strip_suffix('}'))
    else {
        return Err(ParseError::new(
            format!("Unexpected end of directive attributes, expected `}}` in `{raw}`"),
            line,
        ));
    };
    let mut attributes: Vec<(String, String)> = Vec::new();
    let mut classes: Vec<String> = Vec::new();
    for caps in ATTRIBUTE.captures_iter(inner) {
        if let Some(id) = caps.get(1) {
            set_attribute(&mut attributes, "id", id.as_str());
        } else if let Some(class) = caps.get(2) {
            classes.push(class.as_str().to_string());
        } else if let Some(key) = caps.get(3) {
            let value = caps
                .get(4)
                .or_else(|| caps.get(5))
                .or_else(|| caps.get(6))
                .map_or("", |m| m.as_str());
            if key.as_str() == "class" {
                classes.extend(value.split_whitespace().map(str::to_string));
            } else {
                set_attribute(&mut attributes, key.as_str(), value);
            }
        }
    }
    if !classes.is_empty() {
        set_attribute(&mut attributes, "class", &classes.join(" "));
    }
    Ok(attributes)
}

fn set_attribute(attributes: &mut Vec<(String, String)>, key: &str, value: &str) {
    if let Some(existing) = attributes.iter_mut().find(|(k, _)| k == key) {
        existing.1 = value.to_string();
    } else {
        attributes.push((key.to_string(), value.to_string()));
    }
}

/// Render attributes back to `{#id .class key="value"}` form, or nothing.
pub fn format_attributes(attributes: &[(String, String)]) -> String {
    if attributes.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = attributes
        .iter()
        .map(|(key, value)| match key.as_str() {
            "id" if is_simple(value) => format!("#{value}"),
            "class" if value.split_whitespace().all(is_simple) && !value.is_empty() => value
                .split_whitespace()
                .map(|class| format!(".{class}"))
                .collect::<Vec<_>>()
                .join(" "),
            _ if value.is_empty() => key.clone(),
            _ => format!("{key}=\"{}\"", value.replace('"', "&quot;")),
        })
        .collect();
    format!("{{{}}}", parts.join(" "))
}

fn is_simple(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim(source: &str) -> Option<BlockClaim> {
        let lines: Vec<&str> = source.split_inclusive('\n').collect();
        DIRECTIVE_SYNTAX.claim_block(&lines, 0).unwrap()
    }

    #[test]
    fn test_container_with_space_before_name() {
        let claim = claim("::: badDirective\n").unwrap();
        assert_eq!(claim.end, 1);
        assert_eq!(claim.node.type_name(), "containerDirective");
        assert_eq!(claim.body, Some(1..1));
    }

    #[test]
    fn test_container_closes_at_matching_depth() {
        let claim = claim(":::note{.warn}\na\n:::tip\nb\n:::\n:::\nafter\n").unwrap();
        assert_eq!(claim.end, 6);
        assert_eq!(claim.body, Some(1..5));
        let MdKind::Directive { attributes, .. } = &claim.node.kind else {
            panic!("not a directive");
        };
        assert_eq!(attributes, &vec![("class".to_string(), "warn".to_string())]);
    }

    #[test]
    fn test_close_inside_code_fence_is_ignored() {
        let claim = claim(":::note\n```\n:::\n```\n:::\n").unwrap();
        assert_eq!(claim.end, 5);
    }

    #[test]
    fn test_leaf_with_label() {
        let claim = claim("::youtube[Intro video]{#abc}\n").unwrap();
        assert_eq!(claim.node.type_name(), "leafDirective");
        assert_eq!(claim.node.text_content(), "Intro video");
    }

    #[test]
    fn test_unterminated_attributes_fail() {
        let lines = vec![":::note{title=\"x\"\n"];
        let err = DIRECTIVE_SYNTAX.claim_block(&lines, 0).unwrap_err();
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_plain_text_not_claimed() {
        assert!(claim("a :: b\n").is_none());
        assert!(claim("::\n").is_none());
    }

    #[test]
    fn test_attribute_format_is_parseable() {
        let attributes = parse_attributes(r#"{#top .a .b title="Hi there" hidden}"#, 1).unwrap();
        let formatted = format_attributes(&attributes);
        assert_eq!(formatted, r#"{#top title="Hi there" hidden .a .b}"#);
        assert_eq!(parse_attributes(&formatted, 1).unwrap(), attributes);
    }
}
