//! Extension points of the markdown parser.
//!
//! Two layers, mirroring how a tokenizer and a tree builder split the work:
//! - [`SyntaxExtension`]s switch on base-parser features and may claim whole
//!   block regions (fenced constructs comrak does not know) before comrak runs.
//! - [`TreeExtension`]s rewrite the constructed markdown tree.

use std::ops::Range;

use comrak::ExtensionOptions;

use crate::error::ParseError;

use super::ast::MdNode;

/// A block region claimed by a syntax extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockClaim {
    /// First line index after the claimed region.
    pub end: usize,
    /// The node standing for the region. Children are filled from `body`.
    pub node: MdNode,
    /// Lines parsed as the node's block children, if any.
    pub body: Option<Range<usize>>,
}

pub trait SyntaxExtension {
    fn name(&self) -> &'static str;

    /// Switch on base parser features.
    fn configure(&self, _options: &mut ExtensionOptions) {}

    /// Try to claim the block starting at `lines[start]`. `lines` keep their
    /// line terminators and end where the enclosing region ends.
    ///
    /// # Errors
    /// A recognised but malformed construct.
    fn claim_block(&self, _lines: &[&str], _start: usize) -> Result<Option<BlockClaim>, ParseError> {
        Ok(None)
    }
}

pub trait TreeExtension {
    fn name(&self) -> &'static str;

    /// # Errors
    /// A recognised but malformed construct.
    fn transform(&self, root: &mut MdNode) -> Result<(), ParseError>;
}

/// A syntax extension that only flips comrak switches.
pub struct ComrakSyntax {
    name: &'static str,
    apply: fn(&mut ExtensionOptions),
}

impl ComrakSyntax {
    pub const fn new(name: &'static str, apply: fn(&mut ExtensionOptions)) -> Self {
        Self { name, apply }
    }
}

impl SyntaxExtension for ComrakSyntax {
    fn name(&self) -> &'static str {
        self.name
    }

    fn configure(&self, options: &mut ExtensionOptions) {
        (self.apply)(options);
    }
}

/// Tracks fenced code blocks while scanning lines, so that claims never
/// happen inside one.
#[derive(Debug, Default)]
pub(crate) struct FenceTracker {
    open: Option<(char, usize)>,
}

impl FenceTracker {
    /// Feed the next line. Returns true when the line belongs to a fence
    /// (opening, body or closing line).
    pub(crate) fn feed(&mut self, line: &str) -> bool {
        let marker = fence_marker(line);
        match (self.open, marker) {
            (Some((ch, len)), Some((mch, mlen, rest_blank))) => {
                if mch == ch && mlen >= len && rest_blank {
                    self.open = None;
                }
                true
            }
            (Some(_), None) => true,
            (None, Some((mch, mlen, _))) => {
                self.open = Some((mch, mlen));
                true
            }
            (None, None) => false,
        }
    }

    pub(crate) const fn is_open(&self) -> bool {
        self.open.is_some()
    }
}

/// Returns (fence char, run length, rest-of-line is blank).
fn fence_marker(line: &str) -> Option<(char, usize, bool)> {
    let trimmed = line.trim_end_matches(['\n', '\r']);
    let indent = trimmed.len() - trimmed.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let body = &trimmed[indent..];
    let ch = body.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let run = body.chars().take_while(|c| *c == ch).count();
    if run < 3 {
        return None;
    }
    let rest = &body[run..];
    if ch == '`' && rest.contains('`') {
        return None;
    }
    Some((ch, run, rest.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fence_tracker_covers_whole_fence() {
        let mut tracker = FenceTracker::default();
        let flags: Vec<bool> = ["text\n", "```rust\n", ":::note\n", "```\n", "after\n"]
            .iter()
            .map(|line| tracker.feed(line))
            .collect();
        assert_eq!(flags, vec![false, true, true, true, false]);
    }

    #[test]
    fn test_shorter_fence_does_not_close() {
        let mut tracker = FenceTracker::default();
        assert!(tracker.feed("````\n"));
        assert!(tracker.feed("```\n"));
        assert!(tracker.feed("````\n"));
        assert!(!tracker.feed("plain\n"));
    }

    #[test]
    fn test_inline_backticks_are_not_fences() {
        let mut tracker = FenceTracker::default();
        assert!(!tracker.feed("``` not a fence ` here\n"));
    }
}
