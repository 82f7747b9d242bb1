//! Markdown text handling.
//!
//! This module handles:
//! - Parsing markdown into an mdast-shaped tree via comrak
//! - Syntax and tree extensions contributed by plugins
//! - Serializing the tree back to markdown with configurable markers

mod ast;
pub mod directive;
pub mod html;
mod parse;
mod serialize;
mod syntax;

pub use ast::{Align, DirectiveKind, MdKind, MdNode, Position};
pub use parse::parse_markdown;
pub use serialize::{Serializer, ToMarkdownExtension, ToMarkdownOptions, escape_text};
pub use syntax::{BlockClaim, ComrakSyntax, SyntaxExtension, TreeExtension};
