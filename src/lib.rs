// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference (e.g. plugins::TablePlugin)
    clippy::module_name_repetitions
)]

//! # mdsync
//!
//! The synchronization core of a plugin-driven markdown editor.
//!
//! A [`Session`] keeps a structured document tree and its markdown text in
//! step:
//! - Markdown is parsed and imported into the tree through plugin visitors
//! - Every dirty update of the tree is exported back to markdown
//! - Malformed markdown becomes an error state instead of a failure
//! - Source and diff views edit the raw text directly
//!
//! ## Architecture
//!
//! Plugins contribute capabilities (node kinds, visitors, syntax, editor
//! subscriptions) into append-only registries. The session reads consistent
//! snapshots of those registries whenever it imports or exports.
//!
//! ## Modules
//!
//! - [`registry`]: Ordered, deduplicated capability lists
//! - [`plugin`]: Plugin trait and lifecycle runner
//! - [`engine`]: Structured tree, transactions, commands and listeners
//! - [`markdown`]: Markdown tree, parser and serializer
//! - [`import`]: Markdown to structured tree
//! - [`export`]: Structured tree to markdown
//! - [`session`]: Synchronization state, active-editor tracking, view modes
//! - [`plugins`]: The shipped plugin set
//! - [`config`]: Persisted command-line defaults
//! - [`watcher`]: File watching

pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod import;
pub mod markdown;
pub mod plugin;
pub mod plugins;
pub mod registry;
pub mod session;
pub mod watcher;

pub use error::{ExportError, ImportError, ParseError, SessionError};
pub use session::Session;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::engine::{Editor, FormatKind, Node, NodeData};
    pub use crate::plugin::{FnPlugin, Plugin};
    pub use crate::plugins::{CorePluginParams, content_plugins};
    pub use crate::session::{BlockType, MarkdownError, Session, ViewMode};
}
