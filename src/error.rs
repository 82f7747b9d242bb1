//! Error taxonomy for the synchronization core.
//!
//! Only the import path recovers from errors: [`ImportError::is_recoverable`]
//! separates malformed user input from misconfigured plugin sets. Everything
//! else propagates to the caller.

use thiserror::Error;

/// Malformed markdown detected while building the markdown tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (line {line})")]
pub struct ParseError {
    /// Human readable description.
    pub message: String,
    /// One-based line of the offending construct.
    pub line: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }
}

/// Failures of the editing engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A transaction produced a node whose kind the editor was not built with.
    #[error("node kind `{kind}` is not registered with this editor")]
    UnregisteredNode { kind: &'static str },
    /// A user-facing update was attempted on a read-only editor.
    #[error("editor is read-only")]
    NotEditable,
    /// `update` was called from inside another update of the same editor.
    #[error("nested update on an editor that is already inside a transaction")]
    ReentrantUpdate,
    /// An update listener failed after the transaction committed.
    #[error(transparent)]
    Listener(#[from] anyhow::Error),
}

/// Failures of the markdown import pipeline.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Error parsing markdown: {0}")]
    Parse(#[from] ParseError),
    /// No registered import visitor claimed a markdown tree node.
    #[error("Unsupported markdown syntax: {snippet}")]
    Unrecognized { kind: &'static str, snippet: String },
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ImportError {
    /// Whether the failure was caused by the markdown text itself.
    ///
    /// Recoverable failures become the session error state; the rest are
    /// plugin configuration gaps and propagate.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::Unrecognized { .. })
    }
}

/// Failures of the markdown serializer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializeError {
    #[error("no markdown handler for `{kind}` nodes")]
    UnhandledNode { kind: &'static str },
}

/// Failures of the markdown export pipeline. Always fatal.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no export visitor for `{kind}` nodes")]
    MissingVisitor { kind: &'static str },
    #[error(transparent)]
    Serialize(#[from] SerializeError),
}

/// Errors surfaced by [`crate::session::Session`] operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("plugin `{plugin}` failed to initialize: {cause:#}")]
    Plugin {
        plugin: &'static str,
        cause: anyhow::Error,
    },
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}
