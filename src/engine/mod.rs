//! The editing engine the session drives.
//!
//! This module handles:
//! - The structured document tree ([`Node`], [`NodeData`])
//! - Atomic update transactions with dirty tracking
//! - Prioritised command dispatch that bubbles from nested editors to their parents
//! - Update listeners and the post-transaction task queue

mod command;
mod editor;
mod node;
mod state;
mod teardown;

pub use command::{
    BlurEvent, Command, CommandKind, CommandPriority, DefaultSelection, FocusOptions, KeyEvent,
    Modifiers,
};
pub use editor::{CommandHandler, Editor, UpdateListener, UpdatePayload};
pub use node::{
    FormatKind, Node, NodeData, NodeKey, NodeKind, Point, RangeSelection, TextFormat,
};
pub use state::{EditorState, Transaction};
pub use teardown::Teardown;

pub use crate::error::EngineError;
