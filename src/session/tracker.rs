//! Active-editor tracking and the selection-derived toolbar state.

use std::rc::Rc;

use crate::engine::{
    Command, CommandKind, CommandPriority, Editor, EditorState, NodeData, NodeKey, Point,
    RangeSelection, TextFormat,
};

use super::{BlockType, EditorInFocus, Session, Subscription, WeakSession};

/// Editor type published while the root editor holds the selection.
pub const ROOT_EDITOR_TYPE: &str = "rich-text";

impl Session {
    /// A selection moved in `origin`, the root editor or a nested one.
    pub(crate) fn track_selection(&self, origin: &Editor) {
        self.set_active_editor(Some(origin));
        self.set_in_focus(true);
        let state = origin.state();
        if origin.is_root() {
            let root_node = state
                .selection()
                .and_then(|s| state.top_level_element(s.anchor.key))
                .map(crate::engine::Node::key);
            self.set_editor_in_focus(Some(EditorInFocus {
                editor_type: ROOT_EDITOR_TYPE,
                root_node,
            }));
        }
        self.refresh_selection_state(&state);
    }

    /// Recompute the current format and block type from a selection.
    pub(crate) fn refresh_selection_state(&self, state: &EditorState) {
        let Some(selection) = state.selection() else {
            return;
        };
        self.inner.current_format.set(format_at(state, selection.anchor.key));
        self.inner
            .current_block_type
            .set(block_type_at(state, selection.anchor.key));
    }
}

fn format_at(state: &EditorState, key: NodeKey) -> TextFormat {
    match state.node(key).map(|node| &node.data) {
        Some(NodeData::Text { format, .. }) => *format,
        _ => TextFormat::default(),
    }
}

fn block_type_at(state: &EditorState, key: NodeKey) -> BlockType {
    let Some(block) = state.top_level_element(key) else {
        return BlockType::Other;
    };
    match block.data {
        NodeData::Paragraph => BlockType::Paragraph,
        NodeData::Quote => BlockType::Quote,
        NodeData::Heading { level } => BlockType::Heading(level),
        _ => BlockType::Other,
    }
}

/// Root subscription: selection changes anywhere in the editor tree
/// republish the active editor.
pub(crate) fn active_editor_tracking(weak: WeakSession) -> Subscription {
    Rc::new(move |root: &Editor| {
        let weak = weak.clone();
        root.register_command(
            CommandKind::SelectionChange,
            CommandPriority::Critical,
            move |_, origin| {
                if let Some(session) = weak.upgrade() {
                    session.track_selection(origin);
                }
                false
            },
        )
    })
}

/// Root subscription: export after every dirty update.
pub(crate) fn export_on_update(weak: WeakSession) -> Subscription {
    Rc::new(move |root: &Editor| {
        let weak = weak.clone();
        root.register_update_listener(move |payload| {
            let Some(session) = weak.upgrade() else {
                return Ok(());
            };
            session.export_after_update(payload.state.root(), payload.is_clean())
        })
    })
}

/// Root subscription: focus marks the session focused.
pub(crate) fn focus_tracking(weak: WeakSession) -> Subscription {
    Rc::new(move |root: &Editor| {
        let weak = weak.clone();
        root.register_command(CommandKind::Focus, CommandPriority::Critical, move |_, _| {
            if let Some(session) = weak.upgrade() {
                session.set_in_focus(true);
            }
            false
        })
    })
}

/// Root subscription: select-all spans the whole root when the document
/// starts or ends with a decorator, which text selection cannot reach.
pub(crate) fn select_all_override() -> Subscription {
    Rc::new(|root: &Editor| {
        let target = root.clone();
        root.register_command(CommandKind::KeyDown, CommandPriority::Critical, move |command, _| {
            let Command::KeyDown(event) = command else {
                return false;
            };
            if !(event.key.eq_ignore_ascii_case(&'a') && event.modifiers.control_or_meta()) {
                return false;
            }
            let state = target.state();
            let children = &state.root().children;
            let decorator_edge = children.first().is_some_and(|n| n.data.is_decorator())
                || children.last().is_some_and(|n| n.data.is_decorator());
            if !decorator_edge {
                return false;
            }
            let whole = RangeSelection {
                anchor: Point {
                    key: NodeKey::ROOT,
                    offset: 0,
                },
                focus: Point {
                    key: NodeKey::ROOT,
                    offset: children.len(),
                },
            };
            if let Err(err) = target.select(Some(whole)) {
                tracing::warn!(error = %err, "select all failed");
            }
            true
        })
    })
}

/// Active subscription: keep format and block type current while the
/// active editor changes.
pub(crate) fn selection_state_tracking(weak: WeakSession) -> Subscription {
    Rc::new(move |editor: &Editor| {
        let weak = weak.clone();
        editor.register_update_listener(move |payload| {
            if let Some(session) = weak.upgrade() {
                session.refresh_selection_state(&payload.state);
            }
            Ok(())
        })
    })
}

/// Active subscription: only a blur that leaves the root surface counts.
pub(crate) fn blur_tracking(weak: WeakSession) -> Subscription {
    Rc::new(move |editor: &Editor| {
        let weak = weak.clone();
        editor.register_command(CommandKind::Blur, CommandPriority::Critical, move |command, _| {
            let Command::Blur(event) = command else {
                return false;
            };
            if !event.leaves_root {
                return false;
            }
            if let Some(session) = weak.upgrade() {
                session.set_in_focus(false);
                session.emit_blur(*event);
            }
            false
        })
    })
}

/// Every subscription the core registers, root first then active.
pub(crate) fn core_subscriptions(session: &Session) -> (Vec<Subscription>, Vec<Subscription>) {
    let weak = session.downgrade();
    let root = vec![
        active_editor_tracking(weak.clone()),
        export_on_update(weak.clone()),
        focus_tracking(weak.clone()),
        select_all_override(),
    ];
    let active = vec![selection_state_tracking(weak.clone()), blur_tracking(weak)];
    (root, active)
}
