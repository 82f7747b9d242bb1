//! Editor handles: transactions, listeners and command dispatch.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::EngineError;

use super::command::{
    BlurEvent, Command, CommandKind, CommandPriority, DefaultSelection, FocusOptions,
};
use super::node::{FormatKind, Node, NodeData, NodeKey, NodeKind, RangeSelection};
use super::state::{EditorState, Task, Transaction};
use super::teardown::Teardown;

static NEXT_EDITOR_ID: AtomicU64 = AtomicU64::new(1);

/// What an update listener sees after a transaction commits.
pub struct UpdatePayload {
    /// Element nodes that were added or whose data or child list changed.
    pub dirty_elements: HashSet<NodeKey>,
    /// Leaf nodes that were added or changed.
    pub dirty_leaves: HashSet<NodeKey>,
    pub state: Rc<EditorState>,
    pub previous: Rc<EditorState>,
}

impl UpdatePayload {
    pub fn is_clean(&self) -> bool {
        self.dirty_elements.is_empty() && self.dirty_leaves.is_empty()
    }
}

pub type UpdateListener = Rc<dyn Fn(&UpdatePayload) -> anyhow::Result<()>>;

/// Command handler. Receives the command and the editor it originated from,
/// which differs from the registering editor when a nested editor bubbles up.
pub type CommandHandler = Rc<dyn Fn(&Command, &Editor) -> bool>;

struct CommandRegistration {
    id: u64,
    kind: CommandKind,
    priority: CommandPriority,
    handler: CommandHandler,
}

struct EditorInner {
    id: u64,
    parent: Option<Editor>,
    kinds: HashSet<NodeKind>,
    state: RefCell<Rc<EditorState>>,
    next_key: Cell<u64>,
    editable: Cell<bool>,
    focused: Cell<bool>,
    updating: Cell<bool>,
    next_registration: Cell<u64>,
    update_listeners: RefCell<Vec<(u64, UpdateListener)>>,
    commands: RefCell<Vec<CommandRegistration>>,
}

/// A handle to one editing surface. Clones share the editor; equality is
/// handle identity.
#[derive(Clone)]
pub struct Editor {
    inner: Rc<EditorInner>,
}

impl PartialEq for Editor {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Editor {}

impl fmt::Debug for Editor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Editor")
            .field("id", &self.inner.id)
            .field("nested", &self.inner.parent.is_some())
            .finish_non_exhaustive()
    }
}

impl Editor {
    /// Create a root editor that accepts the given node kinds.
    pub fn new(kinds: impl IntoIterator<Item = NodeKind>) -> Self {
        Self::build(kinds.into_iter().collect(), None)
    }

    /// Create an editor nested inside this one, sharing its node kinds.
    pub fn nested(&self) -> Self {
        Self::build(self.inner.kinds.clone(), Some(self.clone()))
    }

    fn build(mut kinds: HashSet<NodeKind>, parent: Option<Self>) -> Self {
        kinds.insert(NodeKind::ROOT);
        Self {
            inner: Rc::new(EditorInner {
                id: NEXT_EDITOR_ID.fetch_add(1, Ordering::Relaxed),
                parent,
                kinds,
                state: RefCell::new(Rc::new(EditorState::empty())),
                next_key: Cell::new(1),
                editable: Cell::new(true),
                focused: Cell::new(false),
                updating: Cell::new(false),
                next_registration: Cell::new(1),
                update_listeners: RefCell::new(Vec::new()),
                commands: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn parent(&self) -> Option<&Self> {
        self.inner.parent.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.inner.parent.is_none()
    }

    pub fn is_editable(&self) -> bool {
        self.inner.editable.get()
    }

    pub fn set_editable(&self, editable: bool) {
        self.inner.editable.set(editable);
    }

    pub fn is_focused(&self) -> bool {
        self.inner.focused.get()
    }

    pub fn has_kind(&self, kind: NodeKind) -> bool {
        self.inner.kinds.contains(&kind)
    }

    /// The latest committed state.
    pub fn state(&self) -> Rc<EditorState> {
        Rc::clone(&self.inner.state.borrow())
    }

    pub fn read<R>(&self, f: impl FnOnce(&EditorState) -> R) -> R {
        f(&self.state())
    }

    /// Run a transaction. The closure mutates a pending copy; on return the
    /// copy is validated and committed, update listeners fire, then deferred
    /// tasks run in queue order.
    ///
    /// # Errors
    /// Fails on a nested update, on unregistered node kinds (the pending
    /// state is discarded) and when an update listener fails.
    pub fn update<R>(&self, f: impl FnOnce(&mut Transaction<'_>) -> R) -> Result<R, EngineError> {
        if self.inner.updating.replace(true) {
            return Err(EngineError::ReentrantUpdate);
        }
        let previous = self.state();
        let mut pending = (*previous).clone();
        let mut tasks: Vec<Task> = Vec::new();
        let result = {
            let mut txn = Transaction {
                state: &mut pending,
                kinds: &self.inner.kinds,
                next_key: &self.inner.next_key,
                tasks: &mut tasks,
            };
            f(&mut txn)
        };

        if let Err(err) = validate_kinds(&pending.root, &self.inner.kinds) {
            self.inner.updating.set(false);
            return Err(err);
        }
        pending.sanitize_selection();

        let (dirty_elements, dirty_leaves) = dirty_keys(&previous.root, &pending.root);
        let next = Rc::new(pending);
        *self.inner.state.borrow_mut() = Rc::clone(&next);
        self.inner.updating.set(false);

        tracing::trace!(
            editor = self.inner.id,
            dirty_elements = dirty_elements.len(),
            dirty_leaves = dirty_leaves.len(),
            "transaction committed"
        );

        let payload = UpdatePayload {
            dirty_elements,
            dirty_leaves,
            state: next,
            previous,
        };
        let listeners: Vec<UpdateListener> = self
            .inner
            .update_listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&payload)?;
        }

        for task in tasks {
            task();
        }
        Ok(result)
    }

    /// A user-initiated edit. Same as [`Self::update`] but refused while the
    /// editor is read-only.
    ///
    /// # Errors
    /// [`EngineError::NotEditable`] on a read-only editor, otherwise as
    /// [`Self::update`].
    pub fn edit<R>(&self, f: impl FnOnce(&mut Transaction<'_>) -> R) -> Result<R, EngineError> {
        if !self.is_editable() {
            return Err(EngineError::NotEditable);
        }
        self.update(f)
    }

    fn next_registration(&self) -> u64 {
        let id = self.inner.next_registration.get();
        self.inner.next_registration.set(id + 1);
        id
    }

    pub fn register_update_listener(
        &self,
        listener: impl Fn(&UpdatePayload) -> anyhow::Result<()> + 'static,
    ) -> Teardown {
        let id = self.next_registration();
        self.inner
            .update_listeners
            .borrow_mut()
            .push((id, Rc::new(listener)));
        let weak: Weak<EditorInner> = Rc::downgrade(&self.inner);
        Teardown::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner
                    .update_listeners
                    .borrow_mut()
                    .retain(|(existing, _)| *existing != id);
            }
        })
    }

    pub fn register_command(
        &self,
        kind: CommandKind,
        priority: CommandPriority,
        handler: impl Fn(&Command, &Self) -> bool + 'static,
    ) -> Teardown {
        let id = self.next_registration();
        self.inner.commands.borrow_mut().push(CommandRegistration {
            id,
            kind,
            priority,
            handler: Rc::new(handler),
        });
        let weak: Weak<EditorInner> = Rc::downgrade(&self.inner);
        Teardown::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.commands.borrow_mut().retain(|reg| reg.id != id);
            }
        })
    }

    /// Number of live listeners and command handlers.
    pub fn registration_count(&self) -> usize {
        self.inner.update_listeners.borrow().len() + self.inner.commands.borrow().len()
    }

    fn handlers_for(&self, kind: CommandKind) -> Vec<CommandHandler> {
        let commands = self.inner.commands.borrow();
        let mut matching: Vec<&CommandRegistration> =
            commands.iter().filter(|reg| reg.kind == kind).collect();
        // Stable: equal priorities keep registration order.
        matching.sort_by(|a, b| b.priority.cmp(&a.priority));
        matching.iter().map(|reg| Rc::clone(&reg.handler)).collect()
    }

    /// Dispatch a command, bubbling through parent editors until a handler
    /// claims it. Unclaimed format commands fall back to the built-in toggle.
    pub fn dispatch_command(&self, command: &Command) -> bool {
        let mut current = Some(self.clone());
        while let Some(editor) = current {
            for handler in editor.handlers_for(command.kind()) {
                if handler(command, self) {
                    return true;
                }
            }
            current = editor.parent().cloned();
        }
        match command {
            Command::FormatText(kind) => self.toggle_format(*kind),
            _ => false,
        }
    }

    fn toggle_format(&self, kind: FormatKind) -> bool {
        if !self.is_editable() {
            return false;
        }
        let result = self.update(|txn| {
            let keys = txn.state().selected_text_keys();
            if keys.is_empty() {
                return false;
            }
            let all_on = keys.iter().all(|key| {
                matches!(
                    txn.state().node(*key).map(|n| &n.data),
                    Some(NodeData::Text { format, .. }) if format.has(kind)
                )
            });
            for key in keys {
                if let Some(Node {
                    data: NodeData::Text { format, .. },
                    ..
                }) = txn.node_mut(key)
                {
                    *format = format.with(kind, !all_on);
                }
            }
            true
        });
        match result {
            Ok(changed) => changed,
            Err(err) => {
                tracing::warn!(error = %err, "format toggle failed");
                false
            }
        }
    }

    /// Move the selection and announce it.
    ///
    /// # Errors
    /// As [`Self::update`].
    pub fn select(&self, selection: Option<RangeSelection>) -> Result<(), EngineError> {
        self.update(|txn| txn.set_selection(selection))?;
        self.dispatch_command(&Command::SelectionChange);
        Ok(())
    }

    /// Give the editor input focus, placing a default caret if nothing is
    /// selected.
    ///
    /// # Errors
    /// As [`Self::update`].
    pub fn focus(&self, options: FocusOptions) -> Result<(), EngineError> {
        if self.state().selection().is_none() {
            self.update(|txn| {
                let point = match options.default_selection {
                    DefaultSelection::RootStart => txn.state().start_point(),
                    DefaultSelection::RootEnd => txn.state().end_point(),
                };
                txn.set_selection(Some(RangeSelection::collapsed(point)));
            })?;
        }
        self.inner.focused.set(true);
        self.dispatch_command(&Command::Focus);
        self.dispatch_command(&Command::SelectionChange);
        Ok(())
    }

    pub fn blur(&self, event: BlurEvent) {
        self.inner.focused.set(false);
        self.dispatch_command(&Command::Blur(event));
    }
}

fn validate_kinds(root: &Node, kinds: &HashSet<NodeKind>) -> Result<(), EngineError> {
    let mut missing = None;
    root.walk(&mut |node| {
        if missing.is_none() && !kinds.contains(&node.kind()) {
            missing = Some(node.kind());
        }
    });
    missing.map_or(Ok(()), |kind| {
        Err(EngineError::UnregisteredNode { kind: kind.name() })
    })
}

fn dirty_keys(previous: &Node, next: &Node) -> (HashSet<NodeKey>, HashSet<NodeKey>) {
    let mut old: HashMap<NodeKey, &Node> = HashMap::new();
    previous.walk(&mut |node| {
        old.insert(node.key(), node);
    });
    let mut elements = HashSet::new();
    let mut leaves = HashSet::new();
    next.walk(&mut |node| {
        let changed = old.get(&node.key()).is_none_or(|before| {
            before.data != node.data
                || before.children.len() != node.children.len()
                || before
                    .children
                    .iter()
                    .zip(&node.children)
                    .any(|(a, b)| a.key() != b.key())
        });
        if changed {
            if node.data.is_element() {
                elements.insert(node.key());
            } else {
                leaves.insert(node.key());
            }
        }
    });
    (elements, leaves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Point, TextFormat};

    fn all_kinds() -> Vec<NodeKind> {
        vec![NodeKind::PARAGRAPH, NodeKind::TEXT, NodeKind::HEADING]
    }

    fn paragraph(txn: &Transaction<'_>, text: &str) -> Node {
        let mut para = txn.create(NodeData::Paragraph).unwrap();
        para.children.push(
            txn.create(NodeData::Text {
                text: text.to_string(),
                format: TextFormat::default(),
            })
            .unwrap(),
        );
        para
    }

    #[test]
    fn test_update_commits_and_reports_dirty_nodes() {
        let editor = Editor::new(all_kinds());
        let seen = Rc::new(Cell::new(0));
        let seen_in = Rc::clone(&seen);
        let _teardown = editor.register_update_listener(move |payload| {
            seen_in.set(payload.dirty_elements.len() + payload.dirty_leaves.len());
            Ok(())
        });
        editor
            .update(|txn| {
                let para = paragraph(txn, "hello");
                txn.replace_root_children(vec![para]);
            })
            .unwrap();
        // root, paragraph and text
        assert_eq!(seen.get(), 3);
        assert_eq!(editor.state().root().text_content(), "hello");
    }

    #[test]
    fn test_selection_only_update_is_clean() {
        let editor = Editor::new(all_kinds());
        let clean = Rc::new(Cell::new(false));
        let clean_in = Rc::clone(&clean);
        let _teardown = editor.register_update_listener(move |payload| {
            clean_in.set(payload.is_clean());
            Ok(())
        });
        editor.update(|txn| txn.set_selection(None)).unwrap();
        assert!(clean.get());
    }

    #[test]
    fn test_unregistered_kind_discards_pending_state() {
        let editor = Editor::new(vec![NodeKind::PARAGRAPH]);
        let err = editor
            .update(|txn| txn.create(NodeData::Quote).map(|_| ()))
            .unwrap();
        assert!(matches!(err, Err(EngineError::UnregisteredNode { kind: "quote" })));
        assert!(editor.state().root().children.is_empty());
    }

    #[test]
    fn test_nested_update_is_rejected() {
        let editor = Editor::new(all_kinds());
        let inner = editor.clone();
        let nested = editor.update(move |_| inner.update(|_| ())).unwrap();
        assert!(matches!(nested, Err(EngineError::ReentrantUpdate)));
    }

    #[test]
    fn test_deferred_tasks_run_after_listeners() {
        let editor = Editor::new(all_kinds());
        let log = Rc::new(RefCell::new(Vec::new()));
        let listener_log = Rc::clone(&log);
        let _teardown = editor.register_update_listener(move |_| {
            listener_log.borrow_mut().push("listener");
            Ok(())
        });
        let task_log = Rc::clone(&log);
        editor
            .update(|txn| txn.defer(move || task_log.borrow_mut().push("task")))
            .unwrap();
        assert_eq!(*log.borrow(), vec!["listener", "task"]);
    }

    #[test]
    fn test_teardown_removes_listener() {
        let editor = Editor::new(all_kinds());
        let teardown = editor.register_update_listener(|_| Ok(()));
        assert_eq!(editor.registration_count(), 1);
        teardown.run();
        assert_eq!(editor.registration_count(), 0);
    }

    #[test]
    fn test_commands_run_by_priority_and_bubble_to_parent() {
        let root = Editor::new(all_kinds());
        let nested = root.nested();
        let log = Rc::new(RefCell::new(Vec::new()));
        let low = Rc::clone(&log);
        let _a = root.register_command(CommandKind::Focus, CommandPriority::Low, move |_, _| {
            low.borrow_mut().push("low");
            false
        });
        let critical = Rc::clone(&log);
        let origin_nested = nested.clone();
        let _b = root.register_command(
            CommandKind::Focus,
            CommandPriority::Critical,
            move |_, origin| {
                assert_eq!(*origin, origin_nested);
                critical.borrow_mut().push("critical");
                false
            },
        );
        assert!(!nested.dispatch_command(&Command::Focus));
        assert_eq!(*log.borrow(), vec!["critical", "low"]);
    }

    #[test]
    fn test_format_toggle_applies_to_selected_text() {
        let editor = Editor::new(all_kinds());
        let key = editor
            .update(|txn| {
                let para = paragraph(txn, "bold me");
                let key = para.children[0].key();
                txn.replace_root_children(vec![para]);
                txn.set_selection(Some(RangeSelection {
                    anchor: Point { key, offset: 0 },
                    focus: Point { key, offset: 7 },
                }));
                key
            })
            .unwrap();
        assert!(editor.dispatch_command(&Command::FormatText(FormatKind::Bold)));
        let state = editor.state();
        let Some(NodeData::Text { format, .. }) = state.node(key).map(|n| &n.data) else {
            panic!("text node missing");
        };
        assert!(format.bold);
    }

    #[test]
    fn test_edit_refused_when_read_only() {
        let editor = Editor::new(all_kinds());
        editor.set_editable(false);
        assert!(matches!(editor.edit(|_| ()), Err(EngineError::NotEditable)));
        assert!(editor.update(|_| ()).is_ok());
    }

    #[test]
    fn test_focus_places_default_selection() {
        let editor = Editor::new(all_kinds());
        editor
            .update(|txn| {
                let para = paragraph(txn, "abc");
                txn.replace_root_children(vec![para]);
            })
            .unwrap();
        editor
            .focus(FocusOptions {
                default_selection: DefaultSelection::RootEnd,
                prevent_scroll: false,
            })
            .unwrap();
        assert!(editor.is_focused());
        let selection = editor.state().selection().unwrap();
        assert_eq!(selection.focus.offset, 3);
    }
}
