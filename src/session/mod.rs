//! The editing session: shared registries, the synchronization state
//! machine and the editors it drives.
//!
//! This module handles:
//! - Building a session from an ordered plugin list
//! - Markdown snapshot, error state and host callbacks
//! - Import on `set_markdown`, export on dirty root updates
//! - Active-editor tracking and subscription rebinding
//! - View modes and the raw source mirror

mod diff;
mod rebind;
mod source;
mod tracker;
mod view_mode;


use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::Serialize;

use crate::engine::{
    BlurEvent, Command, DefaultSelection, Editor, EngineError, FocusOptions, FormatKind, Node,
    NodeData, NodeKey, TextFormat, Transaction,
};
use crate::error::{ImportError, SessionError};
use crate::export::ExportPipeline;
use crate::import::ImportPipeline;
use crate::markdown::ToMarkdownOptions;
use crate::plugin::{self, Plugin};
use crate::registry::Registries;

pub use diff::{DiffLine, has_changes, line_diff};
pub use rebind::{Rebinder, Subscription};
pub use source::{SourceBuffer, SourceCursor};
pub use tracker::ROOT_EDITOR_TYPE;
pub(crate) use tracker::core_subscriptions;
pub use view_mode::ViewMode;

/// A UI contribution (editor wrapper, top-area child) identified by name.
/// Rendering is the host's business; the session only keeps the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct UiSlot(pub &'static str);

/// The error state: why the last import failed and the text it failed on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkdownError {
    pub error: String,
    pub source: String,
}

/// Block type under the active editor's selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Paragraph,
    Quote,
    Heading(u8),
    #[default]
    Other,
}

/// Which kind of editor holds focus and the root-level block it sits in.
/// Custom block editors publish their own `editor_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditorInFocus {
    pub editor_type: &'static str,
    pub root_node: Option<NodeKey>,
}

pub type ChangeCallback = Rc<dyn Fn(&str)>;
pub type ErrorCallback = Rc<dyn Fn(&MarkdownError)>;
pub type BlurCallback = Rc<dyn Fn(BlurEvent)>;

#[derive(Default, Clone)]
pub(crate) struct Callbacks {
    pub on_change: Option<ChangeCallback>,
    pub on_error: Option<ErrorCallback>,
    pub on_blur: Option<BlurCallback>,
}

struct SessionInner {
    registries: Registries,
    root_editor: RefCell<Option<Editor>>,
    active_editor: RefCell<Option<Editor>>,
    root_binding: Rebinder,
    active_binding: Rebinder,
    initial_markdown: RefCell<String>,
    markdown: RefCell<String>,
    emitted: RefCell<String>,
    source: RefCell<SourceBuffer>,
    error: RefCell<Option<MarkdownError>>,
    view_mode: Cell<ViewMode>,
    diff_markdown: RefCell<String>,
    in_focus: Cell<bool>,
    editor_in_focus: RefCell<Option<EditorInFocus>>,
    current_format: Cell<TextFormat>,
    current_block_type: Cell<BlockType>,
    to_markdown_options: RefCell<ToMarkdownOptions>,
    read_only: Cell<bool>,
    placeholder: RefCell<String>,
    autofocus: Cell<Option<FocusOptions>>,
    callbacks: RefCell<Callbacks>,
    plugin_state: RefCell<HashMap<TypeId, Rc<dyn Any>>>,
}

impl SessionInner {
    fn new() -> Self {
        Self {
            registries: Registries::default(),
            root_editor: RefCell::new(None),
            active_editor: RefCell::new(None),
            root_binding: Rebinder::new("root"),
            active_binding: Rebinder::new("active"),
            initial_markdown: RefCell::new(String::new()),
            markdown: RefCell::new(String::new()),
            emitted: RefCell::new(String::new()),
            source: RefCell::new(SourceBuffer::empty()),
            error: RefCell::new(None),
            view_mode: Cell::new(ViewMode::RichText),
            diff_markdown: RefCell::new(String::new()),
            in_focus: Cell::new(false),
            editor_in_focus: RefCell::new(None),
            current_format: Cell::new(TextFormat::default()),
            current_block_type: Cell::new(BlockType::Other),
            to_markdown_options: RefCell::new(ToMarkdownOptions::default()),
            read_only: Cell::new(false),
            placeholder: RefCell::new(String::new()),
            autofocus: Cell::new(None),
            callbacks: RefCell::new(Callbacks::default()),
            plugin_state: RefCell::new(HashMap::new()),
        }
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.active_binding.detach();
        self.root_binding.detach();
    }
}

/// One editor instance's context. Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct Session {
    inner: Rc<SessionInner>,
}

/// A non-owning session handle, for closures stored inside the session's
/// own registries and editors.
#[derive(Clone)]
pub struct WeakSession(Weak<SessionInner>);

impl WeakSession {
    pub fn upgrade(&self) -> Option<Session> {
        self.0.upgrade().map(|inner| Session { inner })
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("registries", &self.inner.registries)
            .field("view_mode", &self.inner.view_mode.get())
            .field("error", &self.inner.error.borrow())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Build a session: run every plugin's `init`, then every `update`, in
    /// the given order, create the root editor from the registered node
    /// kinds and import the initial markdown.
    ///
    /// Plugin order is the dependency order. A plugin may read whatever the
    /// plugins before it registered.
    ///
    /// # Errors
    /// A failing plugin `init`, plugin configuration gaps hit by the initial
    /// import, and export failures. Malformed initial markdown is not an
    /// error: it becomes the error state.
    pub fn new(plugins: &[Box<dyn Plugin>]) -> Result<Self, SessionError> {
        let session = Self {
            inner: Rc::new(SessionInner::new()),
        };
        session.watch_subscription_registries();

        plugin::run_init(&session, plugins)?;
        plugin::run_update(&session, plugins);

        let kinds = session.inner.registries.node_kinds.snapshot();
        let root = Editor::new(kinds.iter().copied());
        root.set_editable(!session.read_only());
        tracing::debug!(
            kinds = kinds.len(),
            plugins = plugins.len(),
            "root editor created"
        );
        session.set_root_editor(&root);
        session.set_active_editor(Some(&root));

        let initial = session.inner.initial_markdown.borrow().clone();
        session.import_replacing(&initial, session.inner.autofocus.get())?;
        Ok(session)
    }

    /// [`Self::new`] with the core plugin in front of `plugins`.
    ///
    /// # Errors
    /// As [`Self::new`].
    pub fn with_core(
        params: crate::plugins::CorePluginParams,
        plugins: Vec<Box<dyn Plugin>>,
    ) -> Result<Self, SessionError> {
        let mut all: Vec<Box<dyn Plugin>> = vec![Box::new(crate::plugins::CorePlugin::new(params))];
        all.extend(plugins);
        Self::new(&all)
    }

    /// Re-run every plugin's `update` with its latest parameters.
    pub fn update(&self, plugins: &[Box<dyn Plugin>]) {
        plugin::run_update(self, plugins);
    }

    pub fn downgrade(&self) -> WeakSession {
        WeakSession(Rc::downgrade(&self.inner))
    }

    pub fn registries(&self) -> &Registries {
        &self.inner.registries
    }

    fn watch_subscription_registries(&self) {
        let weak = self.downgrade();
        self.inner.registries.root_subscriptions.on_change(move || {
            if let Some(session) = weak.upgrade() {
                let inner = &session.inner;
                inner.root_binding.refresh(&inner.registries.root_subscriptions);
            }
        });
        let weak = self.downgrade();
        self.inner.registries.active_subscriptions.on_change(move || {
            if let Some(session) = weak.upgrade() {
                let inner = &session.inner;
                inner.active_binding.refresh(&inner.registries.active_subscriptions);
            }
        });
    }

    /// Typed per-plugin state, created on first access.
    pub fn state<T: Default + 'static>(&self) -> Rc<T> {
        let existing = {
            let states = self.inner.plugin_state.borrow();
            states.get(&TypeId::of::<T>()).cloned()
        };
        if let Some(state) = existing.and_then(|any| any.downcast::<T>().ok()) {
            return state;
        }
        let state = Rc::new(T::default());
        self.inner
            .plugin_state
            .borrow_mut()
            .insert(TypeId::of::<T>(), Rc::clone(&state) as Rc<dyn Any>);
        state
    }

    pub fn root_editor(&self) -> Option<Editor> {
        self.inner.root_editor.borrow().clone()
    }

    pub fn active_editor(&self) -> Option<Editor> {
        self.inner.active_editor.borrow().clone()
    }

    fn set_root_editor(&self, editor: &Editor) {
        *self.inner.root_editor.borrow_mut() = Some(editor.clone());
        self.inner
            .root_binding
            .track(Some(editor), &self.inner.registries.root_subscriptions);
    }

    /// Publish the editor with command authority. Publishing the current one
    /// again changes nothing.
    pub fn set_active_editor(&self, editor: Option<&Editor>) {
        *self.inner.active_editor.borrow_mut() = editor.cloned();
        self.inner
            .active_binding
            .track(editor, &self.inner.registries.active_subscriptions);
    }

    pub fn root_binding(&self) -> &Rebinder {
        &self.inner.root_binding
    }

    pub fn active_binding(&self) -> &Rebinder {
        &self.inner.active_binding
    }

    /// The current markdown snapshot.
    pub fn markdown(&self) -> String {
        self.inner.markdown.borrow().clone()
    }

    pub fn error(&self) -> Option<MarkdownError> {
        self.inner.error.borrow().clone()
    }

    pub fn in_focus(&self) -> bool {
        self.inner.in_focus.get()
    }

    pub(crate) fn set_in_focus(&self, in_focus: bool) {
        self.inner.in_focus.set(in_focus);
    }

    pub fn editor_in_focus(&self) -> Option<EditorInFocus> {
        self.inner.editor_in_focus.borrow().clone()
    }

    pub fn set_editor_in_focus(&self, editor_in_focus: Option<EditorInFocus>) {
        *self.inner.editor_in_focus.borrow_mut() = editor_in_focus;
    }

    pub fn current_format(&self) -> TextFormat {
        self.inner.current_format.get()
    }

    pub fn current_block_type(&self) -> BlockType {
        self.inner.current_block_type.get()
    }

    pub fn active_plugins(&self) -> Rc<[String]> {
        self.inner.registries.plugin_names.snapshot()
    }

    pub fn initial_markdown(&self) -> String {
        self.inner.initial_markdown.borrow().clone()
    }

    /// Seeds the snapshot as well, so the first export only notifies the
    /// host when it actually normalizes something.
    pub fn set_initial_markdown(&self, markdown: &str) {
        let markdown = markdown.trim().to_string();
        *self.inner.markdown.borrow_mut() = markdown.clone();
        *self.inner.emitted.borrow_mut() = markdown.clone();
        self.inner.source.borrow_mut().sync(&markdown);
        *self.inner.initial_markdown.borrow_mut() = markdown;
    }

    pub fn to_markdown_options(&self) -> ToMarkdownOptions {
        self.inner.to_markdown_options.borrow().clone()
    }

    pub fn set_to_markdown_options(&self, options: ToMarkdownOptions) {
        *self.inner.to_markdown_options.borrow_mut() = options;
    }

    pub fn read_only(&self) -> bool {
        self.inner.read_only.get()
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.inner.read_only.set(read_only);
        if let Some(root) = self.root_editor() {
            root.set_editable(!read_only);
        }
    }

    pub fn placeholder(&self) -> String {
        self.inner.placeholder.borrow().clone()
    }

    pub fn set_placeholder(&self, placeholder: &str) {
        placeholder.clone_into(&mut self.inner.placeholder.borrow_mut());
    }

    pub fn set_autofocus(&self, autofocus: Option<FocusOptions>) {
        self.inner.autofocus.set(autofocus);
    }

    pub(crate) fn set_callbacks(&self, callbacks: Callbacks) {
        *self.inner.callbacks.borrow_mut() = callbacks;
    }

    fn callbacks(&self) -> Callbacks {
        self.inner.callbacks.borrow().clone()
    }

    /// Notify the host, skipping values it has already been given.
    fn emit_change(&self, markdown: &str) {
        if *self.inner.emitted.borrow() == markdown {
            return;
        }
        markdown.clone_into(&mut self.inner.emitted.borrow_mut());
        if let Some(on_change) = self.callbacks().on_change {
            on_change(markdown);
        }
    }

    pub(crate) fn emit_blur(&self, event: BlurEvent) {
        if let Some(on_blur) = self.callbacks().on_blur {
            on_blur(event);
        }
    }

    /// Replace the document with `markdown`.
    ///
    /// Text equal to the snapshot after trimming is ignored. Malformed
    /// markdown leaves the tree alone and sets the error state instead.
    ///
    /// # Errors
    /// Plugin configuration gaps (unregistered node kinds) and export
    /// failures.
    pub fn set_markdown(&self, markdown: &str) -> Result<(), SessionError> {
        if markdown.trim() == self.inner.markdown.borrow().trim() {
            tracing::trace!("set_markdown: unchanged");
            return Ok(());
        }
        let refocus = self.in_focus().then(FocusOptions::default);
        self.import_replacing(markdown, refocus)
    }

    fn import_replacing(
        &self,
        markdown: &str,
        focus: Option<FocusOptions>,
    ) -> Result<(), SessionError> {
        let Some(root) = self.root_editor() else {
            return Ok(());
        };
        let pipeline = ImportPipeline::from_registries(&self.inner.registries);
        let result = root.update(|txn| -> Result<(), ImportError> {
            let nodes = pipeline.build(txn, markdown)?;
            txn.replace_root_children(nodes);
            self.inner.error.borrow_mut().take();
            match focus {
                Some(options) => {
                    let editor = root.clone();
                    txn.defer(move || {
                        if let Err(err) = editor.focus(options) {
                            tracing::warn!(error = %err, "deferred focus failed");
                        }
                    });
                }
                None => txn.set_selection(None),
            }
            Ok(())
        })?;
        match result {
            Ok(()) => Ok(()),
            Err(err) if err.is_recoverable() => {
                self.record_import_failure(&err, markdown);
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn record_import_failure(&self, err: &ImportError, markdown: &str) {
        tracing::warn!(error = %err, bytes = markdown.len(), "markdown import failed");
        let error = MarkdownError {
            error: err.to_string(),
            source: markdown.to_string(),
        };
        markdown.clone_into(&mut self.inner.markdown.borrow_mut());
        self.inner.source.borrow_mut().sync(markdown);
        *self.inner.error.borrow_mut() = Some(error.clone());
        if let Some(on_error) = self.callbacks().on_error {
            on_error(&error);
        }
    }

    /// Export listener body: re-export the root tree after a dirty update.
    pub(crate) fn export_after_update(&self, root: &Node, clean: bool) -> anyhow::Result<()> {
        if self.inner.error.borrow().is_some() {
            tracing::trace!("export skipped: error state set");
            return Ok(());
        }
        if clean {
            return Ok(());
        }
        let pipeline = ExportPipeline::from_registries(&self.inner.registries, self.to_markdown_options());
        let markdown = pipeline.run(root)?;
        self.publish_markdown(markdown.trim());
        Ok(())
    }

    fn publish_markdown(&self, markdown: &str) {
        markdown.clone_into(&mut self.inner.markdown.borrow_mut());
        self.inner.source.borrow_mut().sync(markdown);
        self.emit_change(markdown);
    }

    /// Parse `markdown` and insert the blocks after the selection in the
    /// active editor. A failed parse is reported through `on_error` but
    /// leaves the error state alone: the document itself is still valid.
    ///
    /// # Errors
    /// As [`Self::set_markdown`].
    pub fn insert_markdown(&self, markdown: &str) -> Result<(), SessionError> {
        let Some(editor) = self.active_editor() else {
            return Ok(());
        };
        let pipeline = ImportPipeline::from_registries(&self.inner.registries);
        let result = editor.edit(|txn| -> Result<usize, ImportError> {
            let nodes = pipeline.build(txn, markdown)?;
            let count = nodes.len();
            txn.insert_blocks_near_selection(nodes);
            Ok(count)
        })?;
        match result {
            Ok(count) => {
                tracing::debug!(blocks = count, "markdown inserted");
                Ok(())
            }
            Err(err) if err.is_recoverable() => {
                tracing::warn!(error = %err, "markdown insert failed");
                let error = MarkdownError {
                    error: err.to_string(),
                    source: markdown.to_string(),
                };
                if let Some(on_error) = self.callbacks().on_error {
                    on_error(&error);
                }
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Toggle a text format in the active editor.
    pub fn apply_format(&self, format: FormatKind) -> bool {
        self.active_editor()
            .is_some_and(|editor| editor.dispatch_command(&Command::FormatText(format)))
    }

    /// Rebuild the selected blocks of the active editor and give it focus
    /// once the transaction has settled. Returns the number converted.
    ///
    /// # Errors
    /// Read-only editors and unregistered node kinds.
    pub fn convert_selection_to_node(
        &self,
        convert: &dyn Fn(&Transaction<'_>, &Node) -> Result<Option<Node>, EngineError>,
    ) -> Result<usize, SessionError> {
        let Some(editor) = self.active_editor() else {
            return Ok(0);
        };
        let focus_target = editor.clone();
        let converted = editor.edit(|txn| -> Result<usize, EngineError> {
            let converted = txn.convert_selected_blocks(convert)?;
            txn.defer(move || {
                if let Err(err) = focus_target.focus(FocusOptions::default()) {
                    tracing::warn!(error = %err, "deferred focus failed");
                }
            });
            Ok(converted)
        })??;
        Ok(converted)
    }

    /// Change the selected blocks to `block_type`.
    ///
    /// # Errors
    /// As [`Self::convert_selection_to_node`].
    pub fn apply_block_type(&self, block_type: BlockType) -> Result<usize, SessionError> {
        self.convert_selection_to_node(&|txn, block| convert_block(txn, block, block_type))
    }

    /// Insert a node built by `factory` after the selection of the active
    /// editor (at the end when nothing is selected). Inline nodes are wrapped
    /// in a paragraph. Returns the key of the inserted node.
    ///
    /// # Errors
    /// Read-only editors and unregistered node kinds.
    pub fn insert_decorator_node(
        &self,
        factory: &dyn Fn(&Transaction<'_>) -> Result<Node, EngineError>,
    ) -> Result<Option<NodeKey>, SessionError> {
        let Some(editor) = self.active_editor() else {
            return Ok(None);
        };
        editor.focus(FocusOptions {
            default_selection: DefaultSelection::RootEnd,
            prevent_scroll: false,
        })?;
        let key = editor.edit(|txn| -> Result<NodeKey, EngineError> {
            let node = factory(txn)?;
            let key = node.key();
            let block = if node.data.is_inline() {
                let mut paragraph = txn.create(NodeData::Paragraph)?;
                paragraph.children.push(node);
                paragraph
            } else {
                node
            };
            txn.insert_block_near_selection(block);
            Ok(key)
        })??;
        editor.dispatch_command(&Command::NestedEditorUpdated);
        Ok(Some(key))
    }

    /// Current raw text of the source view.
    pub fn source_text(&self) -> String {
        self.inner.source.borrow().text()
    }

    pub fn diff_markdown(&self) -> String {
        self.inner.diff_markdown.borrow().clone()
    }

    pub fn set_diff_markdown(&self, markdown: &str) {
        markdown.clone_into(&mut self.inner.diff_markdown.borrow_mut());
    }
}

/// Inline content of a block, flattening nested blocks with line breaks.
fn inline_content(txn: &Transaction<'_>, block: &Node) -> Result<Vec<Node>, EngineError> {
    if block
        .children
        .iter()
        .all(|child| child.data.is_inline())
    {
        return Ok(block.children.clone());
    }
    let mut out = Vec::new();
    for child in &block.children {
        let content = inline_content(txn, child)?;
        if content.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(txn.create(NodeData::LineBreak)?);
        }
        out.extend(content);
    }
    Ok(out)
}

fn convert_block(
    txn: &Transaction<'_>,
    block: &Node,
    block_type: BlockType,
) -> Result<Option<Node>, EngineError> {
    let data = match block_type {
        BlockType::Paragraph => NodeData::Paragraph,
        BlockType::Heading(level) => NodeData::Heading {
            level: level.clamp(1, 6),
        },
        BlockType::Quote => NodeData::Quote,
        BlockType::Other => return Ok(None),
    };
    if block.data == data {
        return Ok(None);
    }
    let content = inline_content(txn, block)?;
    let mut converted = txn.create(data)?;
    if block_type == BlockType::Quote {
        let mut paragraph = txn.create(NodeData::Paragraph)?;
        paragraph.children = content;
        converted.children.push(paragraph);
    } else {
        converted.children = content;
    }
    Ok(Some(converted))
}
