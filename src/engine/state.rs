//! Committed editor state and the transaction scope that mutates it.

use std::cell::Cell;
use std::collections::HashSet;

use crate::error::EngineError;

use super::node::{Node, NodeData, NodeKey, NodeKind, Point, RangeSelection};

/// An immutable snapshot of one editor's content.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorState {
    pub(crate) root: Node,
    pub(crate) selection: Option<RangeSelection>,
}

impl EditorState {
    pub(crate) const fn empty() -> Self {
        Self {
            root: Node::root(),
            selection: None,
        }
    }

    pub const fn root(&self) -> &Node {
        &self.root
    }

    pub const fn selection(&self) -> Option<RangeSelection> {
        self.selection
    }

    pub fn node(&self, key: NodeKey) -> Option<&Node> {
        self.root.find(key)
    }

    /// Index of the root child that contains `key`.
    pub fn top_level_index(&self, key: NodeKey) -> Option<usize> {
        self.root
            .children
            .iter()
            .position(|child| child.find(key).is_some())
    }

    /// The root child that contains `key`.
    pub fn top_level_element(&self, key: NodeKey) -> Option<&Node> {
        self.top_level_index(key).map(|i| &self.root.children[i])
    }

    /// Keys of every text node in document order.
    pub fn text_keys(&self) -> Vec<NodeKey> {
        let mut keys = Vec::new();
        self.root.walk(&mut |node| {
            if matches!(node.data, NodeData::Text { .. }) {
                keys.push(node.key());
            }
        });
        keys
    }

    /// Text node keys covered by the current selection, in document order.
    pub fn selected_text_keys(&self) -> Vec<NodeKey> {
        let Some(selection) = self.selection else {
            return Vec::new();
        };
        let keys = self.text_keys();
        let anchor = keys.iter().position(|k| *k == selection.anchor.key);
        let focus = keys.iter().position(|k| *k == selection.focus.key);
        match (anchor, focus) {
            (Some(a), Some(f)) => {
                let (start, end) = if a <= f { (a, f) } else { (f, a) };
                keys[start..=end].to_vec()
            }
            _ => Vec::new(),
        }
    }

    pub fn start_point(&self) -> Point {
        self.text_keys().first().map_or(
            Point {
                key: NodeKey::ROOT,
                offset: 0,
            },
            |key| Point {
                key: *key,
                offset: 0,
            },
        )
    }

    pub fn end_point(&self) -> Point {
        self.text_keys().last().map_or(
            Point {
                key: NodeKey::ROOT,
                offset: self.root.children.len(),
            },
            |key| Point {
                key: *key,
                offset: self.node(*key).map_or(0, |n| n.text_content().len()),
            },
        )
    }

    /// Drop a selection whose endpoints no longer exist.
    pub(crate) fn sanitize_selection(&mut self) {
        if let Some(selection) = self.selection {
            let valid = |p: Point| p.key == NodeKey::ROOT || self.root.find(p.key).is_some();
            if !valid(selection.anchor) || !valid(selection.focus) {
                self.selection = None;
            }
        }
    }
}

pub(crate) type Task = Box<dyn FnOnce()>;

/// The mutation scope handed to [`super::Editor::update`].
pub struct Transaction<'a> {
    pub(crate) state: &'a mut EditorState,
    pub(crate) kinds: &'a HashSet<NodeKind>,
    pub(crate) next_key: &'a Cell<u64>,
    pub(crate) tasks: &'a mut Vec<Task>,
}

impl Transaction<'_> {
    /// Create a detached node with a fresh key.
    ///
    /// # Errors
    /// Fails if the node kind was not registered with the editor.
    pub fn create(&self, data: NodeData) -> Result<Node, EngineError> {
        self.check_kind(data.kind())?;
        let key = self.next_key.get();
        self.next_key.set(key + 1);
        Ok(Node::new(NodeKey(key), data))
    }

    pub(crate) fn check_kind(&self, kind: NodeKind) -> Result<(), EngineError> {
        if self.kinds.contains(&kind) {
            Ok(())
        } else {
            Err(EngineError::UnregisteredNode { kind: kind.name() })
        }
    }

    pub fn state(&self) -> &EditorState {
        self.state
    }

    pub fn root(&self) -> &Node {
        &self.state.root
    }

    pub fn root_mut(&mut self) -> &mut Node {
        &mut self.state.root
    }

    pub fn node_mut(&mut self, key: NodeKey) -> Option<&mut Node> {
        self.state.root.find_mut(key)
    }

    /// Atomically swap the root's content.
    pub fn replace_root_children(&mut self, children: Vec<Node>) {
        self.state.root.children = children;
    }

    pub fn clear_root(&mut self) {
        self.state.root.children.clear();
    }

    pub fn set_selection(&mut self, selection: Option<RangeSelection>) {
        self.state.selection = selection;
    }

    /// Insert a block after the top-level block holding the selection focus,
    /// or at the end of the root when there is no selection.
    pub fn insert_block_near_selection(&mut self, node: Node) -> NodeKey {
        let key = node.key();
        self.insert_blocks_near_selection(vec![node]);
        key
    }

    /// Insert blocks, in order, where [`Self::insert_block_near_selection`]
    /// would put one. Returns the index of the first.
    pub fn insert_blocks_near_selection(&mut self, nodes: Vec<Node>) -> usize {
        let index = self
            .state
            .selection
            .and_then(|s| self.state.top_level_index(s.focus.key))
            .map_or(self.state.root.children.len(), |i| i + 1);
        self.state.root.children.splice(index..index, nodes);
        index
    }

    /// Indices of the first and last top-level blocks the selection touches.
    pub fn selected_block_range(&self) -> Option<(usize, usize)> {
        let selection = self.state.selection?;
        let a = self.state.top_level_index(selection.anchor.key)?;
        let f = self.state.top_level_index(selection.focus.key)?;
        Some(if a <= f { (a, f) } else { (f, a) })
    }

    /// Rebuild every top-level block touched by the selection through
    /// `convert`. Blocks for which it returns `None` are kept as they are.
    /// Decorators and lists are never handed to `convert`.
    ///
    /// # Errors
    /// Whatever `convert` returns, typically an unregistered node kind.
    pub fn convert_selected_blocks(
        &mut self,
        convert: &dyn Fn(&Transaction<'_>, &Node) -> Result<Option<Node>, EngineError>,
    ) -> Result<usize, EngineError> {
        let Some((start, end)) = self.selected_block_range() else {
            return Ok(0);
        };
        let mut converted = 0;
        for index in start..=end {
            let block = &self.state.root.children[index];
            if block.data.is_decorator()
                || !block.data.is_element()
                || matches!(block.data, NodeData::List { .. })
            {
                continue;
            }
            let block = block.clone();
            if let Some(replacement) = convert(self, &block)? {
                self.check_kind(replacement.kind())?;
                self.state.root.children[index] = replacement;
                converted += 1;
            }
        }
        Ok(converted)
    }

    /// Queue work to run once this transaction has committed and its update
    /// listeners have fired.
    pub fn defer(&mut self, task: impl FnOnce() + 'static) {
        self.tasks.push(Box::new(task));
    }
}
