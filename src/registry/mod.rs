//! Registry cells: ordered, append-only, deduplicated capability lists.
//!
//! Plugins contribute entries while the session is built and on every
//! parameter update. Entries are never removed. Readers take a snapshot
//! (`Rc<[T]>`), so a collection is never observed half-merged.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::engine::NodeKind;
use crate::export::ExportVisitor;
use crate::import::ImportVisitor;
use crate::markdown::{SyntaxExtension, ToMarkdownExtension, TreeExtension};
use crate::session::{Subscription, UiSlot};

/// How a registry decides that two entries are the same.
pub trait RegistryEntry: Clone {
    fn same_entry(&self, other: &Self) -> bool;
}

impl RegistryEntry for NodeKind {
    fn same_entry(&self, other: &Self) -> bool {
        self == other
    }
}

impl RegistryEntry for String {
    fn same_entry(&self, other: &Self) -> bool {
        self == other
    }
}

impl RegistryEntry for UiSlot {
    fn same_entry(&self, other: &Self) -> bool {
        self == other
    }
}

impl<T: ?Sized> RegistryEntry for Rc<T> {
    fn same_entry(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }
}

/// Statics are compared by address. Zero-sized statics may share one, so
/// the name has to match as well.
macro_rules! static_entries {
    ($($entry:ident),* $(,)?) => {
        $(
            impl RegistryEntry for &'static dyn $entry {
                fn same_entry(&self, other: &Self) -> bool {
                    std::ptr::addr_eq(std::ptr::from_ref(*self), std::ptr::from_ref(*other))
                        && self.name() == other.name()
                }
            }
        )*
    };
}

static_entries!(
    ImportVisitor,
    ExportVisitor,
    SyntaxExtension,
    TreeExtension,
    ToMarkdownExtension,
);

type ChangeListener = Rc<dyn Fn()>;

pub struct Registry<T> {
    entries: RefCell<Rc<[T]>>,
    listeners: RefCell<Vec<ChangeListener>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: RefCell::new(Rc::from(Vec::new())),
            listeners: RefCell::new(Vec::new()),
        }
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("len", &self.entries.borrow().len())
            .finish_non_exhaustive()
    }
}

impl<T: RegistryEntry> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A consistent view of the current entries.
    pub fn snapshot(&self) -> Rc<[T]> {
        Rc::clone(&self.entries.borrow())
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append one entry. Returns false if it was already registered.
    pub fn append(&self, entry: T) -> bool {
        self.extend([entry]) == 1
    }

    /// Append several entries as one change. Duplicates, of existing entries
    /// or within the batch, are skipped. Returns the number added.
    pub fn extend(&self, batch: impl IntoIterator<Item = T>) -> usize {
        let current = self.snapshot();
        let mut merged: Vec<T> = current.to_vec();
        for entry in batch {
            if !merged.iter().any(|existing| existing.same_entry(&entry)) {
                merged.push(entry);
            }
        }
        let added = merged.len() - current.len();
        if added > 0 {
            *self.entries.borrow_mut() = Rc::from(merged);
            self.notify();
        }
        added
    }

    /// Overwrite the whole collection, for registries that hold
    /// configuration rather than accumulate contributions.
    pub fn replace(&self, entries: impl IntoIterator<Item = T>) {
        let mut next: Vec<T> = Vec::new();
        for entry in entries {
            if !next.iter().any(|existing| existing.same_entry(&entry)) {
                next.push(entry);
            }
        }
        *self.entries.borrow_mut() = Rc::from(next);
        self.notify();
    }

    /// Call `listener` after every change. Listeners run outside any borrow
    /// of the registry and may read it.
    pub fn on_change(&self, listener: impl Fn() + 'static) {
        self.listeners.borrow_mut().push(Rc::new(listener));
    }

    fn notify(&self) {
        let listeners: Vec<ChangeListener> = self.listeners.borrow().iter().cloned().collect();
        for listener in listeners {
            listener();
        }
    }
}

impl<T: RegistryEntry> Registry<T>
where
    T: PartialEq,
{
    pub fn contains(&self, entry: &T) -> bool {
        self.entries.borrow().iter().any(|existing| existing == entry)
    }
}

/// Every registry the session owns.
///
/// Order matters: visitors and extensions are consulted first-match in
/// registration order, which is plugin order.
#[derive(Default)]
pub struct Registries {
    pub node_kinds: Registry<NodeKind>,
    pub import_visitors: Registry<&'static dyn ImportVisitor>,
    pub export_visitors: Registry<&'static dyn ExportVisitor>,
    pub syntax_extensions: Registry<&'static dyn SyntaxExtension>,
    pub tree_extensions: Registry<&'static dyn TreeExtension>,
    pub to_markdown_extensions: Registry<&'static dyn ToMarkdownExtension>,
    pub root_subscriptions: Registry<Subscription>,
    pub active_subscriptions: Registry<Subscription>,
    pub editor_wrappers: Registry<UiSlot>,
    pub top_area_children: Registry<UiSlot>,
    pub plugin_names: Registry<String>,
}

impl fmt::Debug for Registries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registries")
            .field("node_kinds", &self.node_kinds.len())
            .field("import_visitors", &self.import_visitors.len())
            .field("export_visitors", &self.export_visitors.len())
            .field("root_subscriptions", &self.root_subscriptions.len())
            .field("active_subscriptions", &self.active_subscriptions.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn test_append_skips_duplicates() {
        let registry = Registry::new();
        assert!(registry.append(NodeKind::QUOTE));
        assert!(!registry.append(NodeKind::QUOTE));
        assert_eq!(registry.extend([NodeKind::HEADING, NodeKind::QUOTE, NodeKind::HEADING]), 1);
        assert_eq!(&*registry.snapshot(), &[NodeKind::QUOTE, NodeKind::HEADING]);
    }

    #[test]
    fn test_snapshot_is_not_affected_by_later_appends() {
        let registry = Registry::new();
        registry.append(NodeKind::TEXT);
        let before = registry.snapshot();
        registry.append(NodeKind::PARAGRAPH);
        assert_eq!(before.len(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_batch_notifies_once() {
        let registry = Rc::new(Registry::new());
        let count = Rc::new(Cell::new(0));
        let seen = Rc::clone(&count);
        registry.on_change(move || seen.set(seen.get() + 1));
        registry.extend([NodeKind::TEXT, NodeKind::PARAGRAPH]);
        registry.extend([NodeKind::TEXT]);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_listener_may_read_registry() {
        let registry = Rc::new(Registry::new());
        let reader = Rc::clone(&registry);
        let seen = Rc::new(Cell::new(0));
        let seen_in = Rc::clone(&seen);
        registry.on_change(move || seen_in.set(reader.len()));
        registry.append(NodeKind::TEXT);
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn test_rc_entries_compare_by_identity() {
        let registry: Registry<Rc<dyn Fn() -> u8>> = Registry::new();
        let a: Rc<dyn Fn() -> u8> = Rc::new(|| 1);
        let b: Rc<dyn Fn() -> u8> = Rc::new(|| 1);
        registry.append(Rc::clone(&a));
        registry.append(a);
        registry.append(b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_replace_overwrites() {
        let registry = Registry::new();
        registry.extend(["a".to_string(), "b".to_string()]);
        registry.replace(["c".to_string()]);
        assert_eq!(&*registry.snapshot(), &["c".to_string()]);
    }
}
