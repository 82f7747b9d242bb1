//! Keeps registered subscriptions attached to exactly one editor.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::engine::{Editor, Teardown};
use crate::registry::Registry;

/// Builds the listeners a plugin wants on an editor and returns how to
/// detach them again.
pub type Subscription = Rc<dyn Fn(&Editor) -> Teardown>;

#[derive(Default)]
struct Bound {
    editor: Option<Editor>,
    live: Vec<Teardown>,
}

/// The bound editor plus the teardowns installed on it.
///
/// [`Self::rebind`] is the only place `live` changes. A rebind requested
/// while one is already running (a factory that moves focus, say) is folded
/// into the running one, which loops until the state settles.
#[derive(Default)]
pub struct Rebinder {
    label: &'static str,
    state: RefCell<Bound>,
    busy: Cell<bool>,
    pending: Cell<bool>,
    cycles: Cell<usize>,
}

impl Rebinder {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            ..Self::default()
        }
    }

    pub fn editor(&self) -> Option<Editor> {
        self.state.borrow().editor.clone()
    }

    /// Number of live teardowns.
    pub fn live_count(&self) -> usize {
        self.state.borrow().live.len()
    }

    /// Completed teardown-then-install cycles.
    pub fn cycles(&self) -> usize {
        self.cycles.get()
    }

    /// Follow a tracked editor. Republishing the same handle does nothing.
    pub fn track(&self, editor: Option<&Editor>, registry: &Registry<Subscription>) {
        if self.state.borrow().editor.as_ref() == editor {
            return;
        }
        self.state.borrow_mut().editor = editor.cloned();
        self.rebind(registry);
    }

    /// Reinstall against the current editor after the registry changed.
    pub fn refresh(&self, registry: &Registry<Subscription>) {
        self.rebind(registry);
    }

    fn rebind(&self, registry: &Registry<Subscription>) {
        if self.busy.replace(true) {
            self.pending.set(true);
            return;
        }
        loop {
            self.pending.set(false);
            let previous = std::mem::take(&mut self.state.borrow_mut().live);
            let torn = previous.len();
            for teardown in previous {
                teardown.run();
            }
            let editor = self.editor();
            let installed: Vec<Teardown> = match &editor {
                Some(editor) => registry
                    .snapshot()
                    .iter()
                    .map(|subscribe| subscribe(editor))
                    .collect(),
                None => Vec::new(),
            };
            tracing::debug!(
                binding = self.label,
                torn,
                installed = installed.len(),
                editor = editor.as_ref().map(Editor::id),
                "subscriptions rebound"
            );
            self.state.borrow_mut().live = installed;
            self.cycles.set(self.cycles.get() + 1);
            if !self.pending.get() {
                break;
            }
        }
        self.busy.set(false);
    }

    /// Run every live teardown and forget the editor.
    pub fn detach(&self) {
        let previous = {
            let mut state = self.state.borrow_mut();
            state.editor = None;
            std::mem::take(&mut state.live)
        };
        for teardown in previous {
            teardown.run();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NodeKind;

    fn logging_subscription(log: &Rc<RefCell<Vec<String>>>, name: &'static str) -> Subscription {
        let log = Rc::clone(log);
        Rc::new(move |editor: &Editor| {
            log.borrow_mut().push(format!("install {name} {}", editor.id()));
            let log = Rc::clone(&log);
            let id = editor.id();
            Teardown::new(move || log.borrow_mut().push(format!("teardown {name} {id}")))
        })
    }

    #[test]
    fn test_teardown_precedes_install_on_every_change() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let registry = Registry::new();
        registry.append(logging_subscription(&log, "a"));
        let rebinder = Rebinder::new("test");
        let first = Editor::new([NodeKind::PARAGRAPH]);
        let second = Editor::new([NodeKind::PARAGRAPH]);

        rebinder.track(Some(&first), &registry);
        rebinder.track(Some(&second), &registry);

        let expected = vec![
            format!("install a {}", first.id()),
            format!("teardown a {}", first.id()),
            format!("install a {}", second.id()),
        ];
        assert_eq!(*log.borrow(), expected);
        assert_eq!(rebinder.live_count(), 1);
    }

    #[test]
    fn test_same_editor_is_not_rebound() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let registry = Registry::new();
        registry.append(logging_subscription(&log, "a"));
        let rebinder = Rebinder::new("test");
        let editor = Editor::new([NodeKind::PARAGRAPH]);
        rebinder.track(Some(&editor), &registry);
        rebinder.track(Some(&editor.clone()), &registry);
        assert_eq!(rebinder.cycles(), 1);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_clearing_editor_empties_live_state() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let registry = Registry::new();
        registry.extend([
            logging_subscription(&log, "a"),
            logging_subscription(&log, "b"),
        ]);
        let rebinder = Rebinder::new("test");
        let editor = Editor::new([NodeKind::PARAGRAPH]);
        rebinder.track(Some(&editor), &registry);
        rebinder.track(None, &registry);
        assert_eq!(rebinder.live_count(), 0);
        let id = editor.id();
        assert_eq!(
            log.borrow()[2..],
            [format!("teardown a {id}"), format!("teardown b {id}")]
        );
    }

    #[test]
    fn test_refresh_installs_new_registry_entries() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let registry = Registry::new();
        registry.append(logging_subscription(&log, "a"));
        let rebinder = Rebinder::new("test");
        let editor = Editor::new([NodeKind::PARAGRAPH]);
        rebinder.track(Some(&editor), &registry);
        registry.append(logging_subscription(&log, "b"));
        rebinder.refresh(&registry);
        assert_eq!(rebinder.live_count(), 2);
        assert_eq!(log.borrow().iter().filter(|l| l.starts_with("install a")).count(), 2);
    }

    #[test]
    fn test_listeners_are_really_detached() {
        let registry: Registry<Subscription> = Registry::new();
        registry.append(Rc::new(|editor: &Editor| editor.register_update_listener(|_| Ok(()))));
        let rebinder = Rebinder::new("test");
        let first = Editor::new([NodeKind::PARAGRAPH]);
        let second = Editor::new([NodeKind::PARAGRAPH]);
        for _ in 0..3 {
            rebinder.track(Some(&first), &registry);
            rebinder.track(Some(&second), &registry);
        }
        assert_eq!(first.registration_count(), 0);
        assert_eq!(second.registration_count(), 1);
        assert_eq!(rebinder.cycles(), 6);
    }
}
