use std::fmt;

/// A consume-once callable that detaches a subscription.
///
/// Running consumes the value, so a teardown can never fire twice.
pub struct Teardown(Option<Box<dyn FnOnce()>>);

impl Teardown {
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    /// A teardown with nothing to detach.
    pub const fn noop() -> Self {
        Self(None)
    }

    /// Combine several teardowns; they run in the given order.
    pub fn merge(teardowns: Vec<Self>) -> Self {
        Self::new(move || {
            for teardown in teardowns {
                teardown.run();
            }
        })
    }

    pub fn run(mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

impl fmt::Debug for Teardown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Teardown")
            .field(&if self.0.is_some() { "armed" } else { "noop" })
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn test_merge_runs_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let a = {
            let log = Rc::clone(&log);
            Teardown::new(move || log.borrow_mut().push("a"))
        };
        let b = {
            let log = Rc::clone(&log);
            Teardown::new(move || log.borrow_mut().push("b"))
        };
        Teardown::merge(vec![a, b]).run();
        assert_eq!(*log.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn test_noop_runs_without_effect() {
        Teardown::noop().run();
    }
}
