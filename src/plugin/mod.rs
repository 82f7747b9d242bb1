//! Plugin authoring surface and the lifecycle runner.
//!
//! A plugin carries its own parameters. `init` runs once, when the session
//! is built; `update` runs after every init and again whenever the host
//! hands the session a fresh plugin list with new parameters. Both run in
//! list order, which is the dependency order between plugins.

use crate::error::SessionError;
use crate::session::Session;

pub trait Plugin {
    /// Identifier recorded in the session's active plugin list.
    fn name(&self) -> &'static str;

    /// Register capabilities. Runs once per session.
    ///
    /// # Errors
    /// Any failure aborts session construction.
    fn init(&self, _session: &Session) -> anyhow::Result<()> {
        Ok(())
    }

    /// Push the latest parameters into the session.
    fn update(&self, _session: &Session) {}
}

type InitFn = Box<dyn Fn(&Session) -> anyhow::Result<()>>;
type UpdateFn = Box<dyn Fn(&Session)>;

/// A plugin assembled from closures, for hosts that don't need a type.
pub struct FnPlugin {
    name: &'static str,
    init: Option<InitFn>,
    update: Option<UpdateFn>,
}

impl FnPlugin {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            init: None,
            update: None,
        }
    }

    #[must_use]
    pub fn on_init(mut self, init: impl Fn(&Session) -> anyhow::Result<()> + 'static) -> Self {
        self.init = Some(Box::new(init));
        self
    }

    #[must_use]
    pub fn on_update(mut self, update: impl Fn(&Session) + 'static) -> Self {
        self.update = Some(Box::new(update));
        self
    }
}

impl Plugin for FnPlugin {
    fn name(&self) -> &'static str {
        self.name
    }

    fn init(&self, session: &Session) -> anyhow::Result<()> {
        self.init.as_ref().map_or(Ok(()), |init| init(session))
    }

    fn update(&self, session: &Session) {
        if let Some(update) = &self.update {
            update(session);
        }
    }
}

/// Run every `init` in order. Nothing is caught: the first failure is the
/// session's failure.
pub(crate) fn run_init(session: &Session, plugins: &[Box<dyn Plugin>]) -> Result<(), SessionError> {
    for plugin in plugins {
        tracing::debug!(plugin = plugin.name(), "plugin init");
        plugin.init(session).map_err(|cause| SessionError::Plugin {
            plugin: plugin.name(),
            cause,
        })?;
        session
            .registries()
            .plugin_names
            .append(plugin.name().to_string());
    }
    Ok(())
}

pub(crate) fn run_update(session: &Session, plugins: &[Box<dyn Plugin>]) {
    for plugin in plugins {
        tracing::trace!(plugin = plugin.name(), "plugin update");
        plugin.update(session);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn recording(name: &'static str, log: &Rc<RefCell<Vec<String>>>) -> Box<dyn Plugin> {
        let init_log = Rc::clone(log);
        let update_log = Rc::clone(log);
        Box::new(
            FnPlugin::new(name)
                .on_init(move |_| {
                    init_log.borrow_mut().push(format!("init {name}"));
                    Ok(())
                })
                .on_update(move |_| update_log.borrow_mut().push(format!("update {name}"))),
        )
    }

    #[test]
    fn test_init_all_then_update_all_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let plugins = vec![recording("a", &log), recording("b", &log)];
        let session = Session::new(&plugins).unwrap();
        assert_eq!(*log.borrow(), ["init a", "init b", "update a", "update b"]);
        assert_eq!(&*session.active_plugins(), ["a".to_string(), "b".to_string()]);

        session.update(&plugins);
        assert_eq!(log.borrow()[4..], ["update a", "update b"]);
    }

    #[test]
    fn test_failing_init_aborts_construction() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let plugins: Vec<Box<dyn Plugin>> = vec![
            Box::new(FnPlugin::new("broken").on_init(|_| anyhow::bail!("missing dependency"))),
            recording("after", &log),
        ];
        let err = Session::new(&plugins).unwrap_err();
        assert!(matches!(err, SessionError::Plugin { plugin: "broken", .. }));
        assert!(err.to_string().contains("missing dependency"));
        assert!(log.borrow().is_empty());
    }
}
