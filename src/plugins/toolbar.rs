use std::rc::Rc;

use crate::plugin::Plugin;
use crate::registry::Registry;
use crate::session::{Session, UiSlot};

pub const TOOLBAR_SLOT: UiSlot = UiSlot("toolbar");

#[derive(Debug, Default)]
pub struct ToolbarState {
    contents: Registry<UiSlot>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolbarPluginParams {
    /// Toolbar items, left to right.
    pub toolbar_contents: Vec<UiSlot>,
}

pub struct ToolbarPlugin {
    params: ToolbarPluginParams,
}

impl ToolbarPlugin {
    pub const fn new(params: ToolbarPluginParams) -> Self {
        Self { params }
    }
}

impl Plugin for ToolbarPlugin {
    fn name(&self) -> &'static str {
        "toolbar"
    }

    fn init(&self, session: &Session) -> anyhow::Result<()> {
        session.registries().top_area_children.append(TOOLBAR_SLOT);
        Ok(())
    }

    fn update(&self, session: &Session) {
        session
            .state::<ToolbarState>()
            .contents
            .replace(self.params.toolbar_contents.iter().copied());
    }
}

pub fn toolbar_contents(session: &Session) -> Rc<[UiSlot]> {
    session.state::<ToolbarState>().contents.snapshot()
}
