use crate::plugin::Plugin;
use crate::session::{Session, UiSlot, ViewMode};

pub const DIFF_SOURCE_WRAPPER: UiSlot = UiSlot("diff-source");

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSourcePluginParams {
    /// Mode the session starts in.
    pub view_mode: ViewMode,
    /// Reference version the diff view compares against.
    pub diff_markdown: String,
}

/// Source and diff views around the rich-text editor.
pub struct DiffSourcePlugin {
    params: DiffSourcePluginParams,
}

impl DiffSourcePlugin {
    pub const fn new(params: DiffSourcePluginParams) -> Self {
        Self { params }
    }
}

impl Plugin for DiffSourcePlugin {
    fn name(&self) -> &'static str {
        "diff-source"
    }

    fn init(&self, session: &Session) -> anyhow::Result<()> {
        session.set_diff_markdown(&self.params.diff_markdown);
        session.registries().editor_wrappers.append(DIFF_SOURCE_WRAPPER);
        session.set_view_mode(self.params.view_mode)?;
        Ok(())
    }

    fn update(&self, session: &Session) {
        session.set_diff_markdown(&self.params.diff_markdown);
    }
}
