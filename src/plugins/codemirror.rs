use std::cell::RefCell;
use std::rc::Rc;

use crate::plugin::Plugin;
use crate::session::Session;

use super::code_block::{CodeBlockEditorDescriptor, CodeBlockState};

/// Language key to display label.
pub type LanguageMap = Vec<(String, String)>;

#[derive(Debug, Default)]
pub struct CodeMirrorState {
    languages: RefCell<LanguageMap>,
}

impl CodeMirrorState {
    pub fn languages(&self) -> LanguageMap {
        self.languages.borrow().clone()
    }

    fn handles(&self, language: &str) -> bool {
        self.languages.borrow().iter().any(|(key, _)| key == language)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeMirrorPluginParams {
    pub code_block_languages: LanguageMap,
}

/// Registers a code editor for every block whose language is in the map and
/// that carries no meta string. Needs the code block plugin before it.
pub struct CodeMirrorPlugin {
    params: CodeMirrorPluginParams,
}

impl CodeMirrorPlugin {
    pub const fn new(params: CodeMirrorPluginParams) -> Self {
        Self { params }
    }
}

impl Plugin for CodeMirrorPlugin {
    fn name(&self) -> &'static str {
        "codemirror"
    }

    fn init(&self, session: &Session) -> anyhow::Result<()> {
        let state = session.state::<CodeMirrorState>();
        let descriptor = CodeBlockEditorDescriptor::new("codemirror", 1, move |language, meta| {
            meta.is_empty() && state.handles(language)
        });
        session
            .state::<CodeBlockState>()
            .descriptors
            .append(Rc::new(descriptor));
        Ok(())
    }

    fn update(&self, session: &Session) {
        *session.state::<CodeMirrorState>().languages.borrow_mut() =
            self.params.code_block_languages.clone();
    }
}
