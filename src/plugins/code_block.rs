//! Fenced code blocks and the editor descriptors that claim them.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::engine::{Node, NodeData, NodeKey, NodeKind};
use crate::error::{ExportError, ImportError, SessionError};
use crate::export::{ExportContext, ExportVisitor};
use crate::import::{ImportContext, ImportVisitor};
use crate::markdown::{MdKind, MdNode};
use crate::plugin::Plugin;
use crate::registry::Registry;
use crate::session::Session;

type MatchFn = Box<dyn Fn(&str, &str) -> bool>;

/// An editor for code blocks, picked by language and meta string.
pub struct CodeBlockEditorDescriptor {
    pub name: &'static str,
    /// Among matching descriptors the highest priority wins.
    pub priority: i32,
    matches: MatchFn,
}

impl CodeBlockEditorDescriptor {
    pub fn new(
        name: &'static str,
        priority: i32,
        matches: impl Fn(&str, &str) -> bool + 'static,
    ) -> Self {
        Self {
            name,
            priority,
            matches: Box::new(matches),
        }
    }

    pub fn matches(&self, language: &str, meta: &str) -> bool {
        (self.matches)(language, meta)
    }
}

impl fmt::Debug for CodeBlockEditorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeBlockEditorDescriptor")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct CodeBlockState {
    pub descriptors: Registry<Rc<CodeBlockEditorDescriptor>>,
    default_language: RefCell<String>,
}

#[derive(Debug, Default)]
pub struct CodeBlockPluginParams {
    pub code_block_editor_descriptors: Vec<Rc<CodeBlockEditorDescriptor>>,
    /// Language given to blocks inserted without one.
    pub default_code_block_language: String,
}

#[derive(Debug, Default)]
pub struct CodeBlockPlugin {
    params: CodeBlockPluginParams,
}

impl CodeBlockPlugin {
    pub const fn new(params: CodeBlockPluginParams) -> Self {
        Self { params }
    }
}

impl Plugin for CodeBlockPlugin {
    fn name(&self) -> &'static str {
        "code-block"
    }

    fn init(&self, session: &Session) -> anyhow::Result<()> {
        let registries = session.registries();
        registries.node_kinds.append(NodeKind::CODE_BLOCK);
        registries.import_visitors.append(&CODE_BLOCK_IMPORT);
        registries.export_visitors.append(&CODE_BLOCK_EXPORT);
        session
            .state::<CodeBlockState>()
            .descriptors
            .extend(self.params.code_block_editor_descriptors.iter().cloned());
        Ok(())
    }

    fn update(&self, session: &Session) {
        self.params
            .default_code_block_language
            .clone_into(&mut session.state::<CodeBlockState>().default_language.borrow_mut());
    }
}

/// The descriptor that should edit a block with `language` and `meta`.
/// Ties keep registration order.
pub fn code_block_editor_for(
    session: &Session,
    language: &str,
    meta: &str,
) -> Option<Rc<CodeBlockEditorDescriptor>> {
    let descriptors = session.state::<CodeBlockState>().descriptors.snapshot();
    let mut best: Option<&Rc<CodeBlockEditorDescriptor>> = None;
    for descriptor in descriptors.iter() {
        if !descriptor.matches(language, meta) {
            continue;
        }
        if best.is_none_or(|current| descriptor.priority > current.priority) {
            best = Some(descriptor);
        }
    }
    best.cloned()
}

/// Insert a code block after the selection. `None` uses the configured
/// default language.
///
/// # Errors
/// As [`Session::insert_decorator_node`].
pub fn insert_code_block(
    session: &Session,
    language: Option<&str>,
    meta: &str,
    code: &str,
) -> Result<Option<NodeKey>, SessionError> {
    let language = language.map_or_else(
        || session.state::<CodeBlockState>().default_language.borrow().clone(),
        str::to_string,
    );
    session.insert_decorator_node(&|txn| {
        txn.create(NodeData::CodeBlock {
            language: language.clone(),
            meta: meta.to_string(),
            code: code.to_string(),
        })
    })
}

struct CodeBlockImport;
struct CodeBlockExport;

static CODE_BLOCK_IMPORT: CodeBlockImport = CodeBlockImport;
static CODE_BLOCK_EXPORT: CodeBlockExport = CodeBlockExport;

impl ImportVisitor for CodeBlockImport {
    fn name(&self) -> &'static str {
        "code"
    }

    fn test_node(&self, node: &MdNode) -> bool {
        matches!(node.kind, MdKind::Code { .. })
    }

    fn visit(&self, node: &MdNode, ctx: &mut ImportContext<'_, '_>) -> Result<(), ImportError> {
        let MdKind::Code { lang, meta, value } = &node.kind else {
            return Ok(());
        };
        let block = ctx.create(NodeData::CodeBlock {
            language: lang.clone().unwrap_or_default(),
            meta: meta.clone().unwrap_or_default(),
            code: value.clone(),
        })?;
        ctx.append(block);
        Ok(())
    }
}

impl ExportVisitor for CodeBlockExport {
    fn name(&self) -> &'static str {
        "code-block"
    }

    fn test_node(&self, node: &Node) -> bool {
        matches!(node.data, NodeData::CodeBlock { .. })
    }

    fn visit(&self, node: &Node, ctx: &mut ExportContext<'_>) -> Result<(), ExportError> {
        let NodeData::CodeBlock {
            language,
            meta,
            code,
        } = &node.data
        else {
            return Ok(());
        };
        ctx.append(MdNode::new(MdKind::Code {
            lang: (!language.is_empty()).then(|| language.clone()),
            meta: (!meta.is_empty()).then(|| meta.clone()),
            value: code.clone(),
        }));
        Ok(())
    }
}
