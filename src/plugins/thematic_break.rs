use crate::engine::{Node, NodeData, NodeKey, NodeKind};
use crate::error::{ExportError, ImportError, SessionError};
use crate::export::{ExportContext, ExportVisitor};
use crate::import::{ImportContext, ImportVisitor};
use crate::markdown::{MdKind, MdNode};
use crate::plugin::Plugin;
use crate::session::Session;

#[derive(Debug, Default)]
pub struct ThematicBreakPlugin;

impl Plugin for ThematicBreakPlugin {
    fn name(&self) -> &'static str {
        "thematic-break"
    }

    fn init(&self, session: &Session) -> anyhow::Result<()> {
        let registries = session.registries();
        registries.node_kinds.append(NodeKind::HORIZONTAL_RULE);
        registries.import_visitors.append(&THEMATIC_BREAK_IMPORT);
        registries.export_visitors.append(&THEMATIC_BREAK_EXPORT);
        Ok(())
    }
}

/// Insert a horizontal rule after the selection.
///
/// # Errors
/// As [`Session::insert_decorator_node`].
pub fn insert_thematic_break(session: &Session) -> Result<Option<NodeKey>, SessionError> {
    session.insert_decorator_node(&|txn| txn.create(NodeData::HorizontalRule))
}

struct ThematicBreakImport;
struct ThematicBreakExport;

static THEMATIC_BREAK_IMPORT: ThematicBreakImport = ThematicBreakImport;
static THEMATIC_BREAK_EXPORT: ThematicBreakExport = ThematicBreakExport;

impl ImportVisitor for ThematicBreakImport {
    fn name(&self) -> &'static str {
        "thematic-break"
    }

    fn test_node(&self, node: &MdNode) -> bool {
        node.kind == MdKind::ThematicBreak
    }

    fn visit(&self, _node: &MdNode, ctx: &mut ImportContext<'_, '_>) -> Result<(), ImportError> {
        let rule = ctx.create(NodeData::HorizontalRule)?;
        ctx.append(rule);
        Ok(())
    }
}

impl ExportVisitor for ThematicBreakExport {
    fn name(&self) -> &'static str {
        "thematic-break"
    }

    fn test_node(&self, node: &Node) -> bool {
        node.data == NodeData::HorizontalRule
    }

    fn visit(&self, _node: &Node, ctx: &mut ExportContext<'_>) -> Result<(), ExportError> {
        ctx.append(MdNode::new(MdKind::ThematicBreak));
        Ok(())
    }
}
