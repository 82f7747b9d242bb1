use crate::engine::{Node, NodeData, NodeKind};
use crate::error::{ExportError, ImportError};
use crate::export::{ExportContext, ExportVisitor};
use crate::import::{ImportContext, ImportVisitor};
use crate::markdown::{MdKind, MdNode};
use crate::plugin::Plugin;
use crate::session::Session;

/// Block quotes. The quote keeps its paragraphs as children.
#[derive(Debug, Default)]
pub struct QuotePlugin;

impl Plugin for QuotePlugin {
    fn name(&self) -> &'static str {
        "quote"
    }

    fn init(&self, session: &Session) -> anyhow::Result<()> {
        let registries = session.registries();
        registries.node_kinds.append(NodeKind::QUOTE);
        registries.import_visitors.append(&QUOTE_IMPORT);
        registries.export_visitors.append(&QUOTE_EXPORT);
        Ok(())
    }
}

struct QuoteImport;
struct QuoteExport;

static QUOTE_IMPORT: QuoteImport = QuoteImport;
static QUOTE_EXPORT: QuoteExport = QuoteExport;

impl ImportVisitor for QuoteImport {
    fn name(&self) -> &'static str {
        "blockquote"
    }

    fn test_node(&self, node: &MdNode) -> bool {
        node.kind == MdKind::Blockquote
    }

    fn visit(&self, node: &MdNode, ctx: &mut ImportContext<'_, '_>) -> Result<(), ImportError> {
        let quote = ctx.create(NodeData::Quote)?;
        ctx.add_and_step_into(quote, node)
    }
}

impl ExportVisitor for QuoteExport {
    fn name(&self) -> &'static str {
        "quote"
    }

    fn test_node(&self, node: &Node) -> bool {
        node.data == NodeData::Quote
    }

    fn visit(&self, node: &Node, ctx: &mut ExportContext<'_>) -> Result<(), ExportError> {
        ctx.add_and_step_into(MdNode::new(MdKind::Blockquote), node)
    }
}
