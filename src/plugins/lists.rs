use crate::engine::{Node, NodeData, NodeKind};
use crate::error::{ExportError, ImportError};
use crate::export::{ExportContext, ExportVisitor};
use crate::import::{ImportContext, ImportVisitor};
use crate::markdown::{ComrakSyntax, MdKind, MdNode};
use crate::plugin::Plugin;
use crate::session::Session;

pub static TASK_LIST_ITEMS: ComrakSyntax =
    ComrakSyntax::new("tasklist", |options| options.tasklist = true);

/// Bullet, numbered and check lists.
#[derive(Debug, Default)]
pub struct ListsPlugin;

impl Plugin for ListsPlugin {
    fn name(&self) -> &'static str {
        "lists"
    }

    fn init(&self, session: &Session) -> anyhow::Result<()> {
        let registries = session.registries();
        registries
            .node_kinds
            .extend([NodeKind::LIST, NodeKind::LIST_ITEM]);
        registries.syntax_extensions.append(&TASK_LIST_ITEMS);
        let import: [&'static dyn ImportVisitor; 2] = [&LIST_IMPORT, &LIST_ITEM_IMPORT];
        registries.import_visitors.extend(import);
        let export: [&'static dyn ExportVisitor; 2] = [&LIST_EXPORT, &LIST_ITEM_EXPORT];
        registries.export_visitors.extend(export);
        Ok(())
    }
}

struct ListImport;
struct ListItemImport;
struct ListExport;
struct ListItemExport;

static LIST_IMPORT: ListImport = ListImport;
static LIST_ITEM_IMPORT: ListItemImport = ListItemImport;
static LIST_EXPORT: ListExport = ListExport;
static LIST_ITEM_EXPORT: ListItemExport = ListItemExport;

impl ImportVisitor for ListImport {
    fn name(&self) -> &'static str {
        "list"
    }

    fn test_node(&self, node: &MdNode) -> bool {
        matches!(node.kind, MdKind::List { .. })
    }

    fn visit(&self, node: &MdNode, ctx: &mut ImportContext<'_, '_>) -> Result<(), ImportError> {
        let MdKind::List {
            ordered,
            start,
            spread,
        } = node.kind
        else {
            return Ok(());
        };
        let list = ctx.create(NodeData::List {
            ordered,
            start: start.unwrap_or(1),
            tight: !spread,
        })?;
        ctx.add_and_step_into(list, node)
    }
}

impl ImportVisitor for ListItemImport {
    fn name(&self) -> &'static str {
        "list-item"
    }

    fn test_node(&self, node: &MdNode) -> bool {
        matches!(node.kind, MdKind::ListItem { .. })
    }

    fn visit(&self, node: &MdNode, ctx: &mut ImportContext<'_, '_>) -> Result<(), ImportError> {
        let MdKind::ListItem { checked, .. } = node.kind else {
            return Ok(());
        };
        let item = ctx.create(NodeData::ListItem { checked })?;
        ctx.add_and_step_into(item, node)
    }
}

impl ExportVisitor for ListExport {
    fn name(&self) -> &'static str {
        "list"
    }

    fn test_node(&self, node: &Node) -> bool {
        matches!(node.data, NodeData::List { .. })
    }

    fn visit(&self, node: &Node, ctx: &mut ExportContext<'_>) -> Result<(), ExportError> {
        let NodeData::List {
            ordered,
            start,
            tight,
        } = node.data
        else {
            return Ok(());
        };
        let list = MdNode::new(MdKind::List {
            ordered,
            start: ordered.then_some(start),
            spread: !tight,
        });
        ctx.add_and_step_into(list, node)
    }
}

/// Item spacing comes from the list, so items always export tight.
impl ExportVisitor for ListItemExport {
    fn name(&self) -> &'static str {
        "list-item"
    }

    fn test_node(&self, node: &Node) -> bool {
        matches!(node.data, NodeData::ListItem { .. })
    }

    fn visit(&self, node: &Node, ctx: &mut ExportContext<'_>) -> Result<(), ExportError> {
        let NodeData::ListItem { checked } = node.data else {
            return Ok(());
        };
        let item = MdNode::new(MdKind::ListItem {
            checked,
            spread: false,
        });
        ctx.add_and_step_into(item, node)
    }
}
