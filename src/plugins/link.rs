use crate::engine::{Node, NodeData, NodeKind};
use crate::error::{ExportError, ImportError};
use crate::export::{ExportContext, ExportVisitor};
use crate::import::{ImportContext, ImportVisitor};
use crate::markdown::{ComrakSyntax, MdKind, MdNode};
use crate::plugin::Plugin;
use crate::session::Session;

/// Bare URLs become links.
pub static AUTOLINK: ComrakSyntax = ComrakSyntax::new("autolink", |options| options.autolink = true);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkPluginParams {
    pub disable_auto_link: bool,
}

pub struct LinkPlugin {
    params: LinkPluginParams,
}

impl LinkPlugin {
    pub const fn new(params: LinkPluginParams) -> Self {
        Self { params }
    }
}

impl Default for LinkPlugin {
    fn default() -> Self {
        Self::new(LinkPluginParams::default())
    }
}

impl Plugin for LinkPlugin {
    fn name(&self) -> &'static str {
        "link"
    }

    fn init(&self, session: &Session) -> anyhow::Result<()> {
        let registries = session.registries();
        registries.node_kinds.append(NodeKind::LINK);
        if !self.params.disable_auto_link {
            registries.syntax_extensions.append(&AUTOLINK);
        }
        registries.import_visitors.append(&LINK_IMPORT);
        registries.export_visitors.append(&LINK_EXPORT);
        Ok(())
    }
}

struct LinkImport;
struct LinkExport;

static LINK_IMPORT: LinkImport = LinkImport;
static LINK_EXPORT: LinkExport = LinkExport;

impl ImportVisitor for LinkImport {
    fn name(&self) -> &'static str {
        "link"
    }

    fn test_node(&self, node: &MdNode) -> bool {
        matches!(node.kind, MdKind::Link { .. })
    }

    fn visit(&self, node: &MdNode, ctx: &mut ImportContext<'_, '_>) -> Result<(), ImportError> {
        let MdKind::Link { url, title } = &node.kind else {
            return Ok(());
        };
        let link = ctx.create(NodeData::Link {
            url: url.clone(),
            title: title.clone(),
        })?;
        ctx.add_and_step_into(link, node)
    }
}

impl ExportVisitor for LinkExport {
    fn name(&self) -> &'static str {
        "link"
    }

    fn test_node(&self, node: &Node) -> bool {
        matches!(node.data, NodeData::Link { .. })
    }

    fn visit(&self, node: &Node, ctx: &mut ExportContext<'_>) -> Result<(), ExportError> {
        let NodeData::Link { url, title } = &node.data else {
            return Ok(());
        };
        let link = MdNode::new(MdKind::Link {
            url: url.clone(),
            title: title.clone(),
        });
        ctx.add_and_step_into(link, node)
    }
}
