use crate::engine::{Node, NodeData, NodeKey, NodeKind};
use crate::error::{ExportError, ImportError, SessionError};
use crate::export::{ExportContext, ExportVisitor};
use crate::import::{ImportContext, ImportVisitor};
use crate::markdown::{MdKind, MdNode};
use crate::plugin::Plugin;
use crate::session::Session;

/// Inline images (`![alt](src "title")`).
#[derive(Debug, Default)]
pub struct ImagePlugin;

impl Plugin for ImagePlugin {
    fn name(&self) -> &'static str {
        "image"
    }

    fn init(&self, session: &Session) -> anyhow::Result<()> {
        let registries = session.registries();
        registries.node_kinds.append(NodeKind::IMAGE);
        registries.import_visitors.append(&IMAGE_IMPORT);
        registries.export_visitors.append(&IMAGE_EXPORT);
        Ok(())
    }
}

/// Insert an image in its own paragraph after the selection.
///
/// # Errors
/// As [`Session::insert_decorator_node`].
pub fn insert_image(
    session: &Session,
    src: &str,
    alt: &str,
    title: Option<&str>,
) -> Result<Option<NodeKey>, SessionError> {
    session.insert_decorator_node(&|txn| {
        txn.create(NodeData::Image {
            src: src.to_string(),
            alt: alt.to_string(),
            title: title.map(str::to_string),
        })
    })
}

struct ImageImport;
struct ImageExport;

static IMAGE_IMPORT: ImageImport = ImageImport;
static IMAGE_EXPORT: ImageExport = ImageExport;

impl ImportVisitor for ImageImport {
    fn name(&self) -> &'static str {
        "image"
    }

    fn test_node(&self, node: &MdNode) -> bool {
        matches!(node.kind, MdKind::Image { .. })
    }

    fn visit(&self, node: &MdNode, ctx: &mut ImportContext<'_, '_>) -> Result<(), ImportError> {
        let MdKind::Image { url, title, alt } = &node.kind else {
            return Ok(());
        };
        let image = ctx.create(NodeData::Image {
            src: url.clone(),
            alt: alt.clone(),
            title: title.clone(),
        })?;
        ctx.append(image);
        Ok(())
    }
}

impl ExportVisitor for ImageExport {
    fn name(&self) -> &'static str {
        "image"
    }

    fn test_node(&self, node: &Node) -> bool {
        matches!(node.data, NodeData::Image { .. })
    }

    fn visit(&self, node: &Node, ctx: &mut ExportContext<'_>) -> Result<(), ExportError> {
        let NodeData::Image { src, alt, title } = &node.data else {
            return Ok(());
        };
        ctx.append(MdNode::new(MdKind::Image {
            url: src.clone(),
            title: title.clone(),
            alt: alt.clone(),
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::CorePluginParams;

    fn session(markdown: &str) -> Session {
        Session::with_core(CorePluginParams::with_markdown(markdown), vec![Box::new(ImagePlugin)])
            .unwrap()
    }

    #[test]
    fn test_image_imports_inline_and_round_trips() {
        let session = session("Logo ![the *logo*](img/logo.png \"Logo\") here\n");
        assert_eq!(session.error(), None);
        let root = session.root_editor().unwrap();
        let state = root.state();
        let paragraph = &state.root().children[0];
        assert_eq!(
            paragraph.children[1].data,
            NodeData::Image {
                src: "img/logo.png".to_string(),
                alt: "the logo".to_string(),
                title: Some("Logo".to_string()),
            }
        );
        assert_eq!(session.markdown(), "Logo ![the logo](img/logo.png \"Logo\") here");
    }

    #[test]
    fn test_image_without_plugin_is_unsupported() {
        let session = Session::with_core(CorePluginParams::with_markdown("x"), Vec::new()).unwrap();
        session.set_markdown("![i](p.png)").unwrap();
        assert!(session.error().unwrap().error.starts_with("Unsupported markdown syntax"));
    }

    #[test]
    fn test_insert_image_wraps_in_paragraph() {
        let session = session("intro");
        insert_image(&session, "a.png", "a", None).unwrap();
        assert_eq!(session.markdown(), "intro\n\n![a](a.png)");
    }
}
