use std::cell::Cell;
use std::rc::Rc;

use crate::engine::{Editor, Node, NodeData, NodeKind};
use crate::error::{ExportError, ImportError, SerializeError, SessionError};
use crate::export::{ExportContext, ExportVisitor};
use crate::import::{ImportContext, ImportVisitor};
use crate::markdown::{ComrakSyntax, MdKind, MdNode, Serializer, ToMarkdownExtension};
use crate::plugin::Plugin;
use crate::session::{Session, Subscription};

pub static YAML_FRONTMATTER: ComrakSyntax = ComrakSyntax::new("frontmatter", |options| {
    options.front_matter_delimiter = Some("---".to_string());
});

/// Placeholder entry of freshly inserted frontmatter.
const EMPTY_FRONTMATTER: &str = r#""": """#;

#[derive(Debug, Default)]
pub struct FrontmatterState {
    has_frontmatter: Cell<bool>,
}

#[derive(Debug, Default)]
pub struct FrontmatterPlugin;

impl Plugin for FrontmatterPlugin {
    fn name(&self) -> &'static str {
        "frontmatter"
    }

    fn init(&self, session: &Session) -> anyhow::Result<()> {
        let registries = session.registries();
        registries.node_kinds.append(NodeKind::FRONTMATTER);
        registries.syntax_extensions.append(&YAML_FRONTMATTER);
        registries.import_visitors.append(&FRONTMATTER_IMPORT);
        registries.export_visitors.append(&FRONTMATTER_EXPORT);
        registries.to_markdown_extensions.append(&FRONTMATTER_MARKDOWN);
        registries
            .root_subscriptions
            .append(frontmatter_tracking(session.state::<FrontmatterState>()));
        Ok(())
    }
}

/// Whether the document currently starts with frontmatter.
pub fn has_frontmatter(session: &Session) -> bool {
    session.state::<FrontmatterState>().has_frontmatter.get()
}

fn frontmatter_tracking(state: Rc<FrontmatterState>) -> Subscription {
    Rc::new(move |root: &Editor| {
        let state = Rc::clone(&state);
        root.register_update_listener(move |payload| {
            state.has_frontmatter.set(starts_with_frontmatter(payload.state.root()));
            Ok(())
        })
    })
}

fn starts_with_frontmatter(root: &Node) -> bool {
    root.children
        .first()
        .is_some_and(|first| matches!(first.data, NodeData::Frontmatter { .. }))
}

/// Put an empty frontmatter block at the top of the document, unless one is
/// already there.
///
/// # Errors
/// Read-only documents.
pub fn insert_frontmatter(session: &Session) -> Result<(), SessionError> {
    let Some(root) = session.root_editor() else {
        return Ok(());
    };
    root.edit(|txn| -> Result<(), crate::engine::EngineError> {
        if starts_with_frontmatter(txn.root()) {
            return Ok(());
        }
        let frontmatter = txn.create(NodeData::Frontmatter {
            yaml: EMPTY_FRONTMATTER.to_string(),
        })?;
        txn.root_mut().children.insert(0, frontmatter);
        Ok(())
    })??;
    Ok(())
}

/// Drop the frontmatter block at the top of the document, if any.
///
/// # Errors
/// Read-only documents.
pub fn remove_frontmatter(session: &Session) -> Result<(), SessionError> {
    let Some(root) = session.root_editor() else {
        return Ok(());
    };
    root.edit(|txn| {
        if starts_with_frontmatter(txn.root()) {
            txn.root_mut().children.remove(0);
        }
    })?;
    Ok(())
}

struct FrontmatterImport;
struct FrontmatterExport;
struct FrontmatterMarkdown;

static FRONTMATTER_IMPORT: FrontmatterImport = FrontmatterImport;
static FRONTMATTER_EXPORT: FrontmatterExport = FrontmatterExport;
static FRONTMATTER_MARKDOWN: FrontmatterMarkdown = FrontmatterMarkdown;

impl ImportVisitor for FrontmatterImport {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn test_node(&self, node: &MdNode) -> bool {
        matches!(node.kind, MdKind::Yaml { .. })
    }

    fn visit(&self, node: &MdNode, ctx: &mut ImportContext<'_, '_>) -> Result<(), ImportError> {
        let MdKind::Yaml { value } = &node.kind else {
            return Ok(());
        };
        let frontmatter = ctx.create(NodeData::Frontmatter {
            yaml: value.clone(),
        })?;
        ctx.append(frontmatter);
        Ok(())
    }
}

impl ExportVisitor for FrontmatterExport {
    fn name(&self) -> &'static str {
        "frontmatter"
    }

    fn test_node(&self, node: &Node) -> bool {
        matches!(node.data, NodeData::Frontmatter { .. })
    }

    fn visit(&self, node: &Node, ctx: &mut ExportContext<'_>) -> Result<(), ExportError> {
        if let NodeData::Frontmatter { yaml } = &node.data {
            ctx.append(MdNode::new(MdKind::Yaml { value: yaml.clone() }));
        }
        Ok(())
    }
}

impl ToMarkdownExtension for FrontmatterMarkdown {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn handles(&self, node: &MdNode) -> bool {
        matches!(node.kind, MdKind::Yaml { .. })
    }

    fn render(&self, node: &MdNode, _serializer: &Serializer<'_>) -> Result<String, SerializeError> {
        let MdKind::Yaml { value } = &node.kind else {
            return Err(SerializeError::UnhandledNode {
                kind: node.type_name(),
            });
        };
        Ok(format!("---\n{}\n---", value.trim_end()))
    }
}
