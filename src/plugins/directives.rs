//! Generic directives (`:::name{attrs}` containers and `::name[label]{attrs}`
//! leaves). Every directive imports as one decorator node; descriptors only
//! decide which editor a host shows for it.

use std::fmt;
use std::rc::Rc;

use crate::engine::{Node, NodeData, NodeKey, NodeKind};
use crate::error::{ExportError, ImportError, SerializeError, SessionError};
use crate::export::{ExportContext, ExportVisitor};
use crate::import::{ImportContext, ImportVisitor};
use crate::markdown::directive::{DIRECTIVE_SYNTAX, format_attributes};
use crate::markdown::{DirectiveKind, MdKind, MdNode, Serializer, ToMarkdownExtension};
use crate::plugin::Plugin;
use crate::registry::Registry;
use crate::session::Session;

type TestFn = Box<dyn Fn(&MdNode) -> bool>;

pub struct DirectiveDescriptor {
    pub name: &'static str,
    /// Attribute names an editor should offer.
    pub attributes: Vec<&'static str>,
    /// Whether the directive carries markdown content of its own.
    pub has_children: bool,
    pub kind: Option<DirectiveKind>,
    test: TestFn,
}

impl DirectiveDescriptor {
    pub fn new(name: &'static str, test: impl Fn(&MdNode) -> bool + 'static) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            has_children: false,
            kind: None,
            test: Box::new(test),
        }
    }

    /// A descriptor for every directive called `name`.
    pub fn named(name: &'static str) -> Self {
        Self::new(name, move |node| {
            matches!(&node.kind, MdKind::Directive { name: found, .. } if found == name)
        })
    }

    #[must_use]
    pub fn with_attributes(mut self, attributes: Vec<&'static str>) -> Self {
        self.attributes = attributes;
        self
    }

    #[must_use]
    pub const fn with_children(mut self, has_children: bool) -> Self {
        self.has_children = has_children;
        self
    }

    #[must_use]
    pub const fn of_kind(mut self, kind: DirectiveKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn test_node(&self, node: &MdNode) -> bool {
        let kind_matches = match (&node.kind, self.kind) {
            (MdKind::Directive { directive, .. }, Some(kind)) => *directive == kind,
            (MdKind::Directive { .. }, None) => true,
            _ => false,
        };
        kind_matches && (self.test)(node)
    }
}

impl fmt::Debug for DirectiveDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectiveDescriptor")
            .field("name", &self.name)
            .field("attributes", &self.attributes)
            .field("has_children", &self.has_children)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct DirectivesState {
    pub descriptors: Registry<Rc<DirectiveDescriptor>>,
}

#[derive(Debug, Default)]
pub struct DirectivesPluginParams {
    pub directive_descriptors: Vec<Rc<DirectiveDescriptor>>,
}

#[derive(Debug, Default)]
pub struct DirectivesPlugin {
    params: DirectivesPluginParams,
}

impl DirectivesPlugin {
    pub const fn new(params: DirectivesPluginParams) -> Self {
        Self { params }
    }
}

impl Plugin for DirectivesPlugin {
    fn name(&self) -> &'static str {
        "directives"
    }

    fn init(&self, session: &Session) -> anyhow::Result<()> {
        let registries = session.registries();
        registries.node_kinds.append(NodeKind::DIRECTIVE);
        registries.syntax_extensions.append(&DIRECTIVE_SYNTAX);
        registries.import_visitors.append(&DIRECTIVE_IMPORT);
        registries.export_visitors.append(&DIRECTIVE_EXPORT);
        registries.to_markdown_extensions.append(&DIRECTIVE_MARKDOWN);
        Ok(())
    }

    fn update(&self, session: &Session) {
        session
            .state::<DirectivesState>()
            .descriptors
            .replace(self.params.directive_descriptors.iter().cloned());
    }
}

/// First descriptor, in configuration order, that accepts `node`.
pub fn directive_descriptor_for(session: &Session, node: &MdNode) -> Option<Rc<DirectiveDescriptor>> {
    session
        .state::<DirectivesState>()
        .descriptors
        .snapshot()
        .iter()
        .find(|descriptor| descriptor.test_node(node))
        .cloned()
}

/// Insert an empty directive after the selection.
///
/// # Errors
/// As [`Session::insert_decorator_node`].
pub fn insert_directive(
    session: &Session,
    kind: DirectiveKind,
    name: &str,
    attributes: Vec<(String, String)>,
) -> Result<Option<NodeKey>, SessionError> {
    let md = MdNode::new(MdKind::Directive {
        directive: kind,
        name: name.to_string(),
        attributes,
    });
    session.insert_decorator_node(&|txn| txn.create(NodeData::Directive(md.clone())))
}

struct DirectiveImport;
struct DirectiveExport;
struct DirectiveMarkdown;

static DIRECTIVE_IMPORT: DirectiveImport = DirectiveImport;
static DIRECTIVE_EXPORT: DirectiveExport = DirectiveExport;
static DIRECTIVE_MARKDOWN: DirectiveMarkdown = DirectiveMarkdown;

impl ImportVisitor for DirectiveImport {
    fn name(&self) -> &'static str {
        "directive"
    }

    fn test_node(&self, node: &MdNode) -> bool {
        matches!(node.kind, MdKind::Directive { .. })
    }

    fn visit(&self, node: &MdNode, ctx: &mut ImportContext<'_, '_>) -> Result<(), ImportError> {
        let directive = ctx.create(NodeData::Directive(node.without_positions()))?;
        ctx.append(directive);
        Ok(())
    }
}

impl ExportVisitor for DirectiveExport {
    fn name(&self) -> &'static str {
        "directive"
    }

    fn test_node(&self, node: &Node) -> bool {
        matches!(node.data, NodeData::Directive(_))
    }

    fn visit(&self, node: &Node, ctx: &mut ExportContext<'_>) -> Result<(), ExportError> {
        if let NodeData::Directive(md) = &node.data {
            ctx.append(md.clone());
        }
        Ok(())
    }
}

impl ToMarkdownExtension for DirectiveMarkdown {
    fn name(&self) -> &'static str {
        "directive"
    }

    fn handles(&self, node: &MdNode) -> bool {
        matches!(node.kind, MdKind::Directive { .. })
    }

    fn render(&self, node: &MdNode, serializer: &Serializer<'_>) -> Result<String, SerializeError> {
        let MdKind::Directive {
            directive,
            name,
            attributes,
        } = &node.kind
        else {
            return Err(SerializeError::UnhandledNode {
                kind: node.type_name(),
            });
        };
        let attributes = format_attributes(attributes);
        match directive {
            DirectiveKind::Container => {
                let body = serializer.blocks(&node.children)?;
                if body.is_empty() {
                    Ok(format!(":::{name}{attributes}\n:::"))
                } else {
                    Ok(format!(":::{name}{attributes}\n{body}\n:::"))
                }
            }
            DirectiveKind::Leaf | DirectiveKind::Text => {
                let label = serializer.inline(&node.children)?;
                let label = if label.is_empty() {
                    String::new()
                } else {
                    format!("[{label}]")
                };
                let colons = if *directive == DirectiveKind::Leaf { "::" } else { ":" };
                Ok(format!("{colons}{name}{label}{attributes}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::ToMarkdownOptions;

    fn render(node: &MdNode) -> String {
        let options = ToMarkdownOptions::default();
        let extensions: [&'static dyn ToMarkdownExtension; 1] = [&DIRECTIVE_MARKDOWN];
        Serializer::new(&options, &extensions).block(node).unwrap()
    }

    #[test]
    fn test_container_wraps_body() {
        let node = MdNode::with_children(
            MdKind::Directive {
                directive: DirectiveKind::Container,
                name: "note".to_string(),
                attributes: vec![("class".to_string(), "warn".to_string())],
            },
            vec![MdNode::with_children(
                MdKind::Paragraph,
                vec![MdNode::text("Careful")],
            )],
        );
        assert_eq!(render(&node), ":::note{.warn}\nCareful\n:::");
    }

    #[test]
    fn test_leaf_with_label() {
        let node = MdNode::with_children(
            MdKind::Directive {
                directive: DirectiveKind::Leaf,
                name: "youtube".to_string(),
                attributes: vec![("id".to_string(), "abc".to_string())],
            },
            vec![MdNode::text("Intro")],
        );
        assert_eq!(render(&node), "::youtube[Intro]{#abc}");
    }

    #[test]
    fn test_descriptor_kind_filter() {
        let leaf = MdNode::new(MdKind::Directive {
            directive: DirectiveKind::Leaf,
            name: "note".to_string(),
            attributes: Vec::new(),
        });
        let any = DirectiveDescriptor::named("note");
        let containers = DirectiveDescriptor::named("note").of_kind(DirectiveKind::Container);
        assert!(any.test_node(&leaf));
        assert!(!containers.test_node(&leaf));
    }
}
