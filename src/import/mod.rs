//! Markdown import: text to markdown tree to structured tree.
//!
//! One top-down walk. Each markdown node goes to the first registered
//! [`ImportVisitor`] whose `test_node` accepts it; visitors with
//! overlapping predicates are resolved by registration order alone.

use std::rc::Rc;

use crate::engine::{FormatKind, Node, NodeData, NodeKind, TextFormat, Transaction};
use crate::error::{ImportError, ParseError};
use crate::markdown::{MdNode, SyntaxExtension, TreeExtension, parse_markdown};
use crate::registry::Registries;

pub trait ImportVisitor {
    fn name(&self) -> &'static str;

    fn test_node(&self, node: &MdNode) -> bool;

    /// Produce structured nodes for `node` through `ctx`, recursing into its
    /// children as needed.
    ///
    /// # Errors
    /// Unregistered node kinds and unrecognized descendants.
    fn visit(&self, node: &MdNode, ctx: &mut ImportContext<'_, '_>) -> Result<(), ImportError>;
}

/// Build state of one import walk.
pub struct ImportContext<'t, 'a> {
    txn: &'t Transaction<'a>,
    visitors: &'t [&'static dyn ImportVisitor],
    source: &'t str,
    stack: Vec<Node>,
    format: TextFormat,
}

impl<'t, 'a> ImportContext<'t, 'a> {
    fn new(
        txn: &'t Transaction<'a>,
        visitors: &'t [&'static dyn ImportVisitor],
        source: &'t str,
    ) -> Self {
        // A detached root: nothing touches the live tree until the walk
        // has fully succeeded.
        Self {
            txn,
            visitors,
            source,
            stack: vec![Node::root()],
            format: TextFormat::default(),
        }
    }

    /// Create a node with a fresh key.
    ///
    /// # Errors
    /// The node kind was not registered.
    pub fn create(&self, data: NodeData) -> Result<Node, ImportError> {
        Ok(self.txn.create(data)?)
    }

    /// Formats inherited from enclosing emphasis-like nodes.
    pub const fn format(&self) -> TextFormat {
        self.format
    }

    /// Kind of the node currently being filled.
    pub fn parent_kind(&self) -> Option<NodeKind> {
        (self.stack.len() > 1).then(|| self.stack[self.stack.len() - 1].kind())
    }

    /// Append a finished node to the current parent.
    pub fn append(&mut self, node: Node) {
        if let Some(parent) = self.stack.last_mut() {
            parent.children.push(node);
        }
    }

    /// Make `node` the current parent, import `md`'s children into it, then
    /// append it to its own parent.
    ///
    /// # Errors
    /// As [`Self::visit`].
    pub fn add_and_step_into(&mut self, node: Node, md: &MdNode) -> Result<(), ImportError> {
        self.stack.push(node);
        let result = self.visit_children(md);
        let node = self.stack.pop();
        result?;
        if let Some(node) = node {
            self.append(node);
        }
        Ok(())
    }

    /// # Errors
    /// As [`Self::visit`].
    pub fn visit_children(&mut self, md: &MdNode) -> Result<(), ImportError> {
        for child in &md.children {
            self.visit(child)?;
        }
        Ok(())
    }

    /// Import `md`'s children with `kind` switched on.
    ///
    /// # Errors
    /// As [`Self::visit`].
    pub fn with_format(&mut self, kind: FormatKind, md: &MdNode) -> Result<(), ImportError> {
        let saved = self.format;
        self.format = saved.with(kind, true);
        let result = self.visit_children(md);
        self.format = saved;
        result
    }

    /// Dispatch one markdown node to the first visitor that accepts it.
    ///
    /// # Errors
    /// [`ImportError::Unrecognized`] when no visitor accepts the node.
    pub fn visit(&mut self, md: &MdNode) -> Result<(), ImportError> {
        let Some(visitor) = self.visitors.iter().copied().find(|v| v.test_node(md)) else {
            return Err(ImportError::Unrecognized {
                kind: md.type_name(),
                snippet: self.snippet(md),
            });
        };
        tracing::trace!(visitor = visitor.name(), node = md.type_name(), "import visit");
        visitor.visit(md, self)
    }

    /// Source text of `md`, for diagnostics.
    fn snippet(&self, md: &MdNode) -> String {
        let Some(position) = md.position else {
            return md.type_name().to_string();
        };
        let text: Vec<&str> = self
            .source
            .lines()
            .skip(position.start_line.saturating_sub(1))
            .take(position.end_line + 1 - position.start_line.max(1))
            .collect();
        let text = text.join("\n");
        let text = text.trim_end();
        if text.is_empty() {
            md.type_name().to_string()
        } else {
            text.to_string()
        }
    }
}

/// Snapshot of the registries an import needs.
#[derive(Clone)]
pub struct ImportPipeline {
    pub syntax: Rc<[&'static dyn SyntaxExtension]>,
    pub tree: Rc<[&'static dyn TreeExtension]>,
    pub visitors: Rc<[&'static dyn ImportVisitor]>,
}

impl ImportPipeline {
    pub fn from_registries(registries: &Registries) -> Self {
        Self {
            syntax: registries.syntax_extensions.snapshot(),
            tree: registries.tree_extensions.snapshot(),
            visitors: registries.import_visitors.snapshot(),
        }
    }

    /// # Errors
    /// Malformed markdown.
    pub fn parse(&self, source: &str) -> Result<MdNode, ParseError> {
        parse_markdown(source, &self.syntax, &self.tree)
    }

    /// Parse `source` and build the structured nodes for it. The live tree
    /// is not touched; the caller decides where the nodes go.
    ///
    /// # Errors
    /// Parse errors, unrecognized constructs and unregistered node kinds.
    pub fn build(&self, txn: &Transaction<'_>, source: &str) -> Result<Vec<Node>, ImportError> {
        let md = self.parse(source)?;
        self.build_from_tree(txn, source, &md)
    }

    /// Build structured nodes from an already parsed markdown tree.
    ///
    /// # Errors
    /// As [`Self::build`], minus parse errors.
    pub fn build_from_tree(
        &self,
        txn: &Transaction<'_>,
        source: &str,
        md: &MdNode,
    ) -> Result<Vec<Node>, ImportError> {
        let mut ctx = ImportContext::new(txn, &self.visitors, source);
        ctx.visit_children(md)?;
        let root = ctx.stack.pop().map(|root| root.children).unwrap_or_default();
        tracing::debug!(blocks = root.len(), "markdown imported");
        Ok(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Editor;
    use crate::markdown::MdKind;

    struct ParagraphVisitor;
    struct TextVisitor;
    struct ShoutingTextVisitor;

    impl ImportVisitor for ParagraphVisitor {
        fn name(&self) -> &'static str {
            "paragraph"
        }
        fn test_node(&self, node: &MdNode) -> bool {
            node.kind == MdKind::Paragraph
        }
        fn visit(&self, node: &MdNode, ctx: &mut ImportContext<'_, '_>) -> Result<(), ImportError> {
            let para = ctx.create(NodeData::Paragraph)?;
            ctx.add_and_step_into(para, node)
        }
    }

    impl ImportVisitor for TextVisitor {
        fn name(&self) -> &'static str {
            "text"
        }
        fn test_node(&self, node: &MdNode) -> bool {
            matches!(node.kind, MdKind::Text { .. })
        }
        fn visit(&self, node: &MdNode, ctx: &mut ImportContext<'_, '_>) -> Result<(), ImportError> {
            let text = ctx.create(NodeData::Text {
                text: node.text_content(),
                format: ctx.format(),
            })?;
            ctx.append(text);
            Ok(())
        }
    }

    impl ImportVisitor for ShoutingTextVisitor {
        fn name(&self) -> &'static str {
            "shouting-text"
        }
        fn test_node(&self, node: &MdNode) -> bool {
            matches!(node.kind, MdKind::Text { .. })
        }
        fn visit(&self, node: &MdNode, ctx: &mut ImportContext<'_, '_>) -> Result<(), ImportError> {
            let text = ctx.create(NodeData::Text {
                text: node.text_content().to_uppercase(),
                format: ctx.format(),
            })?;
            ctx.append(text);
            Ok(())
        }
    }

    static PARAGRAPH: ParagraphVisitor = ParagraphVisitor;
    static TEXT: TextVisitor = TextVisitor;
    static SHOUTING: ShoutingTextVisitor = ShoutingTextVisitor;

    fn pipeline(visitors: Vec<&'static dyn ImportVisitor>) -> ImportPipeline {
        ImportPipeline {
            syntax: Rc::from(Vec::new()),
            tree: Rc::from(Vec::new()),
            visitors: Rc::from(visitors),
        }
    }

    fn editor() -> Editor {
        Editor::new([NodeKind::PARAGRAPH, NodeKind::TEXT])
    }

    #[test]
    fn test_first_registered_visitor_wins() {
        let pipeline = pipeline(vec![&PARAGRAPH, &SHOUTING, &TEXT]);
        let nodes = editor()
            .update(|txn| pipeline.build(txn, "quiet\n"))
            .unwrap()
            .unwrap();
        assert_eq!(nodes[0].text_content(), "QUIET");
    }

    #[test]
    fn test_unrecognized_node_reports_source_snippet() {
        let pipeline = pipeline(vec![&PARAGRAPH, &TEXT]);
        let err = editor()
            .update(|txn| pipeline.build(txn, "para\n\n# Heading\n"))
            .unwrap()
            .unwrap_err();
        let ImportError::Unrecognized { kind, snippet } = err else {
            panic!("expected unrecognized, got {err:?}");
        };
        assert_eq!(kind, "heading");
        assert_eq!(snippet, "# Heading");
    }

    #[test]
    fn test_build_leaves_live_tree_alone() {
        let editor = editor();
        let pipeline = pipeline(vec![&PARAGRAPH, &TEXT]);
        editor.update(|txn| pipeline.build(txn, "x\n")).unwrap().unwrap();
        assert!(editor.state().root().children.is_empty());
    }
}
