//! Markdown export: structured tree to markdown tree to text.

use std::rc::Rc;

use crate::engine::Node;
use crate::error::ExportError;
use crate::markdown::{MdKind, MdNode, Serializer, ToMarkdownExtension, ToMarkdownOptions};
use crate::registry::Registries;

pub trait ExportVisitor {
    fn name(&self) -> &'static str;

    fn test_node(&self, node: &Node) -> bool;

    /// # Errors
    /// A descendant with no matching visitor.
    fn visit(&self, node: &Node, ctx: &mut ExportContext<'_>) -> Result<(), ExportError>;
}

pub struct ExportContext<'v> {
    visitors: &'v [&'static dyn ExportVisitor],
    stack: Vec<MdNode>,
}

impl<'v> ExportContext<'v> {
    fn new(visitors: &'v [&'static dyn ExportVisitor]) -> Self {
        Self {
            visitors,
            stack: vec![MdNode::new(MdKind::Root)],
        }
    }

    /// The markdown node currently being filled.
    pub fn parent_mut(&mut self) -> Option<&mut MdNode> {
        self.stack.last_mut()
    }

    pub fn append(&mut self, md: MdNode) {
        if let Some(parent) = self.stack.last_mut() {
            parent.children.push(md);
        }
    }

    /// Make `md` the current parent, export `node`'s children into it, then
    /// append it.
    ///
    /// # Errors
    /// As [`Self::visit`].
    pub fn add_and_step_into(&mut self, md: MdNode, node: &Node) -> Result<(), ExportError> {
        self.stack.push(md);
        let result = self.visit_children(node);
        let md = self.stack.pop();
        result?;
        if let Some(md) = md {
            self.append(md);
        }
        Ok(())
    }

    /// # Errors
    /// As [`Self::visit`].
    pub fn visit_children(&mut self, node: &Node) -> Result<(), ExportError> {
        for child in &node.children {
            self.visit(child)?;
        }
        Ok(())
    }

    /// Dispatch to the first visitor that accepts `node`.
    ///
    /// # Errors
    /// [`ExportError::MissingVisitor`]: a plugin gap, never user input.
    pub fn visit(&mut self, node: &Node) -> Result<(), ExportError> {
        let Some(visitor) = self.visitors.iter().copied().find(|v| v.test_node(node)) else {
            return Err(ExportError::MissingVisitor {
                kind: node.kind().name(),
            });
        };
        tracing::trace!(visitor = visitor.name(), node = node.kind().name(), "export visit");
        visitor.visit(node, self)
    }
}

#[derive(Clone)]
pub struct ExportPipeline {
    pub visitors: Rc<[&'static dyn ExportVisitor]>,
    pub extensions: Rc<[&'static dyn ToMarkdownExtension]>,
    pub options: ToMarkdownOptions,
}

impl ExportPipeline {
    pub fn from_registries(registries: &Registries, options: ToMarkdownOptions) -> Self {
        Self {
            visitors: registries.export_visitors.snapshot(),
            extensions: registries.to_markdown_extensions.snapshot(),
            options,
        }
    }

    /// Convert the structured tree under `root` to a markdown tree.
    ///
    /// # Errors
    /// As [`ExportContext::visit`].
    pub fn to_tree(&self, root: &Node) -> Result<MdNode, ExportError> {
        let mut ctx = ExportContext::new(&self.visitors);
        ctx.visit_children(root)?;
        Ok(ctx.stack.pop().unwrap_or_else(|| MdNode::new(MdKind::Root)))
    }

    /// Export and serialize, untrimmed.
    ///
    /// # Errors
    /// Missing visitors and serializer gaps.
    pub fn run(&self, root: &Node) -> Result<String, ExportError> {
        let md = self.to_tree(root)?;
        let text = Serializer::new(&self.options, &self.extensions).serialize(&md)?;
        tracing::debug!(bytes = text.len(), "markdown exported");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Editor, NodeData, NodeKind, TextFormat};

    struct ParagraphExport;

    impl ExportVisitor for ParagraphExport {
        fn name(&self) -> &'static str {
            "paragraph"
        }
        fn test_node(&self, node: &Node) -> bool {
            matches!(node.data, NodeData::Paragraph)
        }
        fn visit(&self, node: &Node, ctx: &mut ExportContext<'_>) -> Result<(), ExportError> {
            ctx.add_and_step_into(MdNode::new(MdKind::Paragraph), node)
        }
    }

    static PARAGRAPH: ParagraphExport = ParagraphExport;

    #[test]
    fn test_missing_visitor_is_fatal() {
        let editor = Editor::new([NodeKind::PARAGRAPH, NodeKind::TEXT]);
        editor
            .update(|txn| {
                let mut para = txn.create(NodeData::Paragraph).unwrap();
                para.children.push(
                    txn.create(NodeData::Text {
                        text: "x".to_string(),
                        format: TextFormat::default(),
                    })
                    .unwrap(),
                );
                txn.replace_root_children(vec![para]);
            })
            .unwrap();
        let pipeline = ExportPipeline {
            visitors: Rc::from(vec![&PARAGRAPH as &'static dyn ExportVisitor]),
            extensions: Rc::from(Vec::new()),
            options: ToMarkdownOptions::default(),
        };
        let err = pipeline.run(editor.state().root()).unwrap_err();
        assert!(matches!(err, ExportError::MissingVisitor { kind: "text" }));
    }

    #[test]
    fn test_empty_tree_exports_empty_text() {
        let editor = Editor::new([NodeKind::PARAGRAPH]);
        let pipeline = ExportPipeline {
            visitors: Rc::from(Vec::new()),
            extensions: Rc::from(Vec::new()),
            options: ToMarkdownOptions::default(),
        };
        assert_eq!(pipeline.run(editor.state().root()).unwrap(), "");
    }
}
