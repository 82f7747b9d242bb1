//! The core plugin: paragraphs, text and inline formatting, HTML elements,
//! the export listener and active-editor tracking. Every session built with
//! [`crate::Session::with_core`] has it in front.

use std::rc::Rc;

use crate::engine::{BlurEvent, FocusOptions, FormatKind, Node, NodeData, NodeKind, TextFormat};
use crate::error::{ExportError, ImportError};
use crate::export::{ExportContext, ExportVisitor};
use crate::import::{ImportContext, ImportVisitor};
use crate::markdown::directive::DIRECTIVE_SYNTAX;
use crate::markdown::html::HTML_ELEMENTS;
use crate::markdown::{ComrakSyntax, MdKind, MdNode, SyntaxExtension, ToMarkdownOptions};
use crate::plugin::Plugin;
use crate::session::{
    BlurCallback, Callbacks, ChangeCallback, ErrorCallback, MarkdownError, Session,
    core_subscriptions,
};

pub static STRIKETHROUGH: ComrakSyntax =
    ComrakSyntax::new("strikethrough", |options| options.strikethrough = true);

#[derive(Clone, Default)]
pub struct CorePluginParams {
    pub initial_markdown: String,
    pub placeholder: String,
    /// Focus the root editor once the initial import has settled.
    pub auto_focus: Option<FocusOptions>,
    pub on_change: Option<ChangeCallback>,
    pub on_blur: Option<BlurCallback>,
    pub on_error: Option<ErrorCallback>,
    pub to_markdown_options: ToMarkdownOptions,
    pub read_only: bool,
    /// Treat raw HTML as literal text instead of parsing it into elements.
    pub suppress_html_processing: bool,
}

impl CorePluginParams {
    pub fn with_markdown(markdown: impl Into<String>) -> Self {
        Self {
            initial_markdown: markdown.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn on_change(mut self, f: impl Fn(&str) + 'static) -> Self {
        self.on_change = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn on_error(mut self, f: impl Fn(&MarkdownError) + 'static) -> Self {
        self.on_error = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn on_blur(mut self, f: impl Fn(BlurEvent) + 'static) -> Self {
        self.on_blur = Some(Rc::new(f));
        self
    }
}

pub struct CorePlugin {
    params: CorePluginParams,
}

impl CorePlugin {
    pub const fn new(params: CorePluginParams) -> Self {
        Self { params }
    }
}

impl Plugin for CorePlugin {
    fn name(&self) -> &'static str {
        "core"
    }

    fn init(&self, session: &Session) -> anyhow::Result<()> {
        let registries = session.registries();
        session.set_initial_markdown(&self.params.initial_markdown);

        registries.node_kinds.extend([
            NodeKind::PARAGRAPH,
            NodeKind::TEXT,
            NodeKind::LINE_BREAK,
            NodeKind::GENERIC_HTML,
        ]);
        let syntax: [&'static dyn SyntaxExtension; 2] = [&STRIKETHROUGH, &DIRECTIVE_SYNTAX];
        registries.syntax_extensions.extend(syntax);

        let import: [&'static dyn ImportVisitor; 5] = [
            &PARAGRAPH_IMPORT,
            &TEXT_IMPORT,
            &FORMATTING_IMPORT,
            &INLINE_CODE_IMPORT,
            &BREAK_IMPORT,
        ];
        registries.import_visitors.extend(import);
        let export: [&'static dyn ExportVisitor; 4] = [
            &PARAGRAPH_EXPORT,
            &TEXT_EXPORT,
            &LINE_BREAK_EXPORT,
            &GENERIC_HTML_EXPORT,
        ];
        registries.export_visitors.extend(export);

        if !self.params.suppress_html_processing {
            registries.tree_extensions.append(&HTML_ELEMENTS);
            registries.import_visitors.append(&HTML_ELEMENT_IMPORT);
        }
        registries.import_visitors.append(&RAW_HTML_IMPORT);

        let (root, active) = core_subscriptions(session);
        registries.root_subscriptions.extend(root);
        registries.active_subscriptions.extend(active);
        Ok(())
    }

    fn update(&self, session: &Session) {
        let params = &self.params;
        session.set_placeholder(&params.placeholder);
        match params.to_markdown_options.validate() {
            Ok(()) => session.set_to_markdown_options(params.to_markdown_options.clone()),
            Err(reason) => tracing::warn!(%reason, "ignoring markdown options"),
        }
        session.set_autofocus(params.auto_focus);
        session.set_read_only(params.read_only);
        session.set_callbacks(Callbacks {
            on_change: params.on_change.clone(),
            on_error: params.on_error.clone(),
            on_blur: params.on_blur.clone(),
        });
    }
}

struct ParagraphImport;
struct TextImport;
struct FormattingImport;
struct InlineCodeImport;
struct BreakImport;
struct HtmlElementImport;
struct RawHtmlImport;

static PARAGRAPH_IMPORT: ParagraphImport = ParagraphImport;
static TEXT_IMPORT: TextImport = TextImport;
static FORMATTING_IMPORT: FormattingImport = FormattingImport;
static INLINE_CODE_IMPORT: InlineCodeImport = InlineCodeImport;
static BREAK_IMPORT: BreakImport = BreakImport;
static HTML_ELEMENT_IMPORT: HtmlElementImport = HtmlElementImport;
static RAW_HTML_IMPORT: RawHtmlImport = RawHtmlImport;

impl ImportVisitor for ParagraphImport {
    fn name(&self) -> &'static str {
        "paragraph"
    }

    fn test_node(&self, node: &MdNode) -> bool {
        node.kind == MdKind::Paragraph
    }

    fn visit(&self, node: &MdNode, ctx: &mut ImportContext<'_, '_>) -> Result<(), ImportError> {
        let paragraph = ctx.create(NodeData::Paragraph)?;
        ctx.add_and_step_into(paragraph, node)
    }
}

impl ImportVisitor for TextImport {
    fn name(&self) -> &'static str {
        "text"
    }

    fn test_node(&self, node: &MdNode) -> bool {
        matches!(node.kind, MdKind::Text { .. })
    }

    fn visit(&self, node: &MdNode, ctx: &mut ImportContext<'_, '_>) -> Result<(), ImportError> {
        let MdKind::Text { value } = &node.kind else {
            return Ok(());
        };
        let text = ctx.create(NodeData::Text {
            text: value.clone(),
            format: ctx.format(),
        })?;
        ctx.append(text);
        Ok(())
    }
}

impl ImportVisitor for FormattingImport {
    fn name(&self) -> &'static str {
        "formatting"
    }

    fn test_node(&self, node: &MdNode) -> bool {
        matches!(node.kind, MdKind::Emphasis | MdKind::Strong | MdKind::Delete)
    }

    fn visit(&self, node: &MdNode, ctx: &mut ImportContext<'_, '_>) -> Result<(), ImportError> {
        let kind = match node.kind {
            MdKind::Emphasis => FormatKind::Italic,
            MdKind::Strong => FormatKind::Bold,
            _ => FormatKind::Strikethrough,
        };
        ctx.with_format(kind, node)
    }
}

impl ImportVisitor for InlineCodeImport {
    fn name(&self) -> &'static str {
        "inline-code"
    }

    fn test_node(&self, node: &MdNode) -> bool {
        matches!(node.kind, MdKind::InlineCode { .. })
    }

    fn visit(&self, node: &MdNode, ctx: &mut ImportContext<'_, '_>) -> Result<(), ImportError> {
        let MdKind::InlineCode { value } = &node.kind else {
            return Ok(());
        };
        let text = ctx.create(NodeData::Text {
            text: value.clone(),
            format: ctx.format().with(FormatKind::Code, true),
        })?;
        ctx.append(text);
        Ok(())
    }
}

impl ImportVisitor for BreakImport {
    fn name(&self) -> &'static str {
        "break"
    }

    fn test_node(&self, node: &MdNode) -> bool {
        node.kind == MdKind::Break
    }

    fn visit(&self, _node: &MdNode, ctx: &mut ImportContext<'_, '_>) -> Result<(), ImportError> {
        let line_break = ctx.create(NodeData::LineBreak)?;
        ctx.append(line_break);
        Ok(())
    }
}

impl ImportVisitor for HtmlElementImport {
    fn name(&self) -> &'static str {
        "html-element"
    }

    fn test_node(&self, node: &MdNode) -> bool {
        matches!(node.kind, MdKind::JsxElement { .. })
    }

    fn visit(&self, node: &MdNode, ctx: &mut ImportContext<'_, '_>) -> Result<(), ImportError> {
        let MdKind::JsxElement {
            name,
            attributes,
            flow,
        } = &node.kind
        else {
            return Ok(());
        };
        let element = ctx.create(NodeData::GenericHtml {
            tag: name.clone(),
            attributes: attributes.clone(),
            flow: *flow,
        })?;
        ctx.add_and_step_into(element, node)
    }
}

/// Raw HTML left as written: literal text, in a paragraph of its own when it
/// stands at block level.
impl ImportVisitor for RawHtmlImport {
    fn name(&self) -> &'static str {
        "raw-html"
    }

    fn test_node(&self, node: &MdNode) -> bool {
        matches!(node.kind, MdKind::Html { .. })
    }

    fn visit(&self, node: &MdNode, ctx: &mut ImportContext<'_, '_>) -> Result<(), ImportError> {
        let MdKind::Html { value } = &node.kind else {
            return Ok(());
        };
        let block_level = ctx
            .parent_kind()
            .is_none_or(|kind| kind == NodeKind::QUOTE || kind == NodeKind::LIST_ITEM);
        let text = ctx.create(NodeData::Text {
            text: if block_level {
                value.trim_end().to_string()
            } else {
                value.clone()
            },
            format: ctx.format(),
        })?;
        if block_level {
            let mut paragraph = ctx.create(NodeData::Paragraph)?;
            paragraph.children.push(text);
            ctx.append(paragraph);
        } else {
            ctx.append(text);
        }
        Ok(())
    }
}

struct ParagraphExport;
struct TextExport;
struct LineBreakExport;
struct GenericHtmlExport;

static PARAGRAPH_EXPORT: ParagraphExport = ParagraphExport;
static TEXT_EXPORT: TextExport = TextExport;
static LINE_BREAK_EXPORT: LineBreakExport = LineBreakExport;
static GENERIC_HTML_EXPORT: GenericHtmlExport = GenericHtmlExport;

impl ExportVisitor for ParagraphExport {
    fn name(&self) -> &'static str {
        "paragraph"
    }

    fn test_node(&self, node: &Node) -> bool {
        node.data == NodeData::Paragraph
    }

    fn visit(&self, node: &Node, ctx: &mut ExportContext<'_>) -> Result<(), ExportError> {
        ctx.add_and_step_into(MdNode::new(MdKind::Paragraph), node)
    }
}

/// Text runs become nested emphasis-like nodes. A run with the same format
/// as the one before it joins that run.
impl ExportVisitor for TextExport {
    fn name(&self) -> &'static str {
        "text"
    }

    fn test_node(&self, node: &Node) -> bool {
        matches!(node.data, NodeData::Text { .. })
    }

    fn visit(&self, node: &Node, ctx: &mut ExportContext<'_>) -> Result<(), ExportError> {
        let NodeData::Text { text, format } = &node.data else {
            return Ok(());
        };
        if text.is_empty() {
            return Ok(());
        }
        if let Some(parent) = ctx.parent_mut() {
            if let Some(last) = parent.children.last_mut() {
                if merge_run(last, text, *format) {
                    return Ok(());
                }
            }
        }
        ctx.append(formatted_run(text, *format));
        Ok(())
    }
}

fn formatted_run(text: &str, format: TextFormat) -> MdNode {
    if format.code {
        return MdNode::new(MdKind::InlineCode {
            value: text.to_string(),
        });
    }
    let mut node = MdNode::text(text);
    for (on, kind) in [
        (format.strikethrough, MdKind::Delete),
        (format.italic, MdKind::Emphasis),
        (format.bold, MdKind::Strong),
    ] {
        if on {
            node = MdNode::with_children(kind, vec![node]);
        }
    }
    node
}

/// Append `text` to `run` when `run` was produced for exactly `format`.
fn merge_run(run: &mut MdNode, text: &str, format: TextFormat) -> bool {
    if format.code {
        if let MdKind::InlineCode { value } = &mut run.kind {
            value.push_str(text);
            return true;
        }
        return false;
    }
    let mut current = run;
    let mut seen = TextFormat::default();
    loop {
        let kind = match current.kind {
            MdKind::Strong => FormatKind::Bold,
            MdKind::Emphasis => FormatKind::Italic,
            MdKind::Delete => FormatKind::Strikethrough,
            MdKind::Text { .. } => break,
            _ => return false,
        };
        if current.children.len() != 1 {
            return false;
        }
        seen = seen.with(kind, true);
        current = &mut current.children[0];
    }
    match &mut current.kind {
        MdKind::Text { value } if seen == format => {
            value.push_str(text);
            true
        }
        _ => false,
    }
}

impl ExportVisitor for LineBreakExport {
    fn name(&self) -> &'static str {
        "linebreak"
    }

    fn test_node(&self, node: &Node) -> bool {
        node.data == NodeData::LineBreak
    }

    fn visit(&self, _node: &Node, ctx: &mut ExportContext<'_>) -> Result<(), ExportError> {
        ctx.append(MdNode::new(MdKind::Break));
        Ok(())
    }
}

impl ExportVisitor for GenericHtmlExport {
    fn name(&self) -> &'static str {
        "generic-html"
    }

    fn test_node(&self, node: &Node) -> bool {
        matches!(node.data, NodeData::GenericHtml { .. })
    }

    fn visit(&self, node: &Node, ctx: &mut ExportContext<'_>) -> Result<(), ExportError> {
        let NodeData::GenericHtml {
            tag,
            attributes,
            flow,
        } = &node.data
        else {
            return Ok(());
        };
        let element = MdNode::new(MdKind::JsxElement {
            name: tag.clone(),
            attributes: attributes.clone(),
            flow: *flow,
        });
        ctx.add_and_step_into(element, node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bold_italic() -> TextFormat {
        TextFormat::default()
            .with(FormatKind::Bold, true)
            .with(FormatKind::Italic, true)
    }

    #[test]
    fn test_formatted_run_nests_strong_outermost() {
        let run = formatted_run("x", bold_italic());
        assert_eq!(run.kind, MdKind::Strong);
        assert_eq!(run.children[0].kind, MdKind::Emphasis);
        assert_eq!(run.text_content(), "x");
    }

    #[test]
    fn test_merge_run_requires_identical_format() {
        let mut run = formatted_run("a", bold_italic());
        assert!(merge_run(&mut run, "b", bold_italic()));
        assert!(!merge_run(&mut run, "c", TextFormat::default().with(FormatKind::Bold, true)));
        assert_eq!(run.text_content(), "ab");
    }

    #[test]
    fn test_code_runs_merge_into_inline_code() {
        let code = TextFormat::default().with(FormatKind::Code, true);
        let mut run = formatted_run("let", code);
        assert!(merge_run(&mut run, " x", code));
        assert_eq!(
            run.kind,
            MdKind::InlineCode {
                value: "let x".to_string()
            }
        );
    }
}
