use std::cell::RefCell;
use std::rc::Rc;

use crate::engine::{Command, CommandKind, CommandPriority, Editor, Node, NodeData, NodeKind};
use crate::error::{ExportError, ImportError};
use crate::export::{ExportContext, ExportVisitor};
use crate::import::{ImportContext, ImportVisitor};
use crate::markdown::{MdKind, MdNode};
use crate::plugin::Plugin;
use crate::session::{BlockType, Session, Subscription, WeakSession};

pub const ALL_HEADING_LEVELS: [u8; 6] = [1, 2, 3, 4, 5, 6];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingsPluginParams {
    /// Levels the keyboard shortcuts and block-type menu may produce.
    pub allowed_heading_levels: Vec<u8>,
}

impl Default for HeadingsPluginParams {
    fn default() -> Self {
        Self {
            allowed_heading_levels: ALL_HEADING_LEVELS.to_vec(),
        }
    }
}

#[derive(Debug, Default)]
pub struct HeadingsState {
    allowed: RefCell<Vec<u8>>,
}

pub struct HeadingsPlugin {
    params: HeadingsPluginParams,
}

impl HeadingsPlugin {
    pub const fn new(params: HeadingsPluginParams) -> Self {
        Self { params }
    }
}

impl Default for HeadingsPlugin {
    fn default() -> Self {
        Self::new(HeadingsPluginParams::default())
    }
}

pub fn allowed_heading_levels(session: &Session) -> Vec<u8> {
    session.state::<HeadingsState>().allowed.borrow().clone()
}

impl Plugin for HeadingsPlugin {
    fn name(&self) -> &'static str {
        "headings"
    }

    fn init(&self, session: &Session) -> anyhow::Result<()> {
        let registries = session.registries();
        registries.node_kinds.append(NodeKind::HEADING);
        registries.import_visitors.append(&HEADING_IMPORT);
        registries.export_visitors.append(&HEADING_EXPORT);
        registries
            .root_subscriptions
            .append(heading_shortcuts(session.downgrade()));
        Ok(())
    }

    fn update(&self, session: &Session) {
        let mut levels: Vec<u8> = self
            .params
            .allowed_heading_levels
            .iter()
            .copied()
            .filter(|level| ALL_HEADING_LEVELS.contains(level))
            .collect();
        levels.sort_unstable();
        levels.dedup();
        *session.state::<HeadingsState>().allowed.borrow_mut() = levels;
    }
}

/// Ctrl/Cmd+Alt+1..6 turns the selected blocks into headings, +0 back into
/// paragraphs. Levels outside the allowed set fall through.
fn heading_shortcuts(weak: WeakSession) -> Subscription {
    Rc::new(move |root: &Editor| {
        let weak = weak.clone();
        root.register_command(CommandKind::KeyDown, CommandPriority::Low, move |command, _| {
            let Command::KeyDown(event) = command else {
                return false;
            };
            if !(event.modifiers.control_or_meta() && event.modifiers.alt) {
                return false;
            }
            let Some(digit) = event.key.to_digit(10) else {
                return false;
            };
            let Some(session) = weak.upgrade() else {
                return false;
            };
            let block_type = match u8::try_from(digit) {
                Ok(0) => BlockType::Paragraph,
                Ok(level) if allowed_heading_levels(&session).contains(&level) => {
                    BlockType::Heading(level)
                }
                _ => return false,
            };
            if let Err(err) = session.apply_block_type(block_type) {
                tracing::warn!(error = %err, "heading shortcut failed");
            }
            true
        })
    })
}

struct HeadingImport;
struct HeadingExport;

static HEADING_IMPORT: HeadingImport = HeadingImport;
static HEADING_EXPORT: HeadingExport = HeadingExport;

impl ImportVisitor for HeadingImport {
    fn name(&self) -> &'static str {
        "heading"
    }

    fn test_node(&self, node: &MdNode) -> bool {
        matches!(node.kind, MdKind::Heading { .. })
    }

    fn visit(&self, node: &MdNode, ctx: &mut ImportContext<'_, '_>) -> Result<(), ImportError> {
        let MdKind::Heading { depth } = node.kind else {
            return Ok(());
        };
        let heading = ctx.create(NodeData::Heading { level: depth })?;
        ctx.add_and_step_into(heading, node)
    }
}

impl ExportVisitor for HeadingExport {
    fn name(&self) -> &'static str {
        "heading"
    }

    fn test_node(&self, node: &Node) -> bool {
        matches!(node.data, NodeData::Heading { .. })
    }

    fn visit(&self, node: &Node, ctx: &mut ExportContext<'_>) -> Result<(), ExportError> {
        let NodeData::Heading { level } = node.data else {
            return Ok(());
        };
        ctx.add_and_step_into(MdNode::new(MdKind::Heading { depth: level }), node)
    }
}
