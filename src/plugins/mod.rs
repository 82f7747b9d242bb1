//! Shipped plugins.
//!
//! Each plugin registers node kinds, visitors and syntax for one family of
//! markdown constructs. `core` must come first; the rest may be combined
//! freely, except that `codemirror` needs `code_block` before it.

mod code_block;
mod codemirror;
mod core;
mod diff_source;
mod directives;
mod frontmatter;
mod headings;
mod image;
mod link;
mod lists;
mod quote;
mod table;
mod thematic_break;
mod toolbar;

pub use self::core::{CorePlugin, CorePluginParams, STRIKETHROUGH};
pub use code_block::{
    CodeBlockEditorDescriptor, CodeBlockPlugin, CodeBlockPluginParams, CodeBlockState,
    code_block_editor_for, insert_code_block,
};
pub use codemirror::{CodeMirrorPlugin, CodeMirrorPluginParams, CodeMirrorState, LanguageMap};
pub use diff_source::{DIFF_SOURCE_WRAPPER, DiffSourcePlugin, DiffSourcePluginParams};
pub use directives::{
    DirectiveDescriptor, DirectivesPlugin, DirectivesPluginParams, DirectivesState,
    directive_descriptor_for, insert_directive,
};
pub use frontmatter::{
    FrontmatterPlugin, YAML_FRONTMATTER, has_frontmatter, insert_frontmatter, remove_frontmatter,
};
pub use headings::{
    ALL_HEADING_LEVELS, HeadingsPlugin, HeadingsPluginParams, HeadingsState,
    allowed_heading_levels,
};
pub use image::{ImagePlugin, insert_image};
pub use link::{AUTOLINK, LinkPlugin, LinkPluginParams};
pub use lists::{ListsPlugin, TASK_LIST_ITEMS};
pub use quote::QuotePlugin;
pub use table::{GFM_TABLE, TablePlugin, insert_table, seed_table};
pub use thematic_break::{ThematicBreakPlugin, insert_thematic_break};
pub use toolbar::{TOOLBAR_SLOT, ToolbarPlugin, ToolbarPluginParams, toolbar_contents};

use crate::plugin::Plugin;

/// Every content plugin with default parameters, in dependency order.
/// The core plugin is not included.
pub fn content_plugins() -> Vec<Box<dyn Plugin>> {
    vec![
        Box::new(HeadingsPlugin::default()),
        Box::new(QuotePlugin),
        Box::new(ListsPlugin),
        Box::new(LinkPlugin::default()),
        Box::new(ImagePlugin),
        Box::new(ThematicBreakPlugin),
        Box::new(CodeBlockPlugin::default()),
        Box::new(TablePlugin),
        Box::new(DirectivesPlugin::default()),
        Box::new(FrontmatterPlugin),
    ]
}
