//! GFM tables. The structured node keeps the markdown tree of the table;
//! a table editor works on that tree directly.

use unicode_width::UnicodeWidthStr;

use crate::engine::{Node, NodeData, NodeKey, NodeKind};
use crate::error::{ExportError, ImportError, SerializeError, SessionError};
use crate::export::{ExportContext, ExportVisitor};
use crate::import::{ImportContext, ImportVisitor};
use crate::markdown::{Align, ComrakSyntax, MdKind, MdNode, Serializer, ToMarkdownExtension};
use crate::plugin::Plugin;
use crate::session::Session;

pub static GFM_TABLE: ComrakSyntax = ComrakSyntax::new("gfm-table", |options| options.table = true);

const MIN_COLUMN_WIDTH: usize = 3;

#[derive(Debug, Default)]
pub struct TablePlugin;

impl Plugin for TablePlugin {
    fn name(&self) -> &'static str {
        "table"
    }

    fn init(&self, session: &Session) -> anyhow::Result<()> {
        let registries = session.registries();
        registries.node_kinds.append(NodeKind::TABLE);
        registries.syntax_extensions.append(&GFM_TABLE);
        registries.import_visitors.append(&TABLE_IMPORT);
        registries.export_visitors.append(&TABLE_EXPORT);
        registries.to_markdown_extensions.append(&TABLE_MARKDOWN);
        Ok(())
    }
}

/// A table of empty cells. The first row is the header.
pub fn seed_table(rows: usize, columns: usize) -> MdNode {
    let row = || {
        MdNode::with_children(
            MdKind::TableRow,
            (0..columns.max(1))
                .map(|_| MdNode::new(MdKind::TableCell))
                .collect(),
        )
    };
    MdNode::with_children(
        MdKind::Table { align: Vec::new() },
        (0..rows.max(1)).map(|_| row()).collect(),
    )
}

/// Insert an empty `rows` by `columns` table after the selection.
///
/// # Errors
/// As [`Session::insert_decorator_node`].
pub fn insert_table(
    session: &Session,
    rows: usize,
    columns: usize,
) -> Result<Option<NodeKey>, SessionError> {
    session.insert_decorator_node(&|txn| txn.create(NodeData::Table(seed_table(rows, columns))))
}

struct TableImport;
struct TableExport;
struct TableMarkdown;

static TABLE_IMPORT: TableImport = TableImport;
static TABLE_EXPORT: TableExport = TableExport;
static TABLE_MARKDOWN: TableMarkdown = TableMarkdown;

impl ImportVisitor for TableImport {
    fn name(&self) -> &'static str {
        "table"
    }

    fn test_node(&self, node: &MdNode) -> bool {
        matches!(node.kind, MdKind::Table { .. })
    }

    fn visit(&self, node: &MdNode, ctx: &mut ImportContext<'_, '_>) -> Result<(), ImportError> {
        let table = ctx.create(NodeData::Table(node.without_positions()))?;
        ctx.append(table);
        Ok(())
    }
}

impl ExportVisitor for TableExport {
    fn name(&self) -> &'static str {
        "table"
    }

    fn test_node(&self, node: &Node) -> bool {
        matches!(node.data, NodeData::Table(_))
    }

    fn visit(&self, node: &Node, ctx: &mut ExportContext<'_>) -> Result<(), ExportError> {
        if let NodeData::Table(md) = &node.data {
            ctx.append(md.clone());
        }
        Ok(())
    }
}

/// Padded cells, with the pipes of every row lined up.
impl ToMarkdownExtension for TableMarkdown {
    fn name(&self) -> &'static str {
        "gfm-table"
    }

    fn handles(&self, node: &MdNode) -> bool {
        matches!(node.kind, MdKind::Table { .. })
    }

    fn render(&self, node: &MdNode, serializer: &Serializer<'_>) -> Result<String, SerializeError> {
        let MdKind::Table { align } = &node.kind else {
            return Err(SerializeError::UnhandledNode {
                kind: node.type_name(),
            });
        };
        let mut rows = Vec::with_capacity(node.children.len());
        for row in &node.children {
            let mut cells = Vec::with_capacity(row.children.len());
            for cell in &row.children {
                cells.push(escape_cell(&serializer.inline(&cell.children)?));
            }
            rows.push(cells);
        }
        let columns = rows
            .iter()
            .map(Vec::len)
            .chain([align.len(), 1])
            .max()
            .unwrap_or(1);
        let alignment = |column: usize| align.get(column).copied().unwrap_or_default();
        let widths: Vec<usize> = (0..columns)
            .map(|column| {
                rows.iter()
                    .filter_map(|row| row.get(column))
                    .map(|cell| cell.width())
                    .chain([MIN_COLUMN_WIDTH])
                    .max()
                    .unwrap_or(MIN_COLUMN_WIDTH)
            })
            .collect();

        let render_row = |cells: &[String]| {
            let padded: Vec<String> = widths
                .iter()
                .enumerate()
                .map(|(column, width)| {
                    let cell = cells.get(column).map_or("", String::as_str);
                    pad(cell, *width, alignment(column))
                })
                .collect();
            format!("| {} |", padded.join(" | "))
        };
        let delimiter: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(column, width)| delimiter_cell(*width, alignment(column)))
            .collect();

        let mut lines = Vec::with_capacity(rows.len() + 1);
        lines.push(render_row(rows.first().map_or(&[][..], Vec::as_slice)));
        lines.push(format!("| {} |", delimiter.join(" | ")));
        for row in rows.iter().skip(1) {
            lines.push(render_row(row));
        }
        Ok(lines.join("\n"))
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn pad(cell: &str, width: usize, align: Align) -> String {
    let gap = width.saturating_sub(cell.width());
    match align {
        Align::Right => format!("{}{cell}", " ".repeat(gap)),
        Align::Center => {
            let left = gap / 2;
            format!("{}{cell}{}", " ".repeat(left), " ".repeat(gap - left))
        }
        Align::Left | Align::None => format!("{cell}{}", " ".repeat(gap)),
    }
}

fn delimiter_cell(width: usize, align: Align) -> String {
    match align {
        Align::None => "-".repeat(width),
        Align::Left => format!(":{}", "-".repeat(width - 1)),
        Align::Right => format!("{}:", "-".repeat(width - 1)),
        Align::Center => format!(":{}:", "-".repeat(width - 2)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::ToMarkdownOptions;

    fn cell(text: &str) -> MdNode {
        MdNode::with_children(MdKind::TableCell, vec![MdNode::text(text)])
    }

    fn render(table: &MdNode) -> String {
        let options = ToMarkdownOptions::default();
        let extensions: [&'static dyn ToMarkdownExtension; 1] = [&TABLE_MARKDOWN];
        TABLE_MARKDOWN
            .render(table, &Serializer::new(&options, &extensions))
            .unwrap()
    }

    #[test]
    fn test_pipes_line_up_with_alignment() {
        let table = MdNode::with_children(
            MdKind::Table {
                align: vec![Align::Left, Align::Right],
            },
            vec![
                MdNode::with_children(MdKind::TableRow, vec![cell("name"), cell("n")]),
                MdNode::with_children(MdKind::TableRow, vec![cell("a"), cell("1234")]),
            ],
        );
        assert_eq!(
            render(&table),
            "| name |    n |\n| :--- | ---: |\n| a    | 1234 |"
        );
    }

    #[test]
    fn test_seeded_table_renders_empty_cells() {
        assert_eq!(
            render(&seed_table(2, 2)),
            "|     |     |\n| --- | --- |\n|     |     |"
        );
    }

    #[test]
    fn test_cell_pipes_are_escaped() {
        let table = MdNode::with_children(
            MdKind::Table { align: Vec::new() },
            vec![MdNode::with_children(MdKind::TableRow, vec![cell("a|b")])],
        );
        assert_eq!(render(&table), "| a\\|b |\n| ---- |");
    }
}
