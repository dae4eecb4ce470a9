use crate::commands::Command;
use crate::model::{Node, ResolvedPos, Slice};
use crate::state::{EditorState, Selection};
use crate::transform::Transaction;

/// Resolved ancestry of a selection that sits inside a table cell, with the
/// depth of every level of the `table > section > row > cell` hierarchy.
pub(crate) struct TableContext {
    pub rp: ResolvedPos,
    pub d_table: usize,
    pub d_section: usize,
    pub d_row: usize,
    pub d_cell: usize,
}

impl TableContext {
    pub fn find(state: &EditorState) -> Option<TableContext> {
        let rp = state.doc().resolve(state.selection().from()).ok()?;
        let d_cell = (1..=rp.depth()).rev().find(|&d| {
            matches!(rp.node(d).type_name(), "table_cell" | "table_header")
        })?;
        if d_cell < 3
            || rp.node(d_cell - 1).type_name() != "table_row"
            || !matches!(
                rp.node(d_cell - 2).type_name(),
                "table_head" | "table_body"
            )
            || rp.node(d_cell - 3).type_name() != "table"
        {
            return None;
        }
        Some(TableContext {
            d_table: d_cell - 3,
            d_section: d_cell - 2,
            d_row: d_cell - 1,
            d_cell,
            rp,
        })
    }

    pub fn table(&self) -> &Node {
        self.rp.node(self.d_table)
    }

    pub fn section(&self) -> &Node {
        self.rp.node(self.d_section)
    }

    pub fn row(&self) -> &Node {
        self.rp.node(self.d_row)
    }

    /// Column index of the selected cell within its row.
    pub fn cell_index(&self) -> usize {
        self.rp.index(self.d_row)
    }
}

/// Replace the whole table with an empty paragraph and land the cursor in
/// it. Used when a removal would leave the table without rows or columns.
fn collapse_table(state: &EditorState, ctx: &TableContext) -> Option<Transaction> {
    let schema = state.schema();
    let from = ctx.rp.before(ctx.d_table);
    let to = ctx.rp.after(ctx.d_table);
    let para = schema.make_default("paragraph").ok()?;
    let mut tr = state.transaction();
    tr.replace(from, to, Slice::from_nodes(vec![para]), schema)
        .ok()?;
    tr.set_selection(Selection::cursor(from + 1), schema);
    Some(tr)
}

/// Insert a row above or below the selected body row, cloning the row's cell
/// shape with empty content.
pub struct InsertRow {
    pub after: bool,
}

impl Command for InsertRow {
    fn apply(&self, state: &EditorState) -> Option<Transaction> {
        let ctx = TableContext::find(state)?;
        if ctx.section().type_name() != "table_body" {
            return None;
        }
        let schema = state.schema();
        let cells = ctx
            .row()
            .content()
            .children()
            .iter()
            .map(|cell| {
                schema
                    .node(cell.type_name(), Some(cell.attrs().clone()), vec![], vec![])
                    .ok()
            })
            .collect::<Option<Vec<_>>>()?;
        let new_row = schema.node("table_row", None, cells, vec![]).ok()?;
        let pos = if self.after {
            ctx.rp.after(ctx.d_row)
        } else {
            ctx.rp.before(ctx.d_row)
        };
        let mut tr = state.transaction();
        tr.insert(pos, new_row, schema).ok()?;
        Some(tr)
    }
}

/// Insert a column at the selected cell's index, adding a matching empty
/// cell to every row of the table, head included.
pub struct InsertColumn {
    pub after: bool,
}

impl Command for InsertColumn {
    fn apply(&self, state: &EditorState) -> Option<Transaction> {
        let ctx = TableContext::find(state)?;
        let schema = state.schema();
        let table = ctx.table();
        let table_start = ctx.rp.start(ctx.d_table);
        let col = ctx.cell_index() + usize::from(self.after);

        let mut inserts: Vec<(usize, Node)> = Vec::new();
        let mut section_off = 0;
        for section in table.content().children() {
            let cell_type = if section.type_name() == "table_head" {
                "table_header"
            } else {
                "table_cell"
            };
            let mut row_off = 0;
            for row in section.content().children() {
                let row_content_start = table_start + section_off + 1 + row_off + 1;
                let cells = row.content().children();
                let index = col.min(cells.len());
                let template = cells.get(ctx.cell_index()).or_else(|| cells.last());
                let cell = schema
                    .node(
                        cell_type,
                        template.map(|c| c.attrs().clone()),
                        vec![],
                        vec![],
                    )
                    .ok()?;
                inserts.push((row_content_start + row.content().offset_of(index), cell));
                row_off += row.node_size();
            }
            section_off += section.node_size();
        }

        // Apply bottom-to-top so earlier insertions cannot shift positions
        // that are still pending.
        inserts.sort_by(|a, b| b.0.cmp(&a.0));
        let mut tr = state.transaction();
        for (pos, cell) in inserts {
            tr.insert(pos, cell, schema).ok()?;
        }
        Some(tr)
    }
}

/// Remove the selected body row; removing the last data row collapses the
/// whole table into an empty paragraph.
pub struct RemoveRow;

impl Command for RemoveRow {
    fn apply(&self, state: &EditorState) -> Option<Transaction> {
        let ctx = TableContext::find(state)?;
        if ctx.section().type_name() != "table_body" {
            return None;
        }
        let data_rows: usize = ctx
            .table()
            .content()
            .children()
            .iter()
            .filter(|s| s.type_name() == "table_body")
            .map(Node::child_count)
            .sum();
        if data_rows <= 1 {
            return collapse_table(state, &ctx);
        }
        let schema = state.schema();
        let mut tr = state.transaction();
        if ctx.section().child_count() == 1 {
            tr.delete(
                ctx.rp.before(ctx.d_section),
                ctx.rp.after(ctx.d_section),
                schema,
            )
            .ok()?;
        } else {
            tr.delete(ctx.rp.before(ctx.d_row), ctx.rp.after(ctx.d_row), schema)
                .ok()?;
        }
        Some(tr)
    }
}

/// Remove the selected column from every row; removing the last column
/// collapses the table.
pub struct RemoveColumn;

impl Command for RemoveColumn {
    fn apply(&self, state: &EditorState) -> Option<Transaction> {
        let ctx = TableContext::find(state)?;
        let columns = ctx
            .table()
            .child(0)
            .and_then(|head| head.child(0))
            .map(Node::child_count)
            .unwrap_or(0);
        if columns <= 1 {
            return collapse_table(state, &ctx);
        }
        let schema = state.schema();
        let table = ctx.table();
        let table_start = ctx.rp.start(ctx.d_table);
        let col = ctx.cell_index();

        let mut ranges: Vec<(usize, usize)> = Vec::new();
        let mut section_off = 0;
        for section in table.content().children() {
            let mut row_off = 0;
            for row in section.content().children() {
                let row_content_start = table_start + section_off + 1 + row_off + 1;
                if let Some(cell) = row.content().child(col) {
                    let from = row_content_start + row.content().offset_of(col);
                    ranges.push((from, from + cell.node_size()));
                }
                row_off += row.node_size();
            }
            section_off += section.node_size();
        }

        ranges.sort_by(|a, b| b.0.cmp(&a.0));
        let mut tr = state.transaction();
        for (from, to) in ranges {
            tr.delete(from, to, schema).ok()?;
        }
        Some(tr)
    }
}

/// Move the selection to the next or previous cell, wrapping across rows and
/// stepping out of the table at either end.
pub struct GotoCell {
    pub forward: bool,
}

impl Command for GotoCell {
    fn apply(&self, state: &EditorState) -> Option<Transaction> {
        let ctx = TableContext::find(state)?;
        let schema = state.schema();
        let table = ctx.table();
        let table_start = ctx.rp.start(ctx.d_table);

        let mut cell_starts: Vec<usize> = Vec::new();
        let mut section_off = 0;
        for section in table.content().children() {
            let mut row_off = 0;
            for row in section.content().children() {
                let row_content_start = table_start + section_off + 1 + row_off + 1;
                let mut cell_off = 0;
                for cell in row.content().children() {
                    cell_starts.push(row_content_start + cell_off + 1);
                    cell_off += cell.node_size();
                }
                row_off += row.node_size();
            }
            section_off += section.node_size();
        }

        let current = ctx.rp.start(ctx.d_cell);
        let index = cell_starts.iter().position(|&p| p == current)?;
        let mut tr = state.transaction();
        if self.forward {
            if let Some(&next) = cell_starts.get(index + 1) {
                tr.set_selection(Selection::cursor(next), schema);
                return Some(tr);
            }
            let after = ctx.rp.after(ctx.d_table);
            let rp = tr.doc().resolve(after).ok()?;
            match rp.node_after() {
                Some(next) if !next.is_leaf() => {
                    tr.set_selection(Selection::cursor(after + 1), schema);
                }
                Some(_) => {
                    tr.set_selection(Selection::cursor(after), schema);
                }
                None => {
                    tr.insert(after, schema.make_default("paragraph").ok()?, schema)
                        .ok()?;
                    tr.set_selection(Selection::cursor(after + 1), schema);
                }
            }
        } else {
            if index > 0 {
                tr.set_selection(Selection::cursor(cell_starts[index - 1]), schema);
                return Some(tr);
            }
            let before = ctx.rp.before(ctx.d_table);
            let rp = tr.doc().resolve(before).ok()?;
            match rp.node_before() {
                Some(prev) if !prev.is_leaf() => {
                    tr.set_selection(Selection::cursor(before - 1), schema);
                }
                Some(_) => {
                    tr.set_selection(Selection::cursor(before), schema);
                }
                None => {
                    tr.insert(before, schema.make_default("paragraph").ok()?, schema)
                        .ok()?;
                    tr.set_selection(Selection::cursor(before + 1), schema);
                }
            }
        }
        Some(tr)
    }
}

/// Replace the selected empty paragraph with a fresh table grid, keeping a
/// navigable paragraph after it.
pub struct InsertTable {
    pub rows: usize,
    pub cols: usize,
}

impl Default for InsertTable {
    fn default() -> Self {
        InsertTable { rows: 2, cols: 2 }
    }
}

impl Command for InsertTable {
    fn apply(&self, state: &EditorState) -> Option<Transaction> {
        if self.rows == 0 || self.cols == 0 {
            return None;
        }
        let schema = state.schema();
        let rp = state.doc().resolve(state.selection().from()).ok()?;
        if rp.depth_of("table").is_some() {
            return None;
        }
        let d = (1..=rp.depth()).rev().find(|&d| {
            schema
                .node_type(rp.node(d).type_name())
                .is_some_and(|t| t.in_group("block"))
        })?;
        let block = rp.node(d);
        if block.type_name() != "paragraph" || block.content_size() != 0 {
            return None;
        }

        let headers = (0..self.cols)
            .map(|i| {
                schema.node(
                    "table_header",
                    None,
                    vec![schema.text(format!("Col {}", i + 1))],
                    vec![],
                )
            })
            .collect::<Result<Vec<_>, _>>()
            .ok()?;
        let head_row = schema.node("table_row", None, headers, vec![]).ok()?;
        let head = schema.node("table_head", None, vec![head_row], vec![]).ok()?;
        let body_rows = (0..self.rows)
            .map(|_| {
                let cells = (0..self.cols)
                    .map(|_| schema.make_default("table_cell"))
                    .collect::<Result<Vec<_>, _>>()?;
                schema.node("table_row", None, cells, vec![])
            })
            .collect::<Result<Vec<_>, _>>()
            .ok()?;
        let body = schema.node("table_body", None, body_rows, vec![]).ok()?;
        let table = schema.node("table", None, vec![head, body], vec![]).ok()?;
        let para = schema.make_default("paragraph").ok()?;

        let from = rp.before(d);
        let to = rp.after(d);
        let mut tr = state.transaction();
        tr.replace(from, to, Slice::from_nodes(vec![table, para]), schema)
            .ok()?;
        // First header cell content sits four tokens into the table.
        tr.set_selection(Selection::cursor(from + 4), schema);
        Some(tr)
    }
}
