use crate::commands::Command;
use crate::model::{Node, ResolvedPos, Slice};
use crate::schema::Schema;
use crate::state::{EditorState, Selection};
use crate::transform::{Assoc, Transaction};

/// Wrap the selected blocks in a list of the given type, or lift them back
/// out when the selection already sits in one.
///
/// Wrapping merges the new list with an adjacent list of the identical type,
/// mirroring markdown's inability to keep two same-type lists apart.
pub struct ToggleList {
    pub list_type: String,
}

impl Command for ToggleList {
    fn apply(&self, state: &EditorState) -> Option<Transaction> {
        let rf = state.doc().resolve(state.selection().from()).ok()?;
        if let Some(d_item) = rf.depth_of("list_item") {
            let d_list = d_item.checked_sub(1)?;
            if rf.node(d_list).type_name() == self.list_type {
                return self.lift_out(state, &rf, d_list);
            }
            return self.retype(state, &rf, d_list);
        }
        self.wrap(state, &rf)
    }
}

impl ToggleList {
    /// Un-wrap the selected items, splitting the list around them when they
    /// are not at its edge.
    fn lift_out(
        &self,
        state: &EditorState,
        rf: &ResolvedPos,
        d_list: usize,
    ) -> Option<Transaction> {
        let schema = state.schema();
        let list = rf.node(d_list);
        let d_item = d_list + 1;
        let rt = state.doc().resolve(state.selection().to()).ok()?;
        let i0 = rf.index(d_list);
        let i1 = if rt.depth() > d_list && rt.start(d_list) == rf.start(d_list) {
            rt.index(d_list).max(i0)
        } else {
            i0
        };
        let children = list.content().children();

        let mut replacement: Vec<Node> = Vec::new();
        if i0 > 0 {
            replacement.push(list.copy(list.content().cut(0, list.content().offset_of(i0))));
        }
        for item in &children[i0..=i1] {
            replacement.extend(item.content().children().iter().cloned());
        }
        if i1 + 1 < children.len() {
            let from = list.content().offset_of(i1 + 1);
            replacement.push(list.copy(list.content().cut(from, list.content().size())));
        }

        // Where the cursor's block lands once its item and list wrappers are
        // gone: the unwrapping removes two token layers in front of it.
        let cursor = if rf.depth() > d_item {
            let b = rf.before(d_list);
            let mut offset = 0;
            if i0 > 0 {
                offset += list.content().offset_of(i0) + 2;
            }
            for item in &children[i0..rf.index(d_list)] {
                offset += item.content().size();
            }
            offset += rf.node(d_item).content().offset_of(rf.index(d_item));
            let old_block_start = rf.before(d_item + 1);
            Some(b + offset + (state.selection().from() - old_block_start))
        } else {
            None
        };

        let mut tr = state.transaction();
        tr.replace(
            rf.before(d_list),
            rf.after(d_list),
            Slice::from_nodes(replacement),
            schema,
        )
        .ok()?;
        if let Some(cursor) = cursor {
            tr.set_selection(Selection::cursor(cursor), schema);
        }
        Some(tr)
    }

    /// Swap an enclosing list of the other type over to this one, merging
    /// with identical neighbors afterwards.
    fn retype(&self, state: &EditorState, rf: &ResolvedPos, d_list: usize) -> Option<Transaction> {
        let schema = state.schema();
        let list = rf.node(d_list);
        let new_list = schema
            .node(
                &self.list_type,
                None,
                list.content().children().to_vec(),
                vec![],
            )
            .ok()?;
        let from = rf.before(d_list);
        let size = new_list.node_size();
        let mut tr = state.transaction();
        tr.replace(
            from,
            rf.after(d_list),
            Slice::from_nodes(vec![new_list]),
            schema,
        )
        .ok()?;
        // The swapped list has identical layout, so the cursor keeps its
        // numeric position through the joins.
        let joins_from = tr.mapping().maps().len();
        join_lists_at(&mut tr, from + size, &self.list_type, schema);
        join_lists_at(&mut tr, from, &self.list_type, schema);
        let cursor = map_through(&tr, joins_from, state.selection().from());
        tr.set_selection(Selection::cursor(cursor), schema);
        Some(tr)
    }

    /// Wrap each selected sibling block in an item and the items in a new
    /// list.
    fn wrap(&self, state: &EditorState, rf: &ResolvedPos) -> Option<Transaction> {
        let schema = state.schema();
        let to = state.selection().to();
        let rt = state.doc().resolve(to).ok()?;
        // The blocks to wrap are siblings of the deepest block-group
        // ancestor around the selection start.
        let d_block = (1..=rf.depth()).rev().find(|&d| {
            schema
                .node_type(rf.node(d).type_name())
                .is_some_and(|t| t.in_group("block"))
        })?;
        let host = d_block - 1;
        let parent = rf.node(host);
        if parent.child_count() == 0 {
            return None;
        }
        let i0 = rf.index(host).min(parent.child_count() - 1);
        let i1 = if rt.depth() > host && rt.start(host) == rf.start(host) {
            rt.index(host).min(parent.child_count() - 1).max(i0)
        } else {
            i0
        };

        let items = parent.content().children()[i0..=i1]
            .iter()
            .map(|block| schema.node("list_item", None, vec![block.clone()], vec![]).ok())
            .collect::<Option<Vec<_>>>()?;
        let list = schema.node(&self.list_type, None, items, vec![]).ok()?;
        let size = list.node_size();

        let start = rf.start(host) + parent.content().offset_of(i0);
        let end = rf.start(host) + parent.content().offset_of(i1 + 1);
        let mut tr = state.transaction();
        tr.replace(start, end, Slice::from_nodes(vec![list]), schema)
            .ok()?;
        // Each wrapped block gained a list and an item boundary in front of
        // its content.
        let k = rf.index(host) - i0;
        let wrapped_cursor = state.selection().from() + 2 + 2 * k;
        let joins_from = tr.mapping().maps().len();
        join_lists_at(&mut tr, start + size, &self.list_type, schema);
        join_lists_at(&mut tr, start, &self.list_type, schema);
        let cursor = map_through(&tr, joins_from, wrapped_cursor);
        tr.set_selection(Selection::cursor(cursor), schema);
        Some(tr)
    }
}

/// Map a position through the steps applied since `from_step`.
fn map_through(tr: &Transaction, from_step: usize, pos: usize) -> usize {
    tr.mapping().maps()[from_step..]
        .iter()
        .fold(pos, |p, map| map.map(p, Assoc::After))
}

/// Merge the two lists meeting at `boundary` when both have the given type.
fn join_lists_at(tr: &mut Transaction, boundary: usize, list_type: &str, schema: &Schema) {
    let doc = tr.doc().clone();
    let Ok(rp) = doc.resolve(boundary) else {
        return;
    };
    let (before, after) = (rp.node_before(), rp.node_after());
    let joinable = before.as_ref().is_some_and(|n| n.type_name() == list_type)
        && after.as_ref().is_some_and(|n| n.type_name() == list_type);
    if joinable {
        let _ = tr.replace(boundary - 1, boundary + 1, Slice::empty(), schema);
    }
}
