use crate::commands::Command;
use crate::model::Slice;
use crate::state::EditorState;
use crate::transform::Transaction;

/// Toggle an inline mark over the selected text: marks every unmarked run,
/// or strips the mark when the whole selection already carries it.
///
/// Runs that already carry the mark keep their recorded markup form when the
/// selection is extended over them; only unmarked runs receive the canonical
/// delimiter.
pub struct ToggleMark {
    pub mark_type: String,
}

impl ToggleMark {
    pub fn new(mark_type: &str) -> Self {
        ToggleMark {
            mark_type: mark_type.to_string(),
        }
    }
}

impl Command for ToggleMark {
    fn apply(&self, state: &EditorState) -> Option<Transaction> {
        let schema = state.schema();
        let (from, to) = (state.selection().from(), state.selection().to());
        if from == to {
            return None;
        }
        let rf = state.doc().resolve(from).ok()?;
        let rt = state.doc().resolve(to).ok()?;
        // Both endpoints must sit in the same textblock.
        if rf.depth() != rt.depth() || rf.start(rf.depth()) != rt.start(rt.depth()) {
            return None;
        }
        let parent = rf.parent();
        let frag = parent.content().cut(rf.parent_offset(), rt.parent_offset());
        if !frag.children().iter().any(|c| c.is_text()) {
            return None;
        }
        let mark = schema.mark(&self.mark_type, None).ok()?;
        let all_marked = frag
            .children()
            .iter()
            .filter(|c| c.is_text())
            .all(|c| c.marks().iter().any(|m| m.type_name() == self.mark_type));
        let new_children = frag
            .children()
            .iter()
            .map(|c| {
                if !c.is_text() {
                    return c.clone();
                }
                let marks = if all_marked {
                    mark.remove_from_set(c.marks())
                } else if c.marks().iter().any(|m| m.type_name() == self.mark_type) {
                    c.marks().to_vec()
                } else {
                    mark.add_to_set(c.marks(), schema)
                };
                c.with_marks(marks)
            })
            .collect();
        let mut tr = state.transaction();
        // The text length is unchanged, so the selection maps onto itself.
        tr.replace(from, to, Slice::from_nodes(new_children), schema)
            .ok()?;
        Some(tr)
    }
}
