use crate::commands::Command;
use crate::model::{attrs, Attrs, ResolvedPos, Slice};
use crate::state::EditorState;
use crate::transform::{Step, Transaction};

/// Switch the selected block to a target type, or back to a paragraph when
/// it already is that type. Blockquote targets wrap and lift instead of
/// retyping, since a quote is a container rather than a text block.
pub struct ToggleBlockType {
    type_name: String,
    attrs: Attrs,
}

impl ToggleBlockType {
    pub fn new(type_name: &str, attrs: Attrs) -> Self {
        ToggleBlockType {
            type_name: type_name.to_string(),
            attrs,
        }
    }

    pub fn paragraph() -> Self {
        Self::new("paragraph", Attrs::new())
    }

    pub fn heading(level: i64) -> Self {
        Self::new("heading", attrs([("level", level)]))
    }

    pub fn code_block() -> Self {
        Self::new("code_block", Attrs::new())
    }

    pub fn blockquote() -> Self {
        Self::new("blockquote", Attrs::new())
    }
}

impl Command for ToggleBlockType {
    fn apply(&self, state: &EditorState) -> Option<Transaction> {
        let rf = state.doc().resolve(state.selection().from()).ok()?;
        if self.type_name == "blockquote" {
            return self.toggle_wrap(state, &rf);
        }
        let schema = state.schema();
        let d = deepest_block(state, &rf)?;
        let block = rf.node(d);

        let is_target = block.type_name() == self.type_name
            && self
                .attrs
                .iter()
                .all(|(name, value)| block.attr(name) == Some(value));
        if is_target && self.type_name == "paragraph" {
            return None;
        }
        let (new_type, new_attrs) = if is_target {
            ("paragraph", None)
        } else {
            (self.type_name.as_str(), Some(self.attrs.clone()))
        };

        // Code blocks hold plain text; anything else keeps its inline runs.
        let children = if new_type == "code_block" || block.type_name() == "code_block" {
            let text = block.text_content();
            if text.is_empty() {
                vec![]
            } else {
                vec![schema.text(text)]
            }
        } else {
            block.content().children().to_vec()
        };
        let node = schema.node(new_type, new_attrs, children, vec![]).ok()?;
        let content_size = node.content_size();

        let mut tr = state.transaction();
        tr.replace(
            rf.before(d),
            rf.after(d),
            Slice::from_nodes(vec![node]),
            schema,
        )
        .ok()?;
        // Keep the cursor at its offset within the retyped block (clamped:
        // flattening to plain text can shrink the content).
        let offset = state.selection().from().saturating_sub(rf.before(d) + 1);
        let cursor = rf.before(d) + 1 + offset.min(content_size);
        tr.set_selection(crate::state::Selection::cursor(cursor), schema);
        if new_type != "paragraph" && d == 1 && rf.index(0) == state.doc().child_count() - 1 {
            let end = tr.doc().content_size();
            tr.insert(end, schema.make_default("paragraph").ok()?, schema)
                .ok()?;
        }
        Some(tr)
    }
}

impl ToggleBlockType {
    fn toggle_wrap(&self, state: &EditorState, rf: &ResolvedPos) -> Option<Transaction> {
        let schema = state.schema();
        let mut tr = state.transaction();
        if let Some(d_quote) = rf.depth_of("blockquote") {
            // Lift the block containing the selection out of the quote.
            let quote = rf.node(d_quote);
            let index = rf.index(d_quote);
            let from = rf.start(d_quote) + quote.content().offset_of(index);
            let to = from + quote.child(index)?.node_size();
            tr.step(Step::Lift { from, to }, schema).ok()?;
        } else {
            let d = deepest_block(state, rf)?;
            tr.step(
                Step::Wrap {
                    from: rf.before(d),
                    to: rf.after(d),
                    type_name: "blockquote".to_string(),
                    attrs: Attrs::new(),
                },
                schema,
            )
            .ok()?;
        }
        Some(tr)
    }
}

/// Depth of the deepest ancestor in the `block` group.
fn deepest_block(state: &EditorState, rf: &ResolvedPos) -> Option<usize> {
    (1..=rf.depth()).rev().find(|&d| {
        state
            .schema()
            .node_type(rf.node(d).type_name())
            .is_some_and(|t| t.in_group("block"))
    })
}
