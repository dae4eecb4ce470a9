use std::sync::Arc;

use crate::error::ModelError;
use crate::model::Node;
use crate::schema::Schema;
use crate::transform::{Assoc, Mapping, Transaction};

/// The current selection: a cursor or text range between two positions, or a
/// whole selected node.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Text { anchor: usize, head: usize },
    Node { pos: usize },
}

impl Selection {
    pub fn cursor(pos: usize) -> Self {
        Selection::Text {
            anchor: pos,
            head: pos,
        }
    }

    pub fn is_cursor(&self) -> bool {
        matches!(self, Selection::Text { anchor, head } if anchor == head)
    }

    /// The lower end of the selection.
    pub fn from(&self) -> usize {
        match self {
            Selection::Text { anchor, head } => *anchor.min(head),
            Selection::Node { pos } => *pos,
        }
    }

    /// The upper end of the selection.
    pub fn to(&self) -> usize {
        match self {
            Selection::Text { anchor, head } => *anchor.max(head),
            Selection::Node { pos } => *pos,
        }
    }

    /// Relocate the selection through a transaction's mapping. A node
    /// selection whose node was deleted degrades to a cursor at the mapped
    /// position.
    pub fn map(&self, mapping: &Mapping) -> Selection {
        match self {
            Selection::Text { anchor, head } => Selection::Text {
                anchor: mapping.map(*anchor, Assoc::After),
                head: mapping.map(*head, Assoc::After),
            },
            Selection::Node { pos } => {
                let result = mapping.map_result(*pos, Assoc::After);
                if result.deleted {
                    Selection::cursor(result.pos)
                } else {
                    Selection::Node { pos: result.pos }
                }
            }
        }
    }

    /// Both endpoints must resolve against the document they are used with.
    pub fn check(&self, doc: &Node) -> Result<(), ModelError> {
        match self {
            Selection::Text { anchor, head } => {
                doc.resolve(*anchor)?;
                doc.resolve(*head)?;
            }
            Selection::Node { pos } => {
                doc.resolve(*pos)?;
            }
        }
        Ok(())
    }
}

/// An immutable editing snapshot: schema, document, selection, version.
///
/// Applying a transaction yields the next snapshot; the old one stays valid
/// for readers that still hold it. One discrete input event produces at most
/// one transaction, so versions advance linearly.
#[derive(Debug, Clone)]
pub struct EditorState {
    schema: Arc<Schema>,
    doc: Node,
    selection: Selection,
    version: u64,
}

impl EditorState {
    /// A fresh state holding the default empty document (a single empty
    /// paragraph) with the cursor inside it.
    pub fn new(schema: Arc<Schema>) -> Self {
        let doc = schema
            .make_default(schema.top_node())
            .expect("default document satisfies the schema");
        EditorState {
            schema,
            doc,
            selection: Selection::cursor(1),
            version: 0,
        }
    }

    /// A state wrapping an existing document (typically just parsed).
    pub fn with_doc(schema: Arc<Schema>, doc: Node) -> Self {
        EditorState {
            schema,
            doc,
            selection: Selection::cursor(0),
            version: 0,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn schema_arc(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Start a transaction against the current document.
    pub fn transaction(&self) -> Transaction {
        Transaction::new(self.doc.clone())
    }

    /// Commit a transaction, producing the next state. The transaction's own
    /// selection wins when it set one; otherwise the current selection is
    /// mapped through the edit.
    pub fn apply(&self, tr: Transaction) -> EditorState {
        let selection = match tr.selection() {
            Some(sel) => sel.clone(),
            None => self.selection.map(tr.mapping()),
        };
        EditorState {
            schema: Arc::clone(&self.schema),
            doc: tr.doc().clone(),
            selection,
            version: self.version + if tr.doc_changed() { 1 } else { 0 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::markdown_schema;
    use pretty_assertions::assert_eq;

    #[test]
    fn new_state_holds_an_empty_paragraph() {
        let state = EditorState::new(Arc::new(markdown_schema()));
        assert_eq!(state.doc().type_name(), "doc");
        assert_eq!(state.doc().child_count(), 1);
        assert_eq!(state.doc().child(0).unwrap().type_name(), "paragraph");
        assert_eq!(state.version(), 0);
    }

    #[test]
    fn apply_maps_selection_through_the_edit() {
        let schema = Arc::new(markdown_schema());
        let state = EditorState::new(Arc::clone(&schema));
        let mut tr = state.transaction();
        tr.insert(1, schema.text("hi"), &schema).unwrap();
        let next = state.apply(tr);
        assert_eq!(next.doc().text_content(), "hi");
        assert_eq!(next.version(), 1);
        // Cursor was at 1; insertion at 1 with After association pushes it
        // past the new text.
        assert_eq!(next.selection(), &Selection::cursor(3));
    }

    #[test]
    fn explicit_selection_wins_over_mapping() {
        let schema = Arc::new(markdown_schema());
        let state = EditorState::new(Arc::clone(&schema));
        let mut tr = state.transaction();
        tr.insert(1, schema.text("hi"), &schema).unwrap();
        tr.set_selection(Selection::cursor(1), &schema);
        let next = state.apply(tr);
        assert_eq!(next.selection(), &Selection::cursor(1));
    }

    #[test]
    fn node_selection_collapses_when_node_is_deleted() {
        let schema = Arc::new(markdown_schema());
        let para = schema
            .node("paragraph", None, vec![schema.text("x")], vec![])
            .unwrap();
        let keep = schema
            .node("paragraph", None, vec![schema.text("y")], vec![])
            .unwrap();
        let doc = schema.node("doc", None, vec![para, keep], vec![]).unwrap();
        let mut state = EditorState::with_doc(Arc::clone(&schema), doc);
        state.selection = Selection::Node { pos: 1 };

        let mut tr = state.transaction();
        tr.delete(0, 3, &schema).unwrap();
        let next = state.apply(tr);
        assert!(matches!(next.selection(), Selection::Text { .. }));
    }
}
