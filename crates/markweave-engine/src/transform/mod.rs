mod map;
mod step;

pub use map::{Assoc, MapResult, Mapping, StepMap};
pub use step::Step;

use tracing::debug;

use crate::error::TransformError;
use crate::model::{Attrs, Node, Slice};
use crate::schema::Schema;
use crate::state::Selection;

/// An ordered list of steps building up one atomic document change.
///
/// Steps apply eagerly as they are added, so a transaction always holds the
/// document produced so far; a step that fails validation leaves the
/// transaction unusable and the caller discards it, which is what makes
/// partial application unobservable.
#[derive(Debug, Clone)]
pub struct Transaction {
    before: Node,
    doc: Node,
    steps: Vec<Step>,
    docs: Vec<Node>,
    mapping: Mapping,
    selection: Option<Selection>,
}

impl Transaction {
    pub fn new(doc: Node) -> Self {
        Transaction {
            before: doc.clone(),
            doc,
            steps: Vec::new(),
            docs: Vec::new(),
            mapping: Mapping::new(),
            selection: None,
        }
    }

    /// The document this transaction started from.
    pub fn before(&self) -> &Node {
        &self.before
    }

    /// The document after every step so far.
    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn doc_changed(&self) -> bool {
        !self.steps.is_empty()
    }

    /// Apply one step, extending the document and mapping.
    pub fn step(&mut self, step: Step, schema: &Schema) -> Result<&mut Self, TransformError> {
        let (new_doc, map) = step.apply(&self.doc, schema).inspect_err(|err| {
            debug!(?err, "transaction step rejected");
        })?;
        if let Step::SetSelection(sel) = &step {
            self.selection = Some(sel.clone());
        }
        self.docs.push(std::mem::replace(&mut self.doc, new_doc));
        self.steps.push(step);
        self.mapping.push(map);
        Ok(self)
    }

    pub fn replace(
        &mut self,
        from: usize,
        to: usize,
        slice: Slice,
        schema: &Schema,
    ) -> Result<&mut Self, TransformError> {
        self.step(Step::Replace { from, to, slice }, schema)
    }

    pub fn delete(
        &mut self,
        from: usize,
        to: usize,
        schema: &Schema,
    ) -> Result<&mut Self, TransformError> {
        self.replace(from, to, Slice::empty(), schema)
    }

    pub fn insert(
        &mut self,
        pos: usize,
        node: Node,
        schema: &Schema,
    ) -> Result<&mut Self, TransformError> {
        self.replace(pos, pos, Slice::from_nodes(vec![node]), schema)
    }

    pub fn set_node_attrs(
        &mut self,
        pos: usize,
        attrs: Attrs,
        schema: &Schema,
    ) -> Result<&mut Self, TransformError> {
        self.step(Step::SetNodeAttrs { pos, attrs }, schema)
    }

    pub fn set_selection(&mut self, selection: Selection, schema: &Schema) {
        // SetSelection never fails: it changes no content.
        let _ = self.step(Step::SetSelection(selection), schema);
    }

    /// The inverse transaction: every step inverted, in reverse order.
    pub fn invert(&self, schema: &Schema) -> Result<Transaction, TransformError> {
        let mut inverted = Transaction::new(self.doc.clone());
        for (i, step) in self.steps.iter().enumerate().rev() {
            let inverse = step.invert(&self.docs[i])?;
            inverted.step(inverse, schema)?;
        }
        Ok(inverted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::markdown_schema;
    use pretty_assertions::assert_eq;

    #[test]
    fn transaction_applies_steps_in_order() {
        let schema = markdown_schema();
        let para = schema
            .node("paragraph", None, vec![schema.text("ab")], vec![])
            .unwrap();
        let doc = schema.node("doc", None, vec![para], vec![]).unwrap();

        let mut tr = Transaction::new(doc.clone());
        tr.insert(2, schema.text("X"), &schema).unwrap();
        tr.insert(4, schema.text("Y"), &schema).unwrap();
        assert_eq!(tr.doc().text_content(), "aXbY");
        assert_eq!(tr.mapping().map(2, Assoc::Before), 2);
        assert_eq!(tr.mapping().map(2, Assoc::After), 3);
    }

    #[test]
    fn inverted_transaction_restores_original() {
        let schema = markdown_schema();
        let para = schema
            .node("paragraph", None, vec![schema.text("hello")], vec![])
            .unwrap();
        let doc = schema.node("doc", None, vec![para], vec![]).unwrap();

        let mut tr = Transaction::new(doc.clone());
        tr.delete(2, 4, &schema).unwrap();
        tr.insert(1, schema.text("Z"), &schema).unwrap();
        assert_ne!(tr.doc(), &doc);

        let inverse = tr.invert(&schema).unwrap();
        assert_eq!(inverse.doc(), &doc);
    }

    #[test]
    fn failed_step_leaves_started_doc_observable_nowhere() {
        let schema = markdown_schema();
        let doc = schema
            .node(
                "doc",
                None,
                vec![schema.make_default("paragraph").unwrap()],
                vec![],
            )
            .unwrap();
        let mut tr = Transaction::new(doc.clone());
        // Out-of-range replace: the transaction reports the failure and the
        // caller drops it; the source document is untouched either way.
        let result = tr.delete(0, 99, &schema);
        assert!(result.is_err());
        assert_eq!(doc.child_count(), 1);
    }
}
