use crate::error::TransformError;
use crate::model::{Attrs, Node, ResolvedPos, Slice};
use crate::schema::Schema;
use crate::state::Selection;
use crate::transform::map::StepMap;

/// One atomic, invertible document edit.
///
/// Steps validate against the schema as they apply; a failing step aborts the
/// whole transaction before anything becomes observable.
#[derive(Debug, Clone)]
pub enum Step {
    /// Remove `[from, to)` and splice in a slice, closing open node
    /// boundaries at the slice edges.
    Replace {
        from: usize,
        to: usize,
        slice: Slice,
    },
    /// Replace the attributes of the node that starts at `pos`. The tree
    /// layout and all positions are unchanged.
    SetNodeAttrs { pos: usize, attrs: Attrs },
    /// Wrap the sibling blocks spanning `[from, to)` in a new ancestor node.
    Wrap {
        from: usize,
        to: usize,
        type_name: String,
        attrs: Attrs,
    },
    /// Move the children covering `[from, to)` of their wrapper one level up,
    /// splitting the wrapper when the range does not span all of it.
    Lift { from: usize, to: usize },
    /// Record the selection the transaction should end with.
    SetSelection(Selection),
}

impl Step {
    /// Apply this step to a document, producing the new document and the
    /// position map for the edit.
    pub fn apply(&self, doc: &Node, schema: &Schema) -> Result<(Node, StepMap), TransformError> {
        match self {
            Step::Replace { from, to, slice } => {
                let new_doc = doc.replace(*from, *to, slice, schema)?;
                Ok((new_doc, StepMap::single(*from, to - from, slice.size())))
            }
            Step::SetNodeAttrs { pos, attrs } => {
                let rp = doc.resolve(*pos)?;
                if rp.text_offset() != 0 {
                    return Err(TransformError::NotAtBoundary);
                }
                let depth = rp.depth();
                let parent = rp.parent();
                let index = rp.index(depth);
                let child = parent
                    .child(index)
                    .ok_or(TransformError::NotAtBoundary)?
                    .clone();
                let new_parent =
                    parent.copy(parent.content().replace_child(index, child.with_attrs(attrs.clone())));
                Ok((rebuild_through(&rp, depth, new_parent), StepMap::identity()))
            }
            Step::Wrap {
                from,
                to,
                type_name,
                attrs,
            } => {
                let (rf, rt, depth) = block_range(doc, *from, *to)?;
                let parent = rf.node(depth);
                let start_index = rf.index(depth);
                let end_index = rt.index(depth);
                if start_index >= end_index {
                    return Err(TransformError::BadReplace("empty wrap range".into()));
                }
                let wrapped: Vec<Node> = parent.content().children()[start_index..end_index]
                    .to_vec();
                let wrapper = schema.node(type_name, Some(attrs.clone()), wrapped, Vec::new())?;
                let new_content = parent
                    .content()
                    .splice(start_index, end_index, vec![wrapper]);
                schema.check_content(parent.type_name(), &new_content)?;
                let new_parent = parent.copy(new_content);
                Ok((
                    rebuild_through(&rf, depth, new_parent),
                    StepMap::new(vec![(*from, 0, 1), (*to, 0, 1)]),
                ))
            }
            Step::Lift { from, to } => {
                let rf = doc.resolve(*from)?;
                let rt = doc.resolve(*to)?;
                let depth = rf.depth();
                if depth == 0 {
                    return Err(TransformError::NotLiftable { levels: 1 });
                }
                if rt.depth() != depth
                    || rf.start(depth) != rt.start(depth)
                    || rf.text_offset() != 0
                    || rt.text_offset() != 0
                {
                    return Err(TransformError::NotAtBoundary);
                }
                let wrapper = rf.node(depth);
                let parent = rf.node(depth - 1);
                let inner_from = rf.parent_offset();
                let inner_to = rt.parent_offset();
                if inner_from >= inner_to {
                    return Err(TransformError::BadReplace("empty lift range".into()));
                }
                let content = wrapper.content();
                let before = content.cut(0, inner_from);
                let lifted = content.cut(inner_from, inner_to);
                let after = content.cut(inner_to, content.size());

                let mut replacement = Vec::new();
                if !before.is_empty() {
                    replacement.push(wrapper.copy(before.clone()));
                }
                replacement.extend(lifted.children().iter().cloned());
                if !after.is_empty() {
                    replacement.push(wrapper.copy(after.clone()));
                }
                let wrapper_index = rf.index(depth - 1);
                let new_content =
                    parent
                        .content()
                        .splice(wrapper_index, wrapper_index + 1, replacement);
                schema.check_content(parent.type_name(), &new_content)?;
                let new_parent = parent.copy(new_content);

                let ranges = match (before.is_empty(), after.is_empty()) {
                    (true, true) => vec![(from - 1, 1, 0), (*to, 1, 0)],
                    (true, false) => vec![(from - 1, 1, 0), (*to, 0, 1)],
                    (false, true) => vec![(*from, 0, 1), (*to, 1, 0)],
                    (false, false) => vec![(*from, 0, 1), (*to, 0, 1)],
                };
                Ok((
                    rebuild_through(&rf, depth - 1, new_parent),
                    StepMap::new(ranges),
                ))
            }
            Step::SetSelection(_) => Ok((doc.clone(), StepMap::identity())),
        }
    }

    /// The step that undoes this one, computed against the document the step
    /// was applied to.
    pub fn invert(&self, doc_before: &Node) -> Result<Step, TransformError> {
        match self {
            Step::Replace { from, to, slice } => Ok(Step::Replace {
                from: *from,
                to: from + slice.size(),
                slice: doc_before.slice(*from, *to)?,
            }),
            Step::SetNodeAttrs { pos, attrs: _ } => {
                let rp = doc_before.resolve(*pos)?;
                let child = rp
                    .parent()
                    .child(rp.index(rp.depth()))
                    .ok_or(TransformError::NotAtBoundary)?;
                Ok(Step::SetNodeAttrs {
                    pos: *pos,
                    attrs: child.attrs().clone(),
                })
            }
            Step::Wrap { from, to, .. } => Ok(Step::Replace {
                from: *from,
                to: to + 2,
                slice: doc_before.slice(*from, *to)?,
            }),
            Step::Lift { from, to } => {
                let rf = doc_before.resolve(*from)?;
                let depth = rf.depth();
                if depth == 0 {
                    return Err(TransformError::NotLiftable { levels: 1 });
                }
                let wrapper_before = rf.before(depth);
                let wrapper_after = rf.after(depth);
                let (_, map) = self.apply_shape(doc_before, *to)?;
                Ok(Step::Replace {
                    from: map.map(wrapper_before, crate::transform::Assoc::Before),
                    to: map.map(wrapper_after, crate::transform::Assoc::After),
                    slice: doc_before.slice(wrapper_before, wrapper_after)?,
                })
            }
            Step::SetSelection(sel) => Ok(Step::SetSelection(sel.clone())),
        }
    }

    /// The position map a lift would produce, without building the new tree.
    fn apply_shape(&self, doc: &Node, to: usize) -> Result<(usize, StepMap), TransformError> {
        let Step::Lift { from, .. } = self else {
            return Err(TransformError::NotAtBoundary);
        };
        let rf = doc.resolve(*from)?;
        let depth = rf.depth();
        let wrapper = rf.node(depth);
        let rt = doc.resolve(to)?;
        let before_empty = rf.parent_offset() == 0;
        let after_empty = rt.parent_offset() == wrapper.content_size();
        let ranges = match (before_empty, after_empty) {
            (true, true) => vec![(from - 1, 1, 0), (to, 1, 0)],
            (true, false) => vec![(from - 1, 1, 0), (to, 0, 1)],
            (false, true) => vec![(*from, 0, 1), (to, 1, 0)],
            (false, false) => vec![(*from, 0, 1), (to, 0, 1)],
        };
        Ok((*from, StepMap::new(ranges)))
    }
}

fn block_range(
    doc: &Node,
    from: usize,
    to: usize,
) -> Result<(ResolvedPos, ResolvedPos, usize), TransformError> {
    let rf = doc.resolve(from)?;
    let rt = doc.resolve(to)?;
    let depth = rf.shared_depth(to);
    if rf.depth() != depth || rt.depth() != depth || rf.text_offset() != 0 || rt.text_offset() != 0
    {
        return Err(TransformError::NotAtBoundary);
    }
    Ok((rf, rt, depth))
}

/// Rebuild the ancestor chain above `depth` after swapping in a new node at
/// that depth.
fn rebuild_through(rp: &ResolvedPos, depth: usize, node: Node) -> Node {
    let mut node = node;
    for d in (0..depth).rev() {
        let parent = rp.node(d);
        node = parent.copy(parent.content().replace_child(rp.index(d), node));
    }
    node
}
