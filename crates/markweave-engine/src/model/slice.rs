use crate::error::{ModelError, TransformError};
use crate::model::node::{Fragment, Node};
use crate::model::position::ResolvedPos;
use crate::schema::Schema;

/// A piece of document content with possibly "open" edges.
///
/// `open_start` / `open_end` count how many node boundaries at each edge are
/// unclosed: a slice cut out of the middle of two paragraphs has both ends
/// open one level, so pasting it between two other paragraphs knits the torn
/// edges together instead of inserting half-empty blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    content: Fragment,
    open_start: usize,
    open_end: usize,
}

impl Slice {
    pub fn new(content: Fragment, open_start: usize, open_end: usize) -> Self {
        Slice {
            content,
            open_start,
            open_end,
        }
    }

    pub fn empty() -> Self {
        Slice::new(Fragment::empty(), 0, 0)
    }

    /// A fully closed slice around the given nodes.
    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        Slice::new(Fragment::from_nodes(nodes), 0, 0)
    }

    pub fn content(&self) -> &Fragment {
        &self.content
    }

    pub fn open_start(&self) -> usize {
        self.open_start
    }

    pub fn open_end(&self) -> usize {
        self.open_end
    }

    /// Size the slice occupies once inserted.
    pub fn size(&self) -> usize {
        self.content.size() - self.open_start - self.open_end
    }
}

impl Node {
    /// Cut the content between two positions out of this document, leaving
    /// the edges as open as the positions are deep.
    pub fn slice(&self, from: usize, to: usize) -> Result<Slice, ModelError> {
        if from == to {
            return Ok(Slice::empty());
        }
        let rf = self.resolve(from)?;
        let rt = self.resolve(to)?;
        let base = rf.shared_depth(to);
        let node = rf.node(base);
        let start = rf.start(base);
        let content = node.content().cut(rf.pos() - start, rt.pos() - start);
        Ok(Slice::new(content, rf.depth() - base, rt.depth() - base))
    }

    /// Replace the range `[from, to)` with a slice, knitting open slice edges
    /// into the surrounding nodes so the result is schema-valid.
    pub fn replace(
        &self,
        from: usize,
        to: usize,
        slice: &Slice,
        schema: &Schema,
    ) -> Result<Node, TransformError> {
        if from > to {
            return Err(TransformError::BadReplace(format!(
                "range start {from} after range end {to}"
            )));
        }
        let rf = self.resolve(from)?;
        let rt = self.resolve(to)?;
        if slice.open_start > rf.depth() || slice.open_end > rt.depth() {
            return Err(TransformError::BadReplace(
                "slice is open deeper than the insertion point".into(),
            ));
        }
        if rf.depth() - slice.open_start != rt.depth() - slice.open_end {
            return Err(TransformError::BadReplace(
                "inconsistent open depths at slice edges".into(),
            ));
        }
        replace_outer(&rf, &rt, slice, 0, schema)
    }

    /// Invoke `visit` for every node overlapping `[from, to)`, passing the
    /// node and its absolute start position. Returning `false` skips the
    /// node's children.
    pub fn nodes_between(
        &self,
        from: usize,
        to: usize,
        visit: &mut dyn FnMut(&Node, usize) -> bool,
    ) {
        self.content().nodes_between(from, to, 0, visit);
    }
}

impl Fragment {
    pub(crate) fn nodes_between(
        &self,
        from: usize,
        to: usize,
        node_start: usize,
        visit: &mut dyn FnMut(&Node, usize) -> bool,
    ) {
        let mut pos = 0;
        for child in self.children() {
            if pos >= to {
                break;
            }
            let end = pos + child.node_size();
            if end > from {
                let descend = visit(child, node_start + pos);
                if descend && !child.is_leaf() {
                    let start = pos + 1;
                    child.content().nodes_between(
                        from.saturating_sub(start),
                        (to.saturating_sub(start)).min(child.content_size()),
                        node_start + start,
                        visit,
                    );
                }
            }
            pos = end;
        }
    }
}

fn close(node: &Node, content: Fragment, schema: &Schema) -> Result<Node, TransformError> {
    schema.check_content(node.type_name(), &content)?;
    Ok(node.copy(content))
}

fn joinable(
    before: &ResolvedPos,
    after: &ResolvedPos,
    depth: usize,
    schema: &Schema,
) -> Result<Node, TransformError> {
    let node = before.node(depth);
    if !schema.compatible_content(node.type_name(), after.node(depth).type_name()) {
        return Err(TransformError::BadReplace(format!(
            "cannot join {} onto {}",
            after.node(depth).type_name(),
            node.type_name()
        )));
    }
    Ok(node.clone())
}

/// Copy the children of `node(depth)` between two edge positions into
/// `target`. `None` for `start` means "from the first child", `None` for
/// `end` means "through the last child". Positions deeper than `depth` keep
/// their partially covered child out of the copy (it is rebuilt by the
/// join logic instead).
fn add_range(
    start: Option<&ResolvedPos>,
    end: Option<&ResolvedPos>,
    depth: usize,
    target: &mut Fragment,
) {
    let node = start.or(end).expect("one edge position").node(depth);
    let mut start_index = 0;
    let end_index = match end {
        Some(e) => e.index(depth),
        None => node.child_count(),
    };
    if let Some(s) = start {
        start_index = s.index(depth);
        if s.depth() > depth {
            start_index += 1;
        } else if s.text_offset() > 0 {
            target.push(s.node_after().expect("text offset implies a node after"));
            start_index += 1;
        }
    }
    for i in start_index..end_index {
        target.push(node.child(i).expect("index within child count").clone());
    }
    if let Some(e) = end {
        if e.depth() == depth && e.text_offset() > 0 {
            target.push(e.node_before().expect("text offset implies a node before"));
        }
    }
}

fn replace_two_way(
    rf: &ResolvedPos,
    rt: &ResolvedPos,
    depth: usize,
    schema: &Schema,
) -> Result<Fragment, TransformError> {
    let mut content = Fragment::empty();
    add_range(None, Some(rf), depth, &mut content);
    if rf.depth() > depth {
        let join = joinable(rf, rt, depth + 1, schema)?;
        let inner = replace_two_way(rf, rt, depth + 1, schema)?;
        content.push(close(&join, inner, schema)?);
    }
    add_range(Some(rt), None, depth, &mut content);
    Ok(content)
}

fn replace_three_way(
    rf: &ResolvedPos,
    start: &ResolvedPos,
    end: &ResolvedPos,
    rt: &ResolvedPos,
    depth: usize,
    schema: &Schema,
) -> Result<Fragment, TransformError> {
    let open_start = if rf.depth() > depth {
        Some(joinable(rf, start, depth + 1, schema)?)
    } else {
        None
    };
    let open_end = if rt.depth() > depth {
        Some(joinable(end, rt, depth + 1, schema)?)
    } else {
        None
    };

    let mut content = Fragment::empty();
    add_range(None, Some(rf), depth, &mut content);
    match (&open_start, &open_end) {
        (Some(os), Some(_)) if start.index(depth) == end.index(depth) => {
            let inner = replace_three_way(rf, start, end, rt, depth + 1, schema)?;
            content.push(close(os, inner, schema)?);
        }
        _ => {
            if let Some(os) = &open_start {
                let inner = replace_two_way(rf, start, depth + 1, schema)?;
                content.push(close(os, inner, schema)?);
            }
            add_range(Some(start), Some(end), depth, &mut content);
            if let Some(oe) = &open_end {
                let inner = replace_two_way(end, rt, depth + 1, schema)?;
                content.push(close(oe, inner, schema)?);
            }
        }
    }
    add_range(Some(rt), None, depth, &mut content);
    Ok(content)
}

/// Wrap the slice content in copies of the insertion point's ancestors so the
/// open edges line up with real nodes, then resolve both edges inside that
/// scaffold.
fn prepare_slice(
    slice: &Slice,
    along: &ResolvedPos,
) -> Result<(ResolvedPos, ResolvedPos), TransformError> {
    let extra = along.depth() - slice.open_start;
    let parent = along.node(extra);
    let mut node = parent.copy(slice.content.clone());
    for i in (0..extra).rev() {
        node = along.node(i).copy(Fragment::from_nodes(vec![node]));
    }
    let start = node.resolve(slice.open_start + extra)?;
    let end = node.resolve(node.content_size() - slice.open_end - extra)?;
    Ok((start, end))
}

fn replace_outer(
    rf: &ResolvedPos,
    rt: &ResolvedPos,
    slice: &Slice,
    depth: usize,
    schema: &Schema,
) -> Result<Node, TransformError> {
    let index = rf.index(depth);
    let node = rf.node(depth);
    if index == rt.index(depth) && depth < rf.depth() - slice.open_start {
        let inner = replace_outer(rf, rt, slice, depth + 1, schema)?;
        close(node, node.content().replace_child(index, inner), schema)
    } else if slice.content.size() == 0 {
        let merged = replace_two_way(rf, rt, depth, schema)?;
        close(node, merged, schema)
    } else if slice.open_start == 0
        && slice.open_end == 0
        && rf.depth() == depth
        && rt.depth() == depth
    {
        let parent = rf.parent();
        let content = parent.content();
        let merged = content
            .cut(0, rf.parent_offset())
            .append(&slice.content)
            .append(&content.cut(rt.parent_offset(), content.size()));
        close(parent, merged, schema)
    } else {
        let (start, end) = prepare_slice(slice, rf)?;
        let merged = replace_three_way(rf, &start, &end, rt, depth, schema)?;
        close(node, merged, schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::markdown_schema;
    use pretty_assertions::assert_eq;

    fn doc_with(schema: &Schema, paragraphs: &[&str]) -> Node {
        let children = paragraphs
            .iter()
            .map(|t| {
                schema
                    .node("paragraph", None, vec![schema.text(*t)], vec![])
                    .unwrap()
            })
            .collect();
        schema.node("doc", None, children, vec![]).unwrap()
    }

    #[test]
    fn deleting_across_paragraphs_joins_them() {
        let schema = markdown_schema();
        let doc = doc_with(&schema, &["hello", "world"]);
        // "hello" spans 1..6, "world" spans 8..13.
        let joined = doc.replace(3, 10, &Slice::empty(), &schema).unwrap();
        assert_eq!(joined.child_count(), 1);
        assert_eq!(joined.text_content(), "herld");
    }

    #[test]
    fn inserting_text_into_paragraph() {
        let schema = markdown_schema();
        let doc = doc_with(&schema, &["ab"]);
        let slice = Slice::from_nodes(vec![schema.text("XY")]);
        let out = doc.replace(2, 2, &slice, &schema).unwrap();
        assert_eq!(out.text_content(), "aXYb");
    }

    #[test]
    fn slice_then_replace_restores_document() {
        let schema = markdown_schema();
        let doc = doc_with(&schema, &["hello", "world"]);
        let slice = doc.slice(3, 10).unwrap();
        assert_eq!(slice.open_start(), 1);
        assert_eq!(slice.open_end(), 1);
        let cut = doc.replace(3, 10, &Slice::empty(), &schema).unwrap();
        let restored = cut.replace(3, 3, &slice, &schema).unwrap();
        assert_eq!(restored, doc);
    }

    #[test]
    fn replacing_whole_block_with_closed_slice() {
        let schema = markdown_schema();
        let doc = doc_with(&schema, &["old", "keep"]);
        let heading = schema
            .node(
                "heading",
                Some(crate::model::attrs([("level", 1)])),
                vec![schema.text("new")],
                vec![],
            )
            .unwrap();
        // Paragraph "old" occupies 0..5.
        let out = doc
            .replace(0, 5, &Slice::from_nodes(vec![heading]), &schema)
            .unwrap();
        assert_eq!(out.child(0).unwrap().type_name(), "heading");
        assert_eq!(out.child(1).unwrap().text_content(), "keep");
    }

    #[test]
    fn nodes_between_reports_positions() {
        let schema = markdown_schema();
        let doc = doc_with(&schema, &["ab", "cd"]);
        let mut seen = Vec::new();
        doc.nodes_between(0, doc.content_size(), &mut |node, pos| {
            seen.push((node.type_name().to_string(), pos));
            true
        });
        assert_eq!(
            seen,
            vec![
                ("paragraph".to_string(), 0),
                ("text".to_string(), 1),
                ("paragraph".to_string(), 4),
                ("text".to_string(), 5),
            ]
        );
    }
}
