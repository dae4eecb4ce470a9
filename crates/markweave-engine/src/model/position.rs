use crate::error::ModelError;
use crate::model::node::Node;

/// A document position with its ancestry resolved.
///
/// The path records, per depth, the ancestor node, the child index the
/// position descends through, and the absolute offset where that ancestor's
/// content starts. Depth 0 is the document root. Positions are only valid
/// against the exact tree they were resolved from; after a transaction they
/// must be re-mapped before resolving again.
#[derive(Debug, Clone)]
pub struct ResolvedPos {
    pos: usize,
    path: Vec<(Node, usize, usize)>,
    parent_offset: usize,
}

impl ResolvedPos {
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Number of ancestors between the root and the position's parent.
    pub fn depth(&self) -> usize {
        self.path.len() - 1
    }

    /// The ancestor node at `depth` (0 = root, `depth()` = direct parent).
    pub fn node(&self, depth: usize) -> &Node {
        &self.path[depth].0
    }

    /// The direct parent of the position.
    pub fn parent(&self) -> &Node {
        self.node(self.depth())
    }

    /// Child index the position points at (or into) within the ancestor at
    /// `depth`.
    pub fn index(&self, depth: usize) -> usize {
        self.path[depth].1
    }

    /// Offset of the position inside its direct parent's content.
    pub fn parent_offset(&self) -> usize {
        self.parent_offset
    }

    /// Absolute position where the content of the ancestor at `depth` starts.
    pub fn start(&self, depth: usize) -> usize {
        self.path[depth].2
    }

    /// Absolute position where the content of the ancestor at `depth` ends.
    pub fn end(&self, depth: usize) -> usize {
        self.start(depth) + self.node(depth).content_size()
    }

    /// Absolute position directly before the ancestor at `depth`.
    ///
    /// Depth 0 has no "before"; callers never ask for one because the root is
    /// not addressable as a child.
    pub fn before(&self, depth: usize) -> usize {
        self.start(depth) - 1
    }

    /// Absolute position directly after the ancestor at `depth`.
    pub fn after(&self, depth: usize) -> usize {
        self.end(depth) + 1
    }

    /// The node directly after the position, if any.
    ///
    /// When the position sits inside a text node the returned node is the
    /// trailing piece of that text.
    pub fn node_after(&self) -> Option<Node> {
        let parent = self.parent();
        let (index, child_start) = parent.content().find_index(self.parent_offset)?;
        let child = parent.content().child(index)?;
        if self.parent_offset == child_start {
            Some(child.clone())
        } else {
            Some(child.cut(self.parent_offset - child_start, child.node_size()))
        }
    }

    /// The node directly before the position, if any.
    pub fn node_before(&self) -> Option<Node> {
        let parent = self.parent();
        let (index, child_start) = parent.content().find_index(self.parent_offset)?;
        if self.parent_offset == child_start {
            if index == 0 {
                return None;
            }
            return parent.content().child(index - 1).cloned();
        }
        let child = parent.content().child(index)?;
        Some(child.cut(0, self.parent_offset - child_start))
    }

    /// Depth of the nearest ancestor (self included) of the given type.
    pub fn depth_of(&self, type_name: &str) -> Option<usize> {
        (0..=self.depth())
            .rev()
            .find(|&d| self.node(d).type_name() == type_name)
    }

    /// How far the position sits inside a text node (0 when it is on a child
    /// boundary).
    pub fn text_offset(&self) -> usize {
        let (_, child_start) = self
            .parent()
            .content()
            .find_index(self.parent_offset)
            .expect("parent offset is within parent content");
        self.parent_offset - child_start
    }

    /// The deepest depth at which the ancestor around this position also
    /// contains `pos`.
    pub fn shared_depth(&self, pos: usize) -> usize {
        for depth in (1..=self.depth()).rev() {
            if self.start(depth) <= pos && pos <= self.end(depth) {
                return depth;
            }
        }
        0
    }
}

impl Node {
    /// Resolve an absolute position against this node as the document root.
    ///
    /// Valid positions run from 0 through `content_size()` inclusive.
    pub fn resolve(&self, pos: usize) -> Result<ResolvedPos, ModelError> {
        if pos > self.content_size() {
            return Err(ModelError::OutOfRange {
                pos,
                size: self.content_size(),
            });
        }
        let mut path = Vec::new();
        let mut node = self.clone();
        let mut content_start = 0;
        let mut remaining = pos;
        loop {
            let (index, child_start) = node
                .content()
                .find_index(remaining)
                .expect("offset checked against content size");
            let descend = match node.content().child(index) {
                Some(child) if remaining > child_start && !child.is_text() => Some(child.clone()),
                _ => None,
            };
            path.push((node, index, content_start));
            match descend {
                Some(child) => {
                    content_start = content_start + child_start + 1;
                    remaining = remaining - child_start - 1;
                    node = child;
                }
                None => {
                    return Ok(ResolvedPos {
                        pos,
                        parent_offset: remaining,
                        path,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::markdown_schema;

    fn two_paragraph_doc() -> Node {
        let schema = markdown_schema();
        let p1 = schema
            .node("paragraph", None, vec![schema.text("ab")], vec![])
            .unwrap();
        let p2 = schema
            .node("paragraph", None, vec![schema.text("cd")], vec![])
            .unwrap();
        schema.node("doc", None, vec![p1, p2], vec![]).unwrap()
    }

    #[test]
    fn resolve_at_document_start() {
        let doc = two_paragraph_doc();
        let rp = doc.resolve(0).unwrap();
        assert_eq!(rp.depth(), 0);
        assert_eq!(rp.index(0), 0);
        assert_eq!(rp.parent_offset(), 0);
    }

    #[test]
    fn resolve_inside_text() {
        let doc = two_paragraph_doc();
        // Positions: 0 before p1, 1 before "ab", 2 between a and b.
        let rp = doc.resolve(2).unwrap();
        assert_eq!(rp.depth(), 1);
        assert_eq!(rp.parent().type_name(), "paragraph");
        assert_eq!(rp.parent_offset(), 1);
        assert_eq!(rp.start(1), 1);
        assert_eq!(rp.end(1), 3);
        assert_eq!(rp.before(1), 0);
        assert_eq!(rp.after(1), 4);
    }

    #[test]
    fn resolve_between_blocks() {
        let doc = two_paragraph_doc();
        let rp = doc.resolve(4).unwrap();
        assert_eq!(rp.depth(), 0);
        assert_eq!(rp.index(0), 1);
        assert_eq!(rp.node_before().unwrap().type_name(), "paragraph");
        assert_eq!(rp.node_after().unwrap().type_name(), "paragraph");
    }

    #[test]
    fn resolve_second_paragraph_interior() {
        let doc = two_paragraph_doc();
        let rp = doc.resolve(6).unwrap();
        assert_eq!(rp.parent().type_name(), "paragraph");
        assert_eq!(rp.start(1), 5);
        assert_eq!(rp.parent_offset(), 1);
        assert_eq!(rp.node_after().unwrap().text(), Some("d"));
        assert_eq!(rp.node_before().unwrap().text(), Some("c"));
    }

    #[test]
    fn resolve_out_of_range() {
        let doc = two_paragraph_doc();
        assert!(matches!(
            doc.resolve(9),
            Err(ModelError::OutOfRange { pos: 9, size: 8 })
        ));
    }

    #[test]
    fn depth_of_finds_nearest_ancestor() {
        let doc = two_paragraph_doc();
        let rp = doc.resolve(2).unwrap();
        assert_eq!(rp.depth_of("paragraph"), Some(1));
        assert_eq!(rp.depth_of("doc"), Some(0));
        assert_eq!(rp.depth_of("table"), None);
    }
}
