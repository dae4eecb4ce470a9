use std::fmt;
use std::sync::Arc;

use crate::model::attrs::{AttrValue, Attrs};
use crate::model::mark::Mark;

/// An ordered sequence of sibling nodes, with its total token size cached.
///
/// Offsets into a fragment use the flattened token scheme: position 0 is
/// before the first child, each child occupies its `node_size`, and the
/// fragment's `size` is the sum of all child sizes.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    children: Vec<Node>,
    size: usize,
}

impl Fragment {
    pub fn empty() -> Self {
        Fragment {
            children: Vec::new(),
            size: 0,
        }
    }

    /// Build a fragment, merging adjacent text nodes that carry identical
    /// mark sets (the no-redundant-splitting invariant).
    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        let mut frag = Fragment::empty();
        for node in nodes {
            frag.push(node);
        }
        frag
    }

    /// Append a node, merging it into the previous child when both are text
    /// runs with the same marks.
    pub fn push(&mut self, node: Node) {
        if let Some(last) = self.children.last() {
            if let (Some(a), Some(b)) = (last.text(), node.text()) {
                if last.marks() == node.marks() {
                    let merged = Node::text_internal(format!("{a}{b}"), last.marks().to_vec());
                    self.size = self.size - last.node_size() + merged.node_size();
                    *self.children.last_mut().unwrap() = merged;
                    return;
                }
            }
        }
        self.size += node.node_size();
        self.children.push(node);
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn child(&self, index: usize) -> Option<&Node> {
        self.children.get(index)
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Find the child containing (or bordering) content offset `pos`.
    ///
    /// Returns `(index, offset_of_child_start)`. When `pos` sits exactly on a
    /// child boundary the returned index is the child starting there; for
    /// `pos == size` the index is `len()`.
    pub fn find_index(&self, pos: usize) -> Option<(usize, usize)> {
        if pos > self.size {
            return None;
        }
        let mut offset = 0;
        for (i, child) in self.children.iter().enumerate() {
            if pos == offset {
                return Some((i, offset));
            }
            let end = offset + child.node_size();
            if pos < end {
                return Some((i, offset));
            }
            offset = end;
        }
        Some((self.len(), self.size))
    }

    /// Content offset of the start of child `index`.
    pub fn offset_of(&self, index: usize) -> usize {
        self.children[..index].iter().map(Node::node_size).sum()
    }

    /// The sub-fragment between content offsets `from` and `to`, cutting
    /// partially covered children.
    pub fn cut(&self, from: usize, to: usize) -> Fragment {
        if from == 0 && to == self.size {
            return self.clone();
        }
        let mut result = Fragment::empty();
        if to <= from {
            return result;
        }
        let mut pos = 0;
        for child in &self.children {
            if pos >= to {
                break;
            }
            let end = pos + child.node_size();
            if end > from {
                let piece = if pos < from || end > to {
                    if child.is_text() {
                        child.cut_text(from.saturating_sub(pos), (to - pos).min(child.node_size()))
                    } else {
                        let inner_from = from.saturating_sub(pos + 1);
                        let inner_to = (to - pos).saturating_sub(1).min(child.content().size());
                        child.copy(child.content().cut(inner_from, inner_to))
                    }
                } else {
                    child.clone()
                };
                result.push(piece);
            }
            pos = end;
        }
        result
    }

    /// A new fragment with `other`'s children appended (text runs merged).
    pub fn append(&self, other: &Fragment) -> Fragment {
        let mut result = self.clone();
        for child in &other.children {
            result.push(child.clone());
        }
        result
    }

    /// A new fragment with the child at `index` replaced.
    pub fn replace_child(&self, index: usize, node: Node) -> Fragment {
        let mut children = self.children.clone();
        children[index] = node;
        Fragment::from_nodes(children)
    }

    /// A new fragment with children `[from, to)` replaced by `nodes`.
    pub fn splice(&self, from: usize, to: usize, nodes: Vec<Node>) -> Fragment {
        let mut children: Vec<Node> = self.children[..from].to_vec();
        children.extend(nodes);
        children.extend(self.children[to..].iter().cloned());
        Fragment::from_nodes(children)
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            child.collect_text(&mut out);
        }
        out
    }
}

#[derive(Debug, PartialEq)]
struct NodeData {
    type_name: String,
    attrs: Attrs,
    content: Fragment,
    marks: Vec<Mark>,
    text: Option<String>,
    /// Leaf nodes (no content expression) occupy a single token.
    leaf: bool,
    /// Cached `node_size`.
    size: usize,
}

/// A typed element of the document tree.
///
/// Nodes are immutable; every "mutation" builds a new node. The `Arc` inside
/// makes cloning and structural sharing cheap, which the transaction engine
/// leans on heavily. Construction goes through [`Schema`](crate::schema::Schema)
/// so that a node's children always satisfy its type's content grammar.
#[derive(Clone)]
pub struct Node(Arc<NodeData>);

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || *self.0 == *other.0
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(text) = self.text() {
            write!(f, "text({text:?}")?;
            for mark in self.marks() {
                write!(f, ", {}", mark.type_name())?;
            }
            write!(f, ")")
        } else {
            write!(f, "{}(", self.type_name())?;
            for (i, child) in self.content().children().iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{child:?}")?;
            }
            write!(f, ")")
        }
    }
}

impl Node {
    pub(crate) fn new_internal(
        type_name: impl Into<String>,
        attrs: Attrs,
        content: Fragment,
        marks: Vec<Mark>,
        leaf: bool,
    ) -> Self {
        let size = if leaf { 1 } else { content.size() + 2 };
        Node(Arc::new(NodeData {
            type_name: type_name.into(),
            attrs,
            content,
            marks,
            text: None,
            leaf,
            size,
        }))
    }

    pub(crate) fn text_internal(text: impl Into<String>, marks: Vec<Mark>) -> Self {
        let text = text.into();
        let size = text.chars().count();
        Node(Arc::new(NodeData {
            type_name: "text".to_string(),
            attrs: Attrs::new(),
            content: Fragment::empty(),
            marks,
            text: Some(text),
            leaf: true,
            size,
        }))
    }

    pub fn type_name(&self) -> &str {
        &self.0.type_name
    }

    pub fn attrs(&self) -> &Attrs {
        &self.0.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.0.attrs.get(name)
    }

    /// String attribute, or `""` when absent or not a string.
    pub fn attr_str(&self, name: &str) -> &str {
        self.attr(name).and_then(AttrValue::as_str).unwrap_or("")
    }

    pub fn content(&self) -> &Fragment {
        &self.0.content
    }

    pub fn child_count(&self) -> usize {
        self.0.content.len()
    }

    pub fn child(&self, index: usize) -> Option<&Node> {
        self.0.content.child(index)
    }

    pub fn marks(&self) -> &[Mark] {
        &self.0.marks
    }

    pub fn is_text(&self) -> bool {
        self.0.text.is_some()
    }

    pub fn is_leaf(&self) -> bool {
        self.0.leaf
    }

    pub fn text(&self) -> Option<&str> {
        self.0.text.as_deref()
    }

    /// Size of this node in the flattened token stream: the char count for
    /// text, 1 for other leaves, content size plus the two boundary tokens
    /// otherwise.
    pub fn node_size(&self) -> usize {
        self.0.size
    }

    /// Size of the content positions inside this node (0 for leaves).
    pub fn content_size(&self) -> usize {
        self.0.content.size()
    }

    /// A node of the same type, attrs, and marks with different content.
    pub fn copy(&self, content: Fragment) -> Node {
        Node::new_internal(
            self.0.type_name.clone(),
            self.0.attrs.clone(),
            content,
            self.0.marks.clone(),
            self.0.leaf,
        )
    }

    /// A structurally identical node with replaced attributes. Text nodes
    /// carry no attributes and come back unchanged.
    pub fn with_attrs(&self, attrs: Attrs) -> Node {
        if let Some(text) = &self.0.text {
            return Node::text_internal(text.clone(), self.0.marks.clone());
        }
        Node::new_internal(
            self.0.type_name.clone(),
            attrs,
            self.0.content.clone(),
            self.0.marks.clone(),
            self.0.leaf,
        )
    }

    /// The same node with a different mark set (inline nodes only).
    pub fn with_marks(&self, marks: Vec<Mark>) -> Node {
        if let Some(text) = &self.0.text {
            return Node::text_internal(text.clone(), marks);
        }
        Node::new_internal(
            self.0.type_name.clone(),
            self.0.attrs.clone(),
            self.0.content.clone(),
            marks,
            self.0.leaf,
        )
    }

    /// Cut a text node to the given char range.
    pub(crate) fn cut_text(&self, from: usize, to: usize) -> Node {
        let text = self.0.text.as_deref().unwrap_or("");
        let piece: String = text.chars().skip(from).take(to.saturating_sub(from)).collect();
        Node::text_internal(piece, self.0.marks.clone())
    }

    /// Cut any node to a content range: chars for text, content offsets
    /// otherwise.
    pub fn cut(&self, from: usize, to: usize) -> Node {
        if self.is_text() {
            self.cut_text(from, to)
        } else {
            self.copy(self.0.content.cut(from, to))
        }
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        if let Some(text) = self.text() {
            out.push_str(text);
        } else {
            for child in self.0.content.children() {
                child.collect_text(out);
            }
        }
    }
}
