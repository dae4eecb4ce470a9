mod content;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, SchemaError};
use crate::markdown::serialize::{MarkDelimFn, NodeSerializerFn};
use crate::model::{AttrValue, Attrs, Fragment, Mark, Node};

pub(crate) use content::ContentExpr;

/// Declaration of a node type, contributed to a [`SchemaBuilder`].
///
/// `attrs` maps attribute names to their defaults; a `None` default marks the
/// attribute as required at construction time. `marks` restricts which mark
/// types may appear on inline children (`Some("")` forbids all, `None` allows
/// every registered mark).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeSpec {
    pub content: Option<String>,
    pub group: Option<String>,
    #[serde(default)]
    pub attrs: BTreeMap<String, Option<AttrValue>>,
    #[serde(default)]
    pub inline: bool,
    pub marks: Option<String>,
}

/// Declaration of a mark type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarkSpec {
    #[serde(default)]
    pub attrs: BTreeMap<String, Option<AttrValue>>,
    pub excludes: Option<String>,
}

#[derive(Debug)]
pub struct NodeType {
    name: String,
    spec: NodeSpec,
    expr: Option<ContentExpr>,
    groups: Vec<String>,
    allowed_marks: Option<Vec<String>>,
}

impl NodeType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &NodeSpec {
        &self.spec
    }

    pub fn is_inline(&self) -> bool {
        self.spec.inline
    }

    pub fn is_leaf(&self) -> bool {
        self.expr.is_none()
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }

    fn allows_mark(&self, mark: &str) -> bool {
        match &self.allowed_marks {
            None => true,
            Some(allowed) => allowed.iter().any(|m| m == mark),
        }
    }
}

#[derive(Debug)]
pub struct MarkType {
    name: String,
    spec: MarkSpec,
    rank: usize,
    excludes: Vec<String>,
}

impl MarkType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &MarkSpec {
        &self.spec
    }
}

/// The frozen registry of node and mark types for one editing session.
///
/// Built once by [`SchemaBuilder::build`], immutable afterwards. Every
/// document tree is validated against exactly one schema, and the serializer
/// dispatches through the per-type function tables registered here.
pub struct Schema {
    nodes: BTreeMap<String, NodeType>,
    marks: BTreeMap<String, MarkType>,
    top: String,
    node_serializers: BTreeMap<String, NodeSerializerFn>,
    mark_serializers: BTreeMap<String, MarkDelimFn>,
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("marks", &self.marks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Schema {
    pub fn node_type(&self, name: &str) -> Option<&NodeType> {
        self.nodes.get(name)
    }

    pub fn mark_type(&self, name: &str) -> Option<&MarkType> {
        self.marks.get(name)
    }

    pub fn top_node(&self) -> &str {
        &self.top
    }

    pub fn mark_rank(&self, name: &str) -> Option<usize> {
        self.marks.get(name).map(|m| m.rank)
    }

    pub fn mark_excludes(&self, name: &str) -> Vec<String> {
        self.marks
            .get(name)
            .map(|m| m.excludes.clone())
            .unwrap_or_default()
    }

    pub(crate) fn node_serializer(&self, name: &str) -> Option<&NodeSerializerFn> {
        self.node_serializers.get(name)
    }

    pub(crate) fn mark_serializer(&self, name: &str) -> Option<&MarkDelimFn> {
        self.mark_serializers.get(name)
    }

    /// Construct a node, validating content grammar, marks, and attributes.
    pub fn node(
        &self,
        type_name: &str,
        attrs: Option<Attrs>,
        children: Vec<Node>,
        marks: Vec<Mark>,
    ) -> Result<Node, ModelError> {
        let nt = self
            .nodes
            .get(type_name)
            .ok_or_else(|| ModelError::UnknownNodeType(type_name.to_string()))?;
        let attrs = self.fill_attrs(type_name, &nt.spec.attrs, attrs)?;
        let content = Fragment::from_nodes(children);
        self.check_content(type_name, &content)?;
        Ok(Node::new_internal(
            type_name,
            attrs,
            content,
            marks,
            nt.is_leaf(),
        ))
    }

    /// A plain text node.
    pub fn text(&self, text: impl Into<String>) -> Node {
        Node::text_internal(text, Vec::new())
    }

    /// A text node carrying marks.
    pub fn text_marked(&self, text: impl Into<String>, marks: Vec<Mark>) -> Node {
        Node::text_internal(text, marks)
    }

    /// Construct a mark, filling attribute defaults.
    pub fn mark(&self, type_name: &str, attrs: Option<Attrs>) -> Result<Mark, ModelError> {
        let mt = self
            .marks
            .get(type_name)
            .ok_or_else(|| ModelError::UnknownMarkType(type_name.to_string()))?;
        let attrs = self.fill_attrs(type_name, &mt.spec.attrs, attrs)?;
        Ok(Mark::new(type_name, attrs))
    }

    /// A minimal valid node of the given type: default attributes, content
    /// grammar satisfied with the fewest possible (recursively default)
    /// children. Used to conjure empty paragraphs and table cells.
    pub fn make_default(&self, type_name: &str) -> Result<Node, ModelError> {
        let nt = self
            .nodes
            .get(type_name)
            .ok_or_else(|| ModelError::UnknownNodeType(type_name.to_string()))?;
        let children = match &nt.expr {
            None => Vec::new(),
            Some(expr) => expr
                .fill_types()
                .into_iter()
                .map(|t| self.make_default(t))
                .collect::<Result<Vec<_>, _>>()?,
        };
        self.node(type_name, None, children, Vec::new())
    }

    /// Verify a child fragment against a node type's content grammar and mark
    /// restrictions.
    pub fn check_content(&self, type_name: &str, content: &Fragment) -> Result<(), ModelError> {
        let nt = self
            .nodes
            .get(type_name)
            .ok_or_else(|| ModelError::UnknownNodeType(type_name.to_string()))?;
        match &nt.expr {
            None => {
                if !content.is_empty() {
                    return Err(ModelError::SchemaViolation(format!(
                        "leaf node '{type_name}' cannot have content"
                    )));
                }
            }
            Some(expr) => {
                let names: Vec<&str> = content.children().iter().map(Node::type_name).collect();
                if !expr.matches(&names) {
                    return Err(ModelError::SchemaViolation(format!(
                        "invalid content for '{type_name}': [{}]",
                        names.join(", ")
                    )));
                }
            }
        }
        for child in content.children() {
            for mark in child.marks() {
                if !nt.allows_mark(mark.type_name()) {
                    return Err(ModelError::SchemaViolation(format!(
                        "mark '{}' not allowed inside '{type_name}'",
                        mark.type_name()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Whether content from a node of type `from` may be joined into a node
    /// of type `into` (same type, or identical content expressions).
    pub fn compatible_content(&self, into: &str, from: &str) -> bool {
        if into == from {
            return true;
        }
        match (self.nodes.get(into), self.nodes.get(from)) {
            (Some(a), Some(b)) => a.spec.content.is_some() && a.spec.content == b.spec.content,
            _ => false,
        }
    }

    fn fill_attrs(
        &self,
        owner: &str,
        declared: &BTreeMap<String, Option<AttrValue>>,
        given: Option<Attrs>,
    ) -> Result<Attrs, ModelError> {
        let given = given.unwrap_or_default();
        let mut attrs = Attrs::new();
        for (name, default) in declared {
            match given.get(name).cloned().or_else(|| default.clone()) {
                Some(value) => {
                    attrs.insert(name.clone(), value);
                }
                None => {
                    return Err(ModelError::MissingAttr {
                        owner: owner.to_string(),
                        attr: name.clone(),
                    });
                }
            }
        }
        for (name, value) in given {
            attrs.entry(name).or_insert(value);
        }
        Ok(attrs)
    }
}

/// Accumulates node specs, mark specs, and serializer functions, then
/// validates and freezes them into a [`Schema`].
///
/// This is the plugin surface of the engine: external collaborators add their
/// types here before `build`; afterwards the registry is immutable for the
/// session.
#[derive(Default)]
pub struct SchemaBuilder {
    nodes: Vec<(String, NodeSpec)>,
    marks: Vec<(String, MarkSpec)>,
    node_serializers: BTreeMap<String, NodeSerializerFn>,
    mark_serializers: BTreeMap<String, MarkDelimFn>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(mut self, name: &str, spec: NodeSpec) -> Self {
        self.nodes.push((name.to_string(), spec));
        self
    }

    pub fn mark(mut self, name: &str, spec: MarkSpec) -> Self {
        self.marks.push((name.to_string(), spec));
        self
    }

    pub fn node_serializer(mut self, name: &str, f: NodeSerializerFn) -> Self {
        self.node_serializers.insert(name.to_string(), f);
        self
    }

    pub fn mark_serializer(mut self, name: &str, f: MarkDelimFn) -> Self {
        self.mark_serializers.insert(name.to_string(), f);
        self
    }

    /// Validate every declaration and freeze the registry.
    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut known: Vec<String> = Vec::new();
        for (name, spec) in &self.nodes {
            if known.contains(name) {
                return Err(SchemaError::DuplicateNode(name.clone()));
            }
            known.push(name.clone());
            if let Some(group_list) = &spec.group {
                for group in group_list.split_whitespace() {
                    groups.entry(group.to_string()).or_default().push(name.clone());
                }
            }
        }

        let mark_names: Vec<String> = self.marks.iter().map(|(n, _)| n.clone()).collect();
        let mut marks = BTreeMap::new();
        for (rank, (name, spec)) in self.marks.into_iter().enumerate() {
            if marks.contains_key(&name) {
                return Err(SchemaError::DuplicateMark(name));
            }
            let mut excludes = Vec::new();
            if let Some(list) = &spec.excludes {
                for excluded in list.split_whitespace() {
                    if !mark_names.iter().any(|m| m == excluded) {
                        return Err(SchemaError::UnknownExcludedMark {
                            owner: name.clone(),
                            name: excluded.to_string(),
                        });
                    }
                    excludes.push(excluded.to_string());
                }
            }
            marks.insert(
                name.clone(),
                MarkType {
                    name,
                    spec,
                    rank,
                    excludes,
                },
            );
        }

        let mut nodes = BTreeMap::new();
        for (name, spec) in self.nodes {
            let expr = match &spec.content {
                Some(source) => Some(ContentExpr::parse(&name, source, &groups, &known)?),
                None => None,
            };
            let allowed_marks = match &spec.marks {
                None => None,
                Some(list) if list == "_" => None,
                Some(list) => {
                    let allowed: Vec<String> =
                        list.split_whitespace().map(str::to_string).collect();
                    for mark in &allowed {
                        if !mark_names.iter().any(|m| m == mark) {
                            return Err(SchemaError::UnknownContentName {
                                owner: name.clone(),
                                name: mark.clone(),
                            });
                        }
                    }
                    Some(allowed)
                }
            };
            let node_groups = spec
                .group
                .as_deref()
                .map(|g| g.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default();
            nodes.insert(
                name.clone(),
                NodeType {
                    name,
                    spec,
                    expr,
                    groups: node_groups,
                    allowed_marks,
                },
            );
        }

        if !nodes.contains_key("doc") {
            return Err(SchemaError::MissingTopNode("doc".to_string()));
        }

        Ok(Schema {
            nodes,
            marks,
            top: "doc".to_string(),
            node_serializers: self.node_serializers,
            mark_serializers: self.mark_serializers,
        })
    }
}

fn spec(content: Option<&str>, group: Option<&str>) -> NodeSpec {
    NodeSpec {
        content: content.map(str::to_string),
        group: group.map(str::to_string),
        ..NodeSpec::default()
    }
}

fn with_attrs<const N: usize>(
    mut node_spec: NodeSpec,
    attrs: [(&str, Option<AttrValue>); N],
) -> NodeSpec {
    for (name, default) in attrs {
        node_spec.attrs.insert(name.to_string(), default);
    }
    node_spec
}

fn str_attr(value: &str) -> Option<AttrValue> {
    Some(AttrValue::Str(value.to_string()))
}

/// The builder pre-loaded with the markdown dialect's node and mark types,
/// ready for plugin contributions before freezing.
pub fn markdown_schema_builder() -> SchemaBuilder {
    let inline_leaf = |mut s: NodeSpec| {
        s.inline = true;
        s
    };

    let builder = SchemaBuilder::new()
        .node("doc", spec(Some("block+"), None))
        .node("paragraph", spec(Some("inline*"), Some("block")))
        .node(
            "heading",
            with_attrs(
                spec(Some("inline*"), Some("block")),
                [
                    ("level", Some(AttrValue::Int(1))),
                    ("markup", str_attr("atx")),
                ],
            ),
        )
        .node("blockquote", spec(Some("block+"), Some("block")))
        .node(
            "code_block",
            with_attrs(
                NodeSpec {
                    marks: Some(String::new()),
                    ..spec(Some("text*"), Some("block"))
                },
                [("info", str_attr("")), ("markup", str_attr("```"))],
            ),
        )
        .node(
            "bullet_list",
            with_attrs(
                spec(Some("list_item+"), Some("block")),
                [
                    ("bullet", str_attr("-")),
                    ("tight", Some(AttrValue::Bool(true))),
                ],
            ),
        )
        .node(
            "ordered_list",
            with_attrs(
                spec(Some("list_item+"), Some("block")),
                [
                    ("start", Some(AttrValue::Int(1))),
                    ("delim", str_attr(".")),
                    ("tight", Some(AttrValue::Bool(true))),
                    ("numbering", str_attr("sequence")),
                ],
            ),
        )
        .node("list_item", spec(Some("block+"), None))
        .node("table", spec(Some("table_head table_body*"), Some("block")))
        .node("table_head", spec(Some("table_row+"), None))
        .node("table_body", spec(Some("table_row+"), None))
        .node(
            "table_row",
            spec(Some("(table_cell | table_header)+"), None),
        )
        .node(
            "table_cell",
            with_attrs(spec(Some("inline*"), None), [("align", str_attr(""))]),
        )
        .node(
            "table_header",
            with_attrs(spec(Some("inline*"), None), [("align", str_attr(""))]),
        )
        .node(
            "horizontal_rule",
            with_attrs(spec(None, Some("block")), [("markup", str_attr("---"))]),
        )
        .node(
            "html_block",
            with_attrs(spec(None, Some("block")), [("html", str_attr(""))]),
        )
        .node(
            "html_inline",
            inline_leaf(with_attrs(
                spec(None, Some("inline")),
                [("html", str_attr(""))],
            )),
        )
        .node(
            "image",
            inline_leaf(with_attrs(
                spec(None, Some("inline")),
                [
                    ("src", None),
                    ("alt", str_attr("")),
                    ("title", str_attr("")),
                    ("markup", str_attr("inline")),
                ],
            )),
        )
        .node(
            "hard_break",
            inline_leaf(with_attrs(
                spec(None, Some("inline")),
                [("markup", str_attr("\\"))],
            )),
        )
        .node(
            "text",
            NodeSpec {
                inline: true,
                group: Some("inline".to_string()),
                ..NodeSpec::default()
            },
        )
        .mark(
            "em",
            MarkSpec {
                attrs: BTreeMap::from([("markup".to_string(), str_attr("*"))]),
                excludes: None,
            },
        )
        .mark(
            "strong",
            MarkSpec {
                attrs: BTreeMap::from([("markup".to_string(), str_attr("**"))]),
                excludes: None,
            },
        )
        .mark(
            "strike",
            MarkSpec {
                attrs: BTreeMap::from([("markup".to_string(), str_attr("~~"))]),
                excludes: None,
            },
        )
        .mark(
            "link",
            MarkSpec {
                attrs: BTreeMap::from([
                    ("href".to_string(), None),
                    ("title".to_string(), str_attr("")),
                    ("markup".to_string(), str_attr("inline")),
                    ("ref_label".to_string(), str_attr("")),
                ]),
                excludes: None,
            },
        )
        .mark(
            "code",
            MarkSpec {
                attrs: BTreeMap::from([("markup".to_string(), str_attr("`"))]),
                excludes: Some("em strong strike link".to_string()),
            },
        );

    crate::markdown::serialize::register_default_serializers(builder)
}

/// The frozen markdown schema with default serializers.
pub fn markdown_schema() -> Schema {
    markdown_schema_builder()
        .build()
        .expect("built-in markdown schema is valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_the_markdown_schema() {
        let schema = markdown_schema();
        assert_eq!(schema.top_node(), "doc");
        assert!(schema.node_type("table").is_some());
        assert!(schema.mark_type("em").is_some());
    }

    #[test]
    fn duplicate_node_fails() {
        let err = SchemaBuilder::new()
            .node("doc", spec(Some("block+"), None))
            .node("doc", spec(Some("block+"), None))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateNode(name) if name == "doc"));
    }

    #[test]
    fn unknown_content_name_fails() {
        let err = SchemaBuilder::new()
            .node("doc", spec(Some("phantom+"), None))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownContentName { .. }));
    }

    #[test]
    fn unknown_excluded_mark_fails() {
        let err = SchemaBuilder::new()
            .node("doc", spec(Some("text*"), None))
            .node("text", NodeSpec { inline: true, ..NodeSpec::default() })
            .mark(
                "code",
                MarkSpec {
                    excludes: Some("phantom".to_string()),
                    ..MarkSpec::default()
                },
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownExcludedMark { .. }));
    }

    #[test]
    fn missing_top_node_fails() {
        let err = SchemaBuilder::new()
            .node("paragraph", spec(None, None))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::MissingTopNode(_)));
    }

    #[test]
    fn required_attr_is_enforced() {
        let schema = markdown_schema();
        let err = schema.node("image", None, vec![], vec![]).unwrap_err();
        assert!(matches!(err, ModelError::MissingAttr { attr, .. } if attr == "src"));
    }

    #[test]
    fn attr_defaults_are_filled() {
        let schema = markdown_schema();
        let heading = schema
            .node("heading", None, vec![schema.text("t")], vec![])
            .unwrap();
        assert_eq!(heading.attr("level"), Some(&AttrValue::Int(1)));
        assert_eq!(heading.attr_str("markup"), "atx");
    }

    #[test]
    fn code_block_rejects_marked_text() {
        let schema = markdown_schema();
        let em = schema.mark("em", None).unwrap();
        let marked = schema.text_marked("x", vec![em]);
        let err = schema.node("code_block", None, vec![marked], vec![]).unwrap_err();
        assert!(matches!(err, ModelError::SchemaViolation(_)));
    }

    #[test]
    fn make_default_builds_minimal_table() {
        let schema = markdown_schema();
        let table = schema.make_default("table").unwrap();
        assert_eq!(table.type_name(), "table");
        assert_eq!(table.child_count(), 1);
        assert_eq!(table.child(0).unwrap().type_name(), "table_head");
    }
}
