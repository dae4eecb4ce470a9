/// Errors raised while building a [`Schema`](crate::schema::Schema).
///
/// Schema construction happens once at session start and these are all fatal:
/// a registry that references unknown types or declares empty groups cannot be
/// repaired at runtime.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("duplicate node type: {0}")]
    DuplicateNode(String),
    #[error("duplicate mark type: {0}")]
    DuplicateMark(String),
    #[error("content expression for '{owner}' references unknown name: {name}")]
    UnknownContentName { owner: String, name: String },
    #[error("group '{0}' has no member types")]
    EmptyGroup(String),
    #[error("content expression for '{owner}' is ambiguous: '{name}' appears in more than one branch of an alternation")]
    AmbiguousAlternation { owner: String, name: String },
    #[error("malformed content expression for '{owner}': {reason}")]
    MalformedExpression { owner: String, reason: String },
    #[error("mark spec '{owner}' excludes unknown mark: {name}")]
    UnknownExcludedMark { owner: String, name: String },
    #[error("schema has no '{0}' node type")]
    MissingTopNode(String),
}

/// Errors raised by document-tree operations.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// A node was constructed (or would be constructed) with content that does
    /// not satisfy its type's grammar, or with marks its type forbids.
    #[error("schema violation: {0}")]
    SchemaViolation(String),
    /// A position or offset points outside the tree it was used against.
    #[error("position {pos} out of range (document size {size})")]
    OutOfRange { pos: usize, size: usize },
    #[error("unknown node type: {0}")]
    UnknownNodeType(String),
    #[error("unknown mark type: {0}")]
    UnknownMarkType(String),
    #[error("missing required attribute '{attr}' on '{owner}'")]
    MissingAttr { owner: String, attr: String },
}

/// Errors raised while applying a [`Step`](crate::transform::Step).
///
/// A failing step aborts its whole transaction; the document the transaction
/// was built against is left untouched.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("replace slice cannot fit at this position: {0}")]
    BadReplace(String),
    #[error("step range does not land on node boundaries")]
    NotAtBoundary,
    #[error("lift range is not wrapped {levels} levels deep")]
    NotLiftable { levels: usize },
}

/// Errors raised while serializing a tree to markdown text.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("no serializer registered for node type '{0}'")]
    UnknownNode(String),
    #[error("no serializer registered for mark type '{0}'")]
    UnknownMark(String),
}

// Internal parse abort reasons. Never escapes `parse`: every variant is
// converted into the fallback document.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ParseAbort {
    #[error("node budget of {0} exhausted")]
    BudgetExhausted(usize),
    #[error("unbalanced token stream")]
    Unbalanced,
    #[error(transparent)]
    Model(#[from] ModelError),
}
