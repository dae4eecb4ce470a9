//! Bidirectional markdown / rich-document editing core.
//!
//! The engine keeps two representations of a document in sync: a markdown
//! text string and a typed, immutable tree validated against a frozen
//! [`Schema`](schema::Schema). [`markdown::parse`] and
//! [`markdown::serialize`] are the only transitions between the two, and the
//! structural commands in [`commands`] mutate the tree through
//! position-mapped [`Transaction`](transform::Transaction)s.

pub mod commands;
pub mod error;
pub mod markdown;
pub mod model;
pub mod schema;
pub mod state;
pub mod transform;

pub use commands::{default_commands, Command, CommandRegistry, CommandRegistryBuilder};
pub use error::{ModelError, SchemaError, SerializeError, TransformError};
pub use markdown::{parse, serialize};
pub use model::{Attrs, Fragment, Mark, Node, ResolvedPos, Slice};
pub use schema::{markdown_schema, markdown_schema_builder, MarkSpec, NodeSpec, Schema, SchemaBuilder};
pub use state::{EditorState, Selection};
pub use transform::{Assoc, Mapping, Step, StepMap, Transaction};
