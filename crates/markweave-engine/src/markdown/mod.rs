mod escape;
pub mod parse;
pub mod serialize;

pub use parse::{parse, parse_with_budget, DEFAULT_NODE_BUDGET};
pub use serialize::{serialize, MarkDelimFn, MarkdownWriter, NodeSerializerFn};
