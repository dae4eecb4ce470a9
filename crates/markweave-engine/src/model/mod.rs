pub mod attrs;
pub mod mark;
pub mod node;
pub mod position;
pub mod slice;

pub use attrs::{attrs, AttrValue, Attrs};
pub use mark::Mark;
pub use node::{Fragment, Node};
pub use position::ResolvedPos;
pub use slice::Slice;
