//! data model: objects, trees, commits

mod commit;
mod object;
mod tree;

pub use commit::{Commit, Signature};
pub use object::{frame, parse_frame, Object, ObjectKind};
pub use tree::{FileMode, Tree, TreeEntry};
