//! high-level operations: staging, snapshots, commits, history

mod add;
mod commit;
mod log;
mod ls_tree;
mod status;
mod walk;
mod write_tree;

pub use add::{add, AddOptions, AddResult, CancelFlag, HideDotfiles, IgnoreRules, NoIgnore};
pub use commit::{commit, CommitOptions, CommitResult};
pub use log::{log, log_from, LogEntry};
pub use ls_tree::{ls_tree, LsTreeItem, LsTreeOptions};
pub use status::{status, StagedChange, StatusReport};
pub use walk::{commit_files, head_files, tree_files};
pub use write_tree::write_tree_from_index;
