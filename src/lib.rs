//! srcctl - git-compatible version control core
//!
//! a content-addressed object database, a binary staging index, and the
//! tree/commit machinery bridging them. the on-disk formats (loose
//! objects, DIRC v2 index, refs) are bit-for-bit compatible with stock
//! git; only the metadata directory name differs (`.source/`).
//!
//! # Core concepts
//!
//! - **Blob**: file contents, addressed by SHA-1 over the framed form
//!   `"blob <size>\0<content>"`, stored zlib-deflated
//! - **Tree**: a sorted directory snapshot of `(mode, name, id)` entries
//! - **Commit**: a root tree plus parents, identities and a message
//! - **Index**: the staging area recording the intended next commit
//! - **Ref**: `HEAD` plus named pointers under `refs/heads` and `refs/tags`
//!
//! # Example usage
//!
//! ```no_run
//! use std::path::Path;
//! use srcctl::{ops, Index, Repository};
//!
//! // initialize a repository and stage a directory
//! let repo = Repository::init(Path::new("/path/to/project")).unwrap();
//! let mut index = Index::load(&repo).unwrap();
//! ops::add(&repo, &mut index, &["src".into()], &ops::NoIgnore, &Default::default()).unwrap();
//! index.save(&repo).unwrap();
//!
//! // snapshot the index as a commit on the current branch
//! ops::commit(&repo, &index, &ops::CommitOptions::new("initial import")).unwrap();
//! ```

mod config;
mod error;
mod hash;
mod lockfile;
mod refs;
mod repo;
mod store;
mod types;

pub mod index;
pub mod ops;

pub use config::{resolve_identity, Config, IdentityRole};
pub use error::{Error, Result};
pub use hash::{compute_object_id, hash_bytes, ObjectId};
pub use index::{compare_entry, CompareOptions, EntryDiff, Index, IndexEntry};
pub use lockfile::LockFile;
pub use refs::{
    read_head, read_ref, ref_exists, resolve_revision, update_head, write_ref, Head,
};
pub use repo::{InitOptions, Repository, DEFAULT_DIR_NAME, DIR_ENV};
pub use store::{
    has_object, object_path, read_blob, read_commit, read_object, read_object_header, read_tree,
    resolve_short_id, write_blob, write_commit, write_object, write_tree,
};
pub use types::{frame, parse_frame, Commit, FileMode, Object, ObjectKind, Signature, Tree, TreeEntry};
