use crate::config::{resolve_identity, IdentityRole};
use crate::error::{Error, Result};
use crate::hash::ObjectId;
use crate::index::Index;
use crate::refs;
use crate::repo::Repository;
use crate::store;
use crate::types::{Commit, Signature};

use super::write_tree::write_tree_from_index;

/// options for creating a commit
#[derive(Clone, Debug, Default)]
pub struct CommitOptions {
    pub message: String,
    /// explicit author; resolved from environment/config when absent
    pub author: Option<Signature>,
    /// explicit committer; resolved from environment/config when absent
    pub committer: Option<Signature>,
    /// allow a commit whose tree matches the current HEAD's
    pub allow_empty: bool,
    /// allow an empty message
    pub allow_empty_message: bool,
    /// replace the current HEAD commit instead of extending it
    pub amend: bool,
}

impl CommitOptions {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }
}

/// outcome of a commit
#[derive(Clone, Debug)]
pub struct CommitResult {
    pub id: ObjectId,
    pub tree: ObjectId,
    /// branch HEAD pointed at, unless detached
    pub branch: Option<String>,
    /// the ref value this commit replaced, for external reflogs
    pub previous: Option<ObjectId>,
    /// true when the new commit has no parents
    pub root: bool,
}

/// turn the index into a commit and advance HEAD
///
/// an amend takes over the parents of the commit it replaces; a normal
/// commit has the current HEAD as its single parent, or none on an
/// unborn branch. the no-change check compares root tree ids and is
/// skipped for amends and `allow_empty`.
pub fn commit(repo: &Repository, index: &Index, opts: &CommitOptions) -> Result<CommitResult> {
    let mut message = opts.message.clone();
    if message.trim().is_empty() && !opts.allow_empty_message {
        return Err(Error::EmptyCommit(
            "aborting commit due to empty commit message".to_string(),
        ));
    }
    if !message.is_empty() && !message.ends_with('\n') {
        message.push('\n');
    }

    let tree = write_tree_from_index(repo, index)?;
    let head = refs::read_head(repo)?;

    let parents = if opts.amend {
        let old = head
            .id()
            .ok_or_else(|| Error::EmptyCommit("you have nothing to amend".to_string()))?;
        store::read_commit(repo, &old)?.parents
    } else {
        head.id().map(|id| vec![id]).unwrap_or_default()
    };

    if !opts.amend && !opts.allow_empty {
        if let Some(head_id) = head.id() {
            if store::read_commit(repo, &head_id)?.tree == tree {
                return Err(Error::EmptyCommit(
                    "nothing to commit, working tree clean".to_string(),
                ));
            }
        }
    }

    let author = match &opts.author {
        Some(sig) => sig.clone(),
        None => {
            let (name, email) = resolve_identity(repo.config(), IdentityRole::Author)?;
            Signature::now(name, email)
        }
    };
    let committer = match &opts.committer {
        Some(sig) => sig.clone(),
        None => {
            let (name, email) = resolve_identity(repo.config(), IdentityRole::Committer)?;
            Signature::now(name, email)
        }
    };

    let object = Commit::new(tree, parents, author, committer, message);
    let root = object.is_root();
    let id = store::write_commit(repo, &object)?;
    let previous = refs::update_head(repo, &id)?;

    Ok(CommitResult {
        id,
        tree,
        branch: head.branch_name().map(String::from),
        previous,
        root,
    })
}
