use std::collections::BTreeMap;

use crate::error::Result;
use crate::hash::ObjectId;
use crate::refs;
use crate::repo::Repository;
use crate::store;

/// flatten a tree into `path -> blob id`, recursing through
/// subdirectories
///
/// symlink and gitlink entries are recorded like files. any malformed
/// descendant fails the whole walk.
pub fn tree_files(
    repo: &Repository,
    tree_id: &ObjectId,
    base: &str,
) -> Result<BTreeMap<String, ObjectId>> {
    let mut files = BTreeMap::new();
    walk_into(repo, tree_id, base, &mut files)?;
    Ok(files)
}

fn walk_into(
    repo: &Repository,
    tree_id: &ObjectId,
    base: &str,
    files: &mut BTreeMap<String, ObjectId>,
) -> Result<()> {
    let tree = store::read_tree(repo, tree_id)?;

    for entry in tree.entries() {
        let path = if base.is_empty() {
            entry.name.clone()
        } else {
            format!("{}/{}", base, entry.name)
        };

        if entry.mode.is_tree() {
            walk_into(repo, &entry.id, &path, files)?;
        } else {
            files.insert(path, entry.id);
        }
    }
    Ok(())
}

/// the files reachable from a commit's root tree
pub fn commit_files(repo: &Repository, commit_id: &ObjectId) -> Result<BTreeMap<String, ObjectId>> {
    let commit = store::read_commit(repo, commit_id)?;
    tree_files(repo, &commit.tree, "")
}

/// the files recorded by the current HEAD commit; empty when HEAD is
/// unborn
pub fn head_files(repo: &Repository) -> Result<BTreeMap<String, ObjectId>> {
    match refs::read_head(repo)?.id() {
        Some(id) => commit_files(repo, &id),
        None => Ok(BTreeMap::new()),
    }
}
