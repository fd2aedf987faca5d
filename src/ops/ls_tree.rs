use std::fmt;

use crate::error::{Error, Result};
use crate::hash::ObjectId;
use crate::refs;
use crate::repo::Repository;
use crate::store;
use crate::types::{FileMode, Object, ObjectKind};

#[derive(Clone, Copy, Debug, Default)]
pub struct LsTreeOptions {
    /// descend into subtrees, listing leaves with full paths
    pub recursive: bool,
    /// list only tree entries
    pub dirs_only: bool,
    /// resolve object sizes for blob entries
    pub long: bool,
}

/// one listed entry
#[derive(Clone, Debug)]
pub struct LsTreeItem {
    pub mode: FileMode,
    pub kind: ObjectKind,
    pub id: ObjectId,
    /// object size; only filled for blobs under the `long` option
    pub size: Option<u64>,
    pub path: String,
}

impl fmt::Display for LsTreeItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}\t{}",
            self.mode.as_display(),
            self.kind,
            self.id,
            self.path
        )
    }
}

/// list the contents of a tree-ish
///
/// the revision may name a commit (listed through its root tree) or a
/// tree directly.
pub fn ls_tree(repo: &Repository, treeish: &str, opts: &LsTreeOptions) -> Result<Vec<LsTreeItem>> {
    let id = refs::resolve_revision(repo, treeish)?;
    let tree_id = peel_to_tree(repo, &id)?;

    let mut items = Vec::new();
    collect(repo, &tree_id, "", opts, &mut items)?;
    Ok(items)
}

fn peel_to_tree(repo: &Repository, id: &ObjectId) -> Result<ObjectId> {
    match store::read_object(repo, id)? {
        Object::Commit(commit) => Ok(commit.tree),
        Object::Tree(_) => Ok(*id),
        other => Err(Error::MalformedObject(format!(
            "not a tree-ish: {} is a {}",
            id,
            other.kind()
        ))),
    }
}

fn collect(
    repo: &Repository,
    tree_id: &ObjectId,
    base: &str,
    opts: &LsTreeOptions,
    items: &mut Vec<LsTreeItem>,
) -> Result<()> {
    let tree = store::read_tree(repo, tree_id)?;

    for entry in tree.entries() {
        let path = if base.is_empty() {
            entry.name.clone()
        } else {
            format!("{}/{}", base, entry.name)
        };
        let is_dir = entry.mode.is_tree();

        if opts.dirs_only {
            if is_dir {
                items.push(item(repo, entry.mode, entry.id, &path, opts)?);
                if opts.recursive {
                    collect(repo, &entry.id, &path, opts, items)?;
                }
            }
            continue;
        }

        if is_dir {
            if opts.recursive {
                collect(repo, &entry.id, &path, opts, items)?;
            } else {
                items.push(item(repo, entry.mode, entry.id, &path, opts)?);
            }
            continue;
        }

        items.push(item(repo, entry.mode, entry.id, &path, opts)?);
    }
    Ok(())
}

fn item(
    repo: &Repository,
    mode: FileMode,
    id: ObjectId,
    path: &str,
    opts: &LsTreeOptions,
) -> Result<LsTreeItem> {
    let kind = mode.object_kind();
    let size = if opts.long && kind == ObjectKind::Blob {
        Some(store::read_object_header(repo, &id)?.1)
    } else {
        None
    };
    Ok(LsTreeItem {
        mode,
        kind,
        id,
        size,
        path: path.to_string(),
    })
}
