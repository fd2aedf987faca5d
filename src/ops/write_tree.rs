use std::collections::BTreeMap;

use crate::error::Result;
use crate::hash::ObjectId;
use crate::index::Index;
use crate::repo::Repository;
use crate::store;
use crate::types::{FileMode, Tree, TreeEntry};

/// fold the flat index into a hierarchy of tree objects
///
/// entries are bucketed by parent directory, ancestor buckets are
/// synthesized for deep paths, and trees are written deepest-first so
/// every parent can reference its children by id. writes are
/// idempotent, so unchanged subtrees cost nothing. returns the root
/// tree id; an empty index yields the empty tree.
pub fn write_tree_from_index(repo: &Repository, index: &Index) -> Result<ObjectId> {
    // directory path -> entries directly inside it ("" is the root)
    let mut buckets: BTreeMap<String, Vec<TreeEntry>> = BTreeMap::new();
    buckets.insert(String::new(), Vec::new());

    for entry in index.entries() {
        let (dir, name) = split_parent(&entry.path);
        buckets
            .entry(dir.to_string())
            .or_default()
            .push(TreeEntry::new(entry.mode, name, entry.id));

        // every ancestor up to the root must exist as a bucket
        let mut ancestor = dir;
        while !ancestor.is_empty() {
            let parent = split_parent(ancestor).0;
            buckets.entry(parent.to_string()).or_default();
            ancestor = parent;
        }
    }

    // deepest directories first, so subtree ids exist before their
    // parents are serialized
    let mut dirs: Vec<String> = buckets.keys().filter(|d| !d.is_empty()).cloned().collect();
    dirs.sort_by_key(|d| std::cmp::Reverse(depth(d)));

    for dir in dirs {
        let entries = buckets.remove(&dir).unwrap_or_default();
        let id = store::write_tree(repo, &Tree::new(entries)?)?;

        let (parent, name) = split_parent(&dir);
        buckets
            .entry(parent.to_string())
            .or_default()
            .push(TreeEntry::new(FileMode::Directory, name, id));
    }

    let root_entries = buckets.remove("").unwrap_or_default();
    store::write_tree(repo, &Tree::new(root_entries)?)
}

/// split a `/`-separated path into (parent directory, basename)
fn split_parent(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(i) => (&path[..i], &path[i + 1..]),
        None => ("", path),
    }
}

fn depth(dir: &str) -> usize {
    dir.matches('/').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexEntry;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    fn entry(path: &str, mode: FileMode, id_byte: u8) -> IndexEntry {
        IndexEntry {
            ctime_sec: 0,
            ctime_nsec: 0,
            mtime_sec: 0,
            mtime_nsec: 0,
            dev: 0,
            ino: 0,
            mode,
            uid: 0,
            gid: 0,
            file_size: 0,
            id: ObjectId::from_bytes([id_byte; 20]),
            assume_valid: false,
            stage: 0,
            path: path.to_string(),
        }
    }

    fn index_of(entries: Vec<IndexEntry>) -> Index {
        let mut index = Index::new();
        for e in entries {
            index.upsert(e);
        }
        index
    }

    #[test]
    fn test_empty_index_writes_empty_tree() {
        let (_dir, repo) = test_repo();
        let root = write_tree_from_index(&repo, &Index::new()).unwrap();
        assert_eq!(root.to_hex(), "4b825dc642cb6eb9a060e54bf8d69288fbee4904");
    }

    #[test]
    fn test_flat_index() {
        let (_dir, repo) = test_repo();
        let index = index_of(vec![
            entry("a.txt", FileMode::Regular, 1),
            entry("b.txt", FileMode::Regular, 2),
        ]);

        let root = write_tree_from_index(&repo, &index).unwrap();
        let tree = store::read_tree(&repo, &root).unwrap();

        assert_eq!(tree.len(), 2);
        assert_eq!(tree.get("a.txt").unwrap().id, ObjectId::from_bytes([1; 20]));
    }

    #[test]
    fn test_nested_directories() {
        let (_dir, repo) = test_repo();
        let index = index_of(vec![
            entry("src/lib.rs", FileMode::Regular, 1),
            entry("src/deep/mod.rs", FileMode::Regular, 2),
            entry("top.txt", FileMode::Regular, 3),
        ]);

        let root = write_tree_from_index(&repo, &index).unwrap();
        let tree = store::read_tree(&repo, &root).unwrap();
        assert_eq!(tree.len(), 2);

        let src = store::read_tree(&repo, &tree.get("src").unwrap().id).unwrap();
        assert!(src.get("lib.rs").is_some());
        assert_eq!(src.get("deep").unwrap().mode, FileMode::Directory);

        let deep = store::read_tree(&repo, &src.get("deep").unwrap().id).unwrap();
        assert!(deep.get("mod.rs").is_some());
    }

    #[test]
    fn test_deep_path_synthesizes_ancestors() {
        let (_dir, repo) = test_repo();
        let index = index_of(vec![entry("a/b/c/d.txt", FileMode::Regular, 1)]);

        let root = write_tree_from_index(&repo, &index).unwrap();
        let mut tree = store::read_tree(&repo, &root).unwrap();
        for name in ["a", "b", "c"] {
            let sub = tree.get(name).unwrap();
            assert_eq!(sub.mode, FileMode::Directory);
            tree = store::read_tree(&repo, &sub.id).unwrap();
        }
        assert!(tree.get("d.txt").is_some());
    }

    #[test]
    fn test_modes_carried_through() {
        let (_dir, repo) = test_repo();
        let index = index_of(vec![
            entry("run.sh", FileMode::Executable, 1),
            entry("link", FileMode::Symlink, 2),
            entry("vendor", FileMode::Gitlink, 3),
        ]);

        let root = write_tree_from_index(&repo, &index).unwrap();
        let tree = store::read_tree(&repo, &root).unwrap();
        assert_eq!(tree.get("run.sh").unwrap().mode, FileMode::Executable);
        assert_eq!(tree.get("link").unwrap().mode, FileMode::Symlink);
        assert_eq!(tree.get("vendor").unwrap().mode, FileMode::Gitlink);
    }

    #[test]
    fn test_deterministic_root_id() {
        let (_dir, repo) = test_repo();
        let entries = vec![
            entry("z.txt", FileMode::Regular, 1),
            entry("dir/a.txt", FileMode::Regular, 2),
        ];

        let a = write_tree_from_index(&repo, &index_of(entries.clone())).unwrap();
        let b = write_tree_from_index(&repo, &index_of(entries)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_pinned_single_file_tree_id() {
        // tree { 100644 a.txt -> blob("A\n") } pinned against stock git
        let (_dir, repo) = test_repo();
        let blob = store::write_blob(&repo, b"A\n").unwrap();
        assert_eq!(blob.to_hex(), "f70f10e4db19068f79bc43844b49f3eece45c4e8");

        let mut e = entry("a.txt", FileMode::Regular, 0);
        e.id = blob;
        let root = write_tree_from_index(&repo, &index_of(vec![e])).unwrap();
        assert_eq!(root.to_hex(), "11ab7d5124894d58b4852a45c0242e92aea630c9");
    }
}
