//! the staging area: entry container, binary file format, comparator

mod compare;
mod entry;
mod file;

pub use compare::{compare_entry, CompareOptions, EntryDiff};
pub use entry::IndexEntry;

use std::io;

use crate::error::{Error, Result};
use crate::lockfile::LockFile;
use crate::repo::Repository;

/// the in-memory index: entries kept sorted ascending by byte-wise
/// path compare, unique per path at stage 0
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Index {
    entries: Vec<IndexEntry>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, path: &str) -> std::result::Result<usize, usize> {
        self.entries
            .binary_search_by(|e| e.path.as_bytes().cmp(path.as_bytes()))
    }

    /// look up an entry by repository-relative path
    pub fn get(&self, path: &str) -> Option<&IndexEntry> {
        self.position(path).ok().map(|i| &self.entries[i])
    }

    /// insert or replace an entry; returns true when an entry for the
    /// path already existed
    pub fn upsert(&mut self, entry: IndexEntry) -> bool {
        match self.position(&entry.path) {
            Ok(i) => {
                self.entries[i] = entry;
                true
            }
            Err(i) => {
                self.entries.insert(i, entry);
                false
            }
        }
    }

    /// unstage a path
    pub fn remove(&mut self, path: &str) -> Option<IndexEntry> {
        self.position(path).ok().map(|i| self.entries.remove(i))
    }

    /// load the index from `<gitdir>/index`; absent file is an empty
    /// index, a failed trailer check is `CorruptIndex`
    pub fn load(repo: &Repository) -> Result<Self> {
        let path = repo.index_path();
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(source) => return Err(Error::Io { path, source }),
        };

        Ok(Self {
            entries: file::parse(&bytes)?,
        })
    }

    /// write the index through its lock file
    pub fn save(&self, repo: &Repository) -> Result<()> {
        let mut lock = LockFile::acquire(&repo.index_path())?;
        lock.write_all(&file::emit(&self.entries))?;
        lock.commit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::ObjectId;
    use crate::types::FileMode;
    use tempfile::tempdir;

    fn entry(path: &str, id_byte: u8) -> IndexEntry {
        IndexEntry {
            ctime_sec: 1,
            ctime_nsec: 2,
            mtime_sec: 3,
            mtime_nsec: 4,
            dev: 5,
            ino: 6,
            mode: FileMode::Regular,
            uid: 7,
            gid: 8,
            file_size: 9,
            id: ObjectId::from_bytes([id_byte; 20]),
            assume_valid: false,
            stage: 0,
            path: path.to_string(),
        }
    }

    #[test]
    fn test_upsert_keeps_byte_order() {
        let mut index = Index::new();
        index.upsert(entry("b.txt", 1));
        index.upsert(entry("a.txt", 2));
        index.upsert(entry("a/z.txt", 3));

        let paths: Vec<&str> = index.entries().iter().map(|e| e.path.as_str()).collect();
        // '.' (0x2E) sorts before '/' (0x2F)
        assert_eq!(paths, ["a.txt", "a/z.txt", "b.txt"]);
    }

    #[test]
    fn test_upsert_replaces() {
        let mut index = Index::new();
        assert!(!index.upsert(entry("a", 1)));
        assert!(index.upsert(entry("a", 2)));
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("a").unwrap().id, ObjectId::from_bytes([2; 20]));
    }

    #[test]
    fn test_remove() {
        let mut index = Index::new();
        index.upsert(entry("a", 1));
        assert!(index.remove("a").is_some());
        assert!(index.remove("a").is_none());
        assert!(index.is_empty());
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let index = Index::load(&repo).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        let mut index = Index::new();
        index.upsert(entry("README.md", 1));
        index.upsert(entry("src/lib.rs", 2));
        index.save(&repo).unwrap();

        assert!(dir.path().join(".source/index").is_file());
        assert!(!dir.path().join(".source/index.lock").exists());

        let loaded = Index::load(&repo).unwrap();
        assert_eq!(loaded, index);
    }

    #[test]
    fn test_save_blocked_by_held_lock() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        std::fs::write(dir.path().join(".source/index.lock"), b"").unwrap();

        let index = Index::new();
        assert!(matches!(index.save(&repo), Err(Error::LockHeld(_))));
    }

    #[test]
    fn test_load_rejects_tampered_file() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        let mut index = Index::new();
        index.upsert(entry("a", 1));
        index.save(&repo).unwrap();

        let path = dir.path().join(".source/index");
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[20] ^= 0xFF;
        std::fs::write(&path, bytes).unwrap();

        assert!(matches!(Index::load(&repo), Err(Error::CorruptIndex(_))));
    }
}
