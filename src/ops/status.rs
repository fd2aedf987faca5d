use walkdir::WalkDir;

use crate::error::Result;
use crate::index::{compare_entry, CompareOptions, EntryDiff, Index};
use crate::refs::{self, Head};
use crate::repo::Repository;

use super::add::IgnoreRules;
use super::walk::head_files;

/// how a staged path differs from HEAD
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StagedChange {
    Added,
    Modified,
    Deleted,
}

/// the three-way composition of HEAD, index and working tree
#[derive(Clone, Debug)]
pub struct StatusReport {
    pub head: Head,
    /// index vs HEAD tree
    pub staged: Vec<(String, StagedChange)>,
    /// working tree vs index, classified by the comparator
    pub unstaged: Vec<(String, EntryDiff)>,
    /// working tree files neither staged nor ignored
    pub untracked: Vec<String>,
}

impl StatusReport {
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty() && self.unstaged.is_empty() && self.untracked.is_empty()
    }
}

/// compute repository status
pub fn status(
    repo: &Repository,
    index: &Index,
    ignore: &dyn IgnoreRules,
    opts: &CompareOptions,
) -> Result<StatusReport> {
    let head = refs::read_head(repo)?;
    let head_map = head_files(repo)?;

    let mut staged = Vec::new();
    for entry in index.entries() {
        match head_map.get(&entry.path) {
            None => staged.push((entry.path.clone(), StagedChange::Added)),
            Some(id) if *id != entry.id => {
                staged.push((entry.path.clone(), StagedChange::Modified));
            }
            Some(_) => {}
        }
    }
    for path in head_map.keys() {
        if index.get(path).is_none() {
            staged.push((path.clone(), StagedChange::Deleted));
        }
    }
    staged.sort_by(|a, b| a.0.cmp(&b.0));

    let mut unstaged = Vec::new();
    for entry in index.entries() {
        let diff = compare_entry(repo, entry, opts);
        if diff != EntryDiff::Unchanged {
            unstaged.push((entry.path.clone(), diff));
        }
    }

    let untracked = untracked_files(repo, index, ignore);

    Ok(StatusReport {
        head,
        staged,
        unstaged,
        untracked,
    })
}

/// working tree files absent from the index, minus ignored paths
///
/// unreadable directories are skipped rather than failing status.
fn untracked_files(repo: &Repository, index: &Index, ignore: &dyn IgnoreRules) -> Vec<String> {
    let dir_name = Repository::dir_name();
    let mut untracked = Vec::new();

    let mut walker = WalkDir::new(repo.root())
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        .into_iter();

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(_) => continue,
        };

        let rel = match entry.path().strip_prefix(repo.root()) {
            Ok(stripped) => stripped.to_string_lossy().replace('\\', "/"),
            Err(_) => continue,
        };

        if entry.file_type().is_dir() {
            if entry.file_name() == dir_name.as_os_str() {
                walker.skip_current_dir();
                continue;
            }
            if !rel.is_empty() && entry.path().join(&dir_name).is_dir() {
                // nested repository: one untracked entry unless staged
                walker.skip_current_dir();
                if index.get(&rel).is_none() && !ignore.is_ignored(&rel, true) {
                    untracked.push(rel);
                }
                continue;
            }
            if !rel.is_empty() && ignore.is_ignored(&rel, true) {
                walker.skip_current_dir();
            }
            continue;
        }

        if ignore.is_ignored(&rel, false) {
            continue;
        }
        if index.get(&rel).is_none() {
            untracked.push(rel);
        }
    }

    untracked.sort();
    untracked
}
