use std::fs;
use std::path::Path;

use crate::hash::compute_object_id;
use crate::repo::Repository;
use crate::types::{FileMode, ObjectKind};

use super::entry::IndexEntry;

/// classification of an index entry against the working tree
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryDiff {
    Unchanged,
    SizeChanged,
    ModeChanged,
    TimeChanged,
    ContentChanged,
    FileMissing,
    MultipleChanges,
}

/// comparator policy knobs
#[derive(Clone, Copy, Debug, Default)]
pub struct CompareOptions {
    /// report a changed mtime as `TimeChanged` instead of re-hashing
    /// the contents to find out whether the timestamp is stale
    pub quick_check: bool,
}

/// classify one entry against the file on disk
///
/// the ladder is: existence, then size and mode from stat, then the
/// mtime fast path, and only then a content hash. an unreadable file
/// classifies as missing rather than failing the whole status pass.
pub fn compare_entry(repo: &Repository, entry: &IndexEntry, opts: &CompareOptions) -> EntryDiff {
    let path = repo.root().join(&entry.path);

    let meta = match fs::symlink_metadata(&path) {
        Ok(meta) => meta,
        Err(_) => return EntryDiff::FileMissing,
    };

    // a gitlink only records that the nested repository is present
    if entry.mode == FileMode::Gitlink {
        return if meta.is_dir() {
            EntryDiff::Unchanged
        } else {
            EntryDiff::FileMissing
        };
    }

    let size_changed = meta.len() as u32 != entry.file_size;
    let mode_changed = FileMode::detect(&meta) != entry.mode;

    match (size_changed, mode_changed) {
        (true, true) => EntryDiff::MultipleChanges,
        (true, false) => EntryDiff::SizeChanged,
        (false, true) => EntryDiff::ModeChanged,
        (false, false) => {
            if mtime_sec(&meta) == entry.mtime_sec {
                return EntryDiff::Unchanged;
            }
            if opts.quick_check {
                return EntryDiff::TimeChanged;
            }
            // the timestamp moved; the contents decide
            let content = match read_entry_content(&path, entry.mode) {
                Ok(content) => content,
                Err(_) => return EntryDiff::FileMissing,
            };
            if compute_object_id(ObjectKind::Blob, &content) == entry.id {
                EntryDiff::Unchanged
            } else {
                EntryDiff::ContentChanged
            }
        }
    }
}

#[cfg(unix)]
fn mtime_sec(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::MetadataExt;
    meta.mtime() as u32
}

/// what would be hashed if the path were staged now
fn read_entry_content(path: &Path, mode: FileMode) -> std::io::Result<Vec<u8>> {
    if mode == FileMode::Symlink {
        #[cfg(unix)]
        {
            use std::os::unix::ffi::OsStrExt;
            return Ok(fs::read_link(path)?.as_os_str().as_bytes().to_vec());
        }
    }
    fs::read(path)
}
