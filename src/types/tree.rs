use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::hash::ObjectId;
use crate::types::ObjectKind;

/// file mode of a tree or index entry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileMode {
    /// directory, referencing a tree
    Directory,
    /// regular file, referencing a blob
    Regular,
    /// executable file, referencing a blob
    Executable,
    /// symlink, referencing a blob holding the target path
    Symlink,
    /// nested repository (gitlink), referencing a commit
    Gitlink,
}

impl FileMode {
    /// wire form inside tree objects (no leading zero for directories)
    pub fn as_wire(&self) -> &'static str {
        match self {
            FileMode::Directory => "40000",
            FileMode::Regular => "100644",
            FileMode::Executable => "100755",
            FileMode::Symlink => "120000",
            FileMode::Gitlink => "160000",
        }
    }

    /// zero-padded six-digit form used in listings
    pub fn as_display(&self) -> &'static str {
        match self {
            FileMode::Directory => "040000",
            FileMode::Regular => "100644",
            FileMode::Executable => "100755",
            FileMode::Symlink => "120000",
            FileMode::Gitlink => "160000",
        }
    }

    pub fn from_wire(s: &str) -> Result<Self> {
        match s {
            "40000" | "040000" => Ok(FileMode::Directory),
            "100644" => Ok(FileMode::Regular),
            "100755" => Ok(FileMode::Executable),
            "120000" => Ok(FileMode::Symlink),
            "160000" => Ok(FileMode::Gitlink),
            other => Err(Error::MalformedObject(format!("bad entry mode: {}", other))),
        }
    }

    /// 32-bit encoding used by the index file
    pub fn as_u32(&self) -> u32 {
        match self {
            FileMode::Directory => 0o040000,
            FileMode::Regular => 0o100644,
            FileMode::Executable => 0o100755,
            FileMode::Symlink => 0o120000,
            FileMode::Gitlink => 0o160000,
        }
    }

    pub fn from_u32(raw: u32) -> Result<Self> {
        match raw {
            0o040000 => Ok(FileMode::Directory),
            0o100644 => Ok(FileMode::Regular),
            0o100755 => Ok(FileMode::Executable),
            0o120000 => Ok(FileMode::Symlink),
            0o160000 => Ok(FileMode::Gitlink),
            other => Err(Error::CorruptIndex(format!("bad entry mode: {:o}", other))),
        }
    }

    /// derive the mode for a working tree entry from its metadata
    #[cfg(unix)]
    pub fn detect(meta: &std::fs::Metadata) -> Self {
        use std::os::unix::fs::PermissionsExt;
        if meta.is_dir() {
            FileMode::Directory
        } else if meta.file_type().is_symlink() {
            FileMode::Symlink
        } else if meta.permissions().mode() & 0o111 != 0 {
            FileMode::Executable
        } else {
            FileMode::Regular
        }
    }

    /// kind of object this mode references
    pub fn object_kind(&self) -> ObjectKind {
        match self {
            FileMode::Directory => ObjectKind::Tree,
            FileMode::Gitlink => ObjectKind::Commit,
            _ => ObjectKind::Blob,
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, FileMode::Directory)
    }
}

/// a single entry in a tree
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: FileMode,
    pub name: String,
    pub id: ObjectId,
}

impl TreeEntry {
    pub fn new(mode: FileMode, name: impl Into<String>, id: ObjectId) -> Self {
        Self {
            mode,
            name: name.into(),
            id,
        }
    }
}

/// a directory snapshot - entries sorted in git order
///
/// the ordering invariant is load-bearing for hash stability: entries
/// compare byte-wise over the name, with directories compared as if the
/// name carried a trailing `/`.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    /// create a new tree, validating names and sorting entries
    pub fn new(mut entries: Vec<TreeEntry>) -> Result<Self> {
        for entry in &entries {
            validate_entry_name(&entry.name)?;
        }

        entries.sort_by(entry_order);

        for window in entries.windows(2) {
            if window[0].name == window[1].name {
                return Err(Error::DuplicateEntryName(window[0].name.clone()));
            }
        }

        Ok(Self { entries })
    }

    /// create an empty tree
    pub fn empty() -> Self {
        Self { entries: vec![] }
    }

    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    /// look up entry by name
    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// serialize to the git wire form:
    /// `ASCII(mode) SP name NUL raw_sha20` per entry, no delimiters
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for entry in &self.entries {
            out.extend_from_slice(entry.mode.as_wire().as_bytes());
            out.push(b' ');
            out.extend_from_slice(entry.name.as_bytes());
            out.push(0);
            out.extend_from_slice(entry.id.as_bytes());
        }
        out
    }

    /// parse the wire form back into a tree
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut entries = Vec::new();
        let mut rest = bytes;

        while !rest.is_empty() {
            let sp = rest
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| Error::MalformedObject("tree entry missing mode".to_string()))?;
            let mode_str = std::str::from_utf8(&rest[..sp])
                .map_err(|_| Error::MalformedObject("tree entry mode is not ASCII".to_string()))?;
            let mode = FileMode::from_wire(mode_str)?;
            rest = &rest[sp + 1..];

            let nul = rest
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| Error::MalformedObject("tree entry missing name".to_string()))?;
            let name = std::str::from_utf8(&rest[..nul])
                .map_err(|_| Error::MalformedObject("tree entry name is not UTF-8".to_string()))?
                .to_string();
            rest = &rest[nul + 1..];

            if rest.len() < 20 {
                return Err(Error::MalformedObject(
                    "tree entry truncated before object id".to_string(),
                ));
            }
            let mut raw = [0u8; 20];
            raw.copy_from_slice(&rest[..20]);
            rest = &rest[20..];

            entries.push(TreeEntry::new(mode, name, ObjectId::from_bytes(raw)));
        }

        Tree::new(entries)
    }
}

/// git's tree entry ordering: byte-wise over the name, with directories
/// compared as if suffixed by `/`
fn entry_order(a: &TreeEntry, b: &TreeEntry) -> Ordering {
    let ab = a.name.as_bytes();
    let bb = b.name.as_bytes();
    let min_len = ab.len().min(bb.len());
    match ab[..min_len].cmp(&bb[..min_len]) {
        Ordering::Equal => {}
        other => return other,
    }
    let ax = ab
        .get(min_len)
        .copied()
        .or_else(|| a.mode.is_tree().then_some(b'/'));
    let bx = bb
        .get(min_len)
        .copied()
        .or_else(|| b.mode.is_tree().then_some(b'/'));
    ax.cmp(&bx)
}

/// validate a single path component
fn validate_entry_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidEntryName("empty name".to_string()));
    }
    if name.contains('/') {
        return Err(Error::InvalidEntryName(format!(
            "name contains '/': {}",
            name
        )));
    }
    if name.contains('\0') {
        return Err(Error::InvalidEntryName(format!(
            "name contains null byte: {}",
            name
        )));
    }
    if name == "." || name == ".." {
        return Err(Error::InvalidEntryName(format!("reserved name: {}", name)));
    }
    Ok(())
}
