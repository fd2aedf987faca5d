use std::fs;
use std::io;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::hash::ObjectId;
use crate::lockfile::LockFile;
use crate::repo::Repository;
use crate::store;

/// symbolic refs may chain; beyond this depth we assume a cycle
const MAX_SYMREF_DEPTH: u32 = 5;

/// the resolved state of `HEAD`
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Head {
    /// HEAD points at a branch ref that resolves to a commit
    Symbolic { target: String, id: ObjectId },
    /// HEAD holds a raw commit id
    Detached(ObjectId),
    /// HEAD points at a branch ref that does not exist yet
    Unborn { target: String },
}

impl Head {
    /// the commit HEAD resolves to, if any
    pub fn id(&self) -> Option<ObjectId> {
        match self {
            Head::Symbolic { id, .. } => Some(*id),
            Head::Detached(id) => Some(*id),
            Head::Unborn { .. } => None,
        }
    }

    /// branch name without the `refs/heads/` prefix
    pub fn branch_name(&self) -> Option<&str> {
        match self {
            Head::Symbolic { target, .. } | Head::Unborn { target } => {
                Some(target.strip_prefix("refs/heads/").unwrap_or(target))
            }
            Head::Detached(_) => None,
        }
    }

    pub fn is_detached(&self) -> bool {
        matches!(self, Head::Detached(_))
    }
}

fn ref_path(repo: &Repository, name: &str) -> PathBuf {
    repo.git_dir().join(name)
}

/// read a ref, chasing `ref: ` indirections
pub fn read_ref(repo: &Repository, name: &str) -> Result<ObjectId> {
    read_ref_at_depth(repo, name, 0)
}

fn read_ref_at_depth(repo: &Repository, name: &str, depth: u32) -> Result<ObjectId> {
    if depth > MAX_SYMREF_DEPTH {
        return Err(Error::RefCycle(name.to_string()));
    }

    let path = ref_path(repo, name);
    let content = fs::read_to_string(&path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            Error::RefNotFound(name.to_string())
        } else {
            Error::Io { path, source: e }
        }
    })?;

    let content = content.trim();
    if let Some(target) = content.strip_prefix("ref: ") {
        read_ref_at_depth(repo, target.trim(), depth + 1)
    } else {
        ObjectId::from_hex(content)
    }
}

/// check whether a ref file exists
pub fn ref_exists(repo: &Repository, name: &str) -> bool {
    ref_path(repo, name).is_file()
}

/// create or update a ref, atomically via its lock file
pub fn write_ref(repo: &Repository, name: &str, id: &ObjectId) -> Result<()> {
    validate_ref_name(name)?;

    let mut lock = LockFile::acquire(&ref_path(repo, name))?;
    lock.write_all(format!("{}\n", id).as_bytes())?;
    lock.commit()
}

/// read HEAD, distinguishing symbolic, detached and unborn states
pub fn read_head(repo: &Repository) -> Result<Head> {
    let path = repo.head_path();
    let content = fs::read_to_string(&path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            Error::RefNotFound("HEAD".to_string())
        } else {
            Error::Io { path, source: e }
        }
    })?;

    let content = content.trim();
    if let Some(target) = content.strip_prefix("ref: ") {
        let target = target.trim().to_string();
        match read_ref(repo, &target) {
            Ok(id) => Ok(Head::Symbolic { target, id }),
            Err(Error::RefNotFound(_)) => Ok(Head::Unborn { target }),
            Err(e) => Err(e),
        }
    } else {
        Ok(Head::Detached(ObjectId::from_hex(content)?))
    }
}

/// advance HEAD to a new commit, returning the previous value
///
/// a symbolic HEAD advances its branch ref; a detached HEAD is
/// rewritten in place. either write goes through a lock file.
pub fn update_head(repo: &Repository, id: &ObjectId) -> Result<Option<ObjectId>> {
    match read_head(repo)? {
        Head::Symbolic { target, id: old } => {
            write_ref(repo, &target, id)?;
            Ok(Some(old))
        }
        Head::Unborn { target } => {
            write_ref(repo, &target, id)?;
            Ok(None)
        }
        Head::Detached(old) => {
            let mut lock = LockFile::acquire(&repo.head_path())?;
            lock.write_all(format!("{}\n", id).as_bytes())?;
            lock.commit()?;
            Ok(Some(old))
        }
    }
}

/// resolve a revision spec to an object id
///
/// trials in order: `HEAD`, exact 40-hex id, local branch, tag, then
/// abbreviated id through the object store.
pub fn resolve_revision(repo: &Repository, revish: &str) -> Result<ObjectId> {
    if revish == "HEAD" {
        return read_head(repo)?
            .id()
            .ok_or_else(|| Error::RefNotFound("HEAD".to_string()));
    }

    if revish.len() == 40 && revish.bytes().all(|b| b.is_ascii_hexdigit()) {
        return ObjectId::from_hex(revish);
    }

    let branch = format!("refs/heads/{}", revish);
    if ref_exists(repo, &branch) {
        return read_ref(repo, &branch);
    }

    let tag = format!("refs/tags/{}", revish);
    if ref_exists(repo, &tag) {
        return read_ref(repo, &tag);
    }

    store::resolve_short_id(repo, revish)
}

/// validate a ref name
fn validate_ref_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidRef("empty ref name".to_string()));
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Err(Error::InvalidRef(format!(
            "ref name cannot start or end with '/': {}",
            name
        )));
    }
    if name.contains("//") {
        return Err(Error::InvalidRef(format!(
            "ref name cannot contain '//': {}",
            name
        )));
    }
    if name.contains('\0') {
        return Err(Error::InvalidRef(format!(
            "ref name cannot contain null byte: {}",
            name
        )));
    }
    for component in name.split('/') {
        if component == "." || component == ".." {
            return Err(Error::InvalidRef(format!(
                "ref name cannot contain '.' or '..': {}",
                name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    fn id(n: u8) -> ObjectId {
        ObjectId::from_bytes([n; 20])
    }

    #[test]
    fn test_write_and_read_ref() {
        let (_dir, repo) = test_repo();

        write_ref(&repo, "refs/heads/main", &id(1)).unwrap();
        assert_eq!(read_ref(&repo, "refs/heads/main").unwrap(), id(1));
    }

    #[test]
    fn test_ref_file_format() {
        let (dir, repo) = test_repo();

        write_ref(&repo, "refs/heads/main", &id(1)).unwrap();
        let content = fs::read_to_string(dir.path().join(".source/refs/heads/main")).unwrap();
        assert_eq!(content, format!("{}\n", id(1)));
    }

    #[test]
    fn test_read_nonexistent_ref() {
        let (_dir, repo) = test_repo();
        assert!(matches!(
            read_ref(&repo, "refs/heads/nothing"),
            Err(Error::RefNotFound(_))
        ));
    }

    #[test]
    fn test_overwrite_ref() {
        let (_dir, repo) = test_repo();

        write_ref(&repo, "refs/heads/main", &id(1)).unwrap();
        write_ref(&repo, "refs/heads/main", &id(2)).unwrap();
        assert_eq!(read_ref(&repo, "refs/heads/main").unwrap(), id(2));
    }

    #[test]
    fn test_symref_chase() {
        let (dir, repo) = test_repo();

        write_ref(&repo, "refs/heads/main", &id(3)).unwrap();
        fs::write(
            dir.path().join(".source/refs/heads/alias"),
            "ref: refs/heads/main\n",
        )
        .unwrap();

        assert_eq!(read_ref(&repo, "refs/heads/alias").unwrap(), id(3));
    }

    #[test]
    fn test_symref_cycle_detected() {
        let (dir, repo) = test_repo();

        fs::write(
            dir.path().join(".source/refs/heads/a"),
            "ref: refs/heads/b\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(".source/refs/heads/b"),
            "ref: refs/heads/a\n",
        )
        .unwrap();

        assert!(matches!(
            read_ref(&repo, "refs/heads/a"),
            Err(Error::RefCycle(_))
        ));
    }

    #[test]
    fn test_head_unborn_after_init() {
        let (_dir, repo) = test_repo();

        let head = read_head(&repo).unwrap();
        assert_eq!(
            head,
            Head::Unborn {
                target: "refs/heads/main".to_string()
            }
        );
        assert_eq!(head.branch_name(), Some("main"));
        assert_eq!(head.id(), None);
    }

    #[test]
    fn test_head_symbolic_after_branch_write() {
        let (_dir, repo) = test_repo();

        write_ref(&repo, "refs/heads/main", &id(7)).unwrap();
        let head = read_head(&repo).unwrap();
        assert_eq!(head.id(), Some(id(7)));
        assert!(!head.is_detached());
    }

    #[test]
    fn test_head_detached() {
        let (dir, repo) = test_repo();

        fs::write(
            dir.path().join(".source/HEAD"),
            format!("{}\n", id(9)),
        )
        .unwrap();

        let head = read_head(&repo).unwrap();
        assert!(head.is_detached());
        assert_eq!(head.id(), Some(id(9)));
        assert_eq!(head.branch_name(), None);
    }

    #[test]
    fn test_update_head_symbolic() {
        let (_dir, repo) = test_repo();

        // unborn -> first commit
        let previous = update_head(&repo, &id(1)).unwrap();
        assert_eq!(previous, None);
        assert_eq!(read_ref(&repo, "refs/heads/main").unwrap(), id(1));

        // advance
        let previous = update_head(&repo, &id(2)).unwrap();
        assert_eq!(previous, Some(id(1)));
        assert_eq!(read_ref(&repo, "refs/heads/main").unwrap(), id(2));
    }

    #[test]
    fn test_update_head_detached() {
        let (dir, repo) = test_repo();

        fs::write(dir.path().join(".source/HEAD"), format!("{}\n", id(1))).unwrap();

        let previous = update_head(&repo, &id(2)).unwrap();
        assert_eq!(previous, Some(id(1)));
        assert_eq!(read_head(&repo).unwrap(), Head::Detached(id(2)));
    }

    #[test]
    fn test_resolve_revision_trials() {
        let (_dir, repo) = test_repo();

        // exact 40-hex wins without touching the filesystem
        let hex = "bd9dbf5aae1a3862dd1526723246b20206e5fc37";
        assert_eq!(resolve_revision(&repo, hex).unwrap().to_hex(), hex);

        // branch
        write_ref(&repo, "refs/heads/topic", &id(4)).unwrap();
        assert_eq!(resolve_revision(&repo, "topic").unwrap(), id(4));

        // tag
        write_ref(&repo, "refs/tags/v1.0", &id(5)).unwrap();
        assert_eq!(resolve_revision(&repo, "v1.0").unwrap(), id(5));

        // short id through the store
        let blob = store::write_blob(&repo, b"what is up, doc?").unwrap();
        assert_eq!(resolve_revision(&repo, "bd9dbf5a").unwrap(), blob);

        // nothing matches
        assert!(resolve_revision(&repo, "missing").is_err());
    }

    #[test]
    fn test_branch_shadows_short_id() {
        let (_dir, repo) = test_repo();

        store::write_blob(&repo, b"what is up, doc?").unwrap();
        write_ref(&repo, "refs/heads/bd9dbf5a", &id(6)).unwrap();

        // branch name takes priority over the abbreviated object id
        assert_eq!(resolve_revision(&repo, "bd9dbf5a").unwrap(), id(6));
    }

    #[test]
    fn test_invalid_ref_names() {
        assert!(validate_ref_name("").is_err());
        assert!(validate_ref_name("/start").is_err());
        assert!(validate_ref_name("end/").is_err());
        assert!(validate_ref_name("double//slash").is_err());
        assert!(validate_ref_name("with/../dotdot").is_err());
        assert!(validate_ref_name("with\0null").is_err());

        assert!(validate_ref_name("refs/heads/main").is_ok());
        assert!(validate_ref_name("refs/tags/v1.0").is_ok());
    }

    #[test]
    fn test_ref_write_blocked_by_lock() {
        let (dir, repo) = test_repo();

        fs::write(dir.path().join(".source/refs/heads/main.lock"), b"").unwrap();
        assert!(matches!(
            write_ref(&repo, "refs/heads/main", &id(1)),
            Err(Error::LockHeld(_))
        ));
    }
}
