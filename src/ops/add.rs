use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use walkdir::WalkDir;

use crate::error::{Error, IoResultExt, Result};
use crate::hash::compute_object_id;
use crate::index::{Index, IndexEntry};
use crate::refs;
use crate::repo::Repository;
use crate::store;
use crate::types::{FileMode, ObjectKind};

/// decides which paths staging should skip
///
/// the pattern language (`.sourceignore`) lives outside the core;
/// callers supply compiled rules through this seam.
pub trait IgnoreRules {
    fn is_ignored(&self, path: &str, is_dir: bool) -> bool;
}

/// rules that ignore nothing
pub struct NoIgnore;

impl IgnoreRules for NoIgnore {
    fn is_ignored(&self, _path: &str, _is_dir: bool) -> bool {
        false
    }
}

/// rules that hide paths with a dotfile component, the CLI default
pub struct HideDotfiles;

impl IgnoreRules for HideDotfiles {
    fn is_ignored(&self, path: &str, _is_dir: bool) -> bool {
        path.split('/').any(|c| c.starts_with('.'))
    }
}

/// cooperative cancellation signal, checked between files
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Debug, Default)]
pub struct AddOptions {
    /// classify paths without writing blobs or touching the index
    pub dry_run: bool,
    /// stage paths the ignore rules would skip
    pub force: bool,
    pub cancel: Option<CancelFlag>,
}

/// per-path outcome of an add operation
///
/// individual failures are collected here, never raised; only
/// cancellation aborts the whole operation.
#[derive(Clone, Debug, Default)]
pub struct AddResult {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub ignored: Vec<String>,
    /// (path, reason) for every path that could not be staged
    pub failed: Vec<(String, String)>,
}

impl AddResult {
    /// number of entries staged or refreshed
    pub fn staged_count(&self) -> usize {
        self.added.len() + self.modified.len()
    }
}

/// stage paths into the index
///
/// inputs may be absolute or repository-relative; directories are
/// walked recursively with the metadata directory excluded. the index
/// is mutated in memory only; persisting it is the caller's step.
pub fn add(
    repo: &Repository,
    index: &mut Index,
    paths: &[PathBuf],
    ignore: &dyn IgnoreRules,
    opts: &AddOptions,
) -> Result<AddResult> {
    let mut result = AddResult::default();

    for input in paths {
        check_cancelled(opts)?;

        let abs = if input.is_absolute() {
            input.clone()
        } else {
            repo.root().join(input)
        };

        let rel = match normalize_under_root(repo.root(), &abs) {
            Ok(rel) => rel,
            Err(e) => {
                result.failed.push((input.display().to_string(), e.to_string()));
                continue;
            }
        };

        let meta = match fs::symlink_metadata(&abs) {
            Ok(meta) => meta,
            Err(e) => {
                result.failed.push((display_path(&rel, input), e.to_string()));
                continue;
            }
        };

        if meta.is_dir() {
            add_directory(repo, index, &abs, ignore, opts, &mut result)?;
        } else {
            if !opts.force && ignore.is_ignored(&rel, false) {
                result.ignored.push(rel);
                continue;
            }
            stage_file(repo, index, &abs, &rel, opts, &mut result);
        }
    }

    Ok(result)
}

fn add_directory(
    repo: &Repository,
    index: &mut Index,
    dir: &Path,
    ignore: &dyn IgnoreRules,
    opts: &AddOptions,
    result: &mut AddResult,
) -> Result<()> {
    let dir_name = Repository::dir_name();

    let mut walker = WalkDir::new(dir)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        .into_iter();

    while let Some(entry) = walker.next() {
        check_cancelled(opts)?;

        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let shown = e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| dir.display().to_string());
                result.failed.push((shown, e.to_string()));
                continue;
            }
        };

        let path = entry.path();
        let rel = match normalize_under_root(repo.root(), path) {
            Ok(rel) => rel,
            Err(e) => {
                result.failed.push((path.display().to_string(), e.to_string()));
                continue;
            }
        };

        if entry.file_type().is_dir() {
            if entry.file_name() == dir_name.as_os_str() {
                walker.skip_current_dir();
                continue;
            }
            if !rel.is_empty() && path.join(&dir_name).is_dir() {
                // nested repository: record a gitlink, never descend
                walker.skip_current_dir();
                if !opts.force && ignore.is_ignored(&rel, true) {
                    result.ignored.push(rel);
                    continue;
                }
                stage_gitlink(repo, index, path, &rel, opts, result);
                continue;
            }
            if !rel.is_empty() && !opts.force && ignore.is_ignored(&rel, true) {
                walker.skip_current_dir();
                result.ignored.push(rel);
            }
            continue;
        }

        if !opts.force && ignore.is_ignored(&rel, false) {
            result.ignored.push(rel);
            continue;
        }
        stage_file(repo, index, path, &rel, opts, result);
    }

    Ok(())
}

fn stage_file(
    repo: &Repository,
    index: &mut Index,
    abs: &Path,
    rel: &str,
    opts: &AddOptions,
    result: &mut AddResult,
) {
    match try_stage_file(repo, index, abs, rel, opts) {
        Ok(true) => result.modified.push(rel.to_string()),
        Ok(false) => result.added.push(rel.to_string()),
        Err(e) => result.failed.push((rel.to_string(), e.to_string())),
    }
}

fn try_stage_file(
    repo: &Repository,
    index: &mut Index,
    abs: &Path,
    rel: &str,
    opts: &AddOptions,
) -> Result<bool> {
    let meta = fs::symlink_metadata(abs).with_path(abs)?;
    let mode = FileMode::detect(&meta);

    // symlinks stage the link target text, not the pointed-to file
    let content = if mode == FileMode::Symlink {
        link_target_bytes(abs)?
    } else {
        fs::read(abs).with_path(abs)?
    };

    let id = if opts.dry_run {
        compute_object_id(ObjectKind::Blob, &content)
    } else {
        store::write_blob(repo, &content)?
    };

    let existed = index.get(rel).is_some();
    if !opts.dry_run {
        index.upsert(IndexEntry::from_metadata(rel, mode, id, &meta));
    }
    Ok(existed)
}

fn stage_gitlink(
    repo: &Repository,
    index: &mut Index,
    abs: &Path,
    rel: &str,
    opts: &AddOptions,
    result: &mut AddResult,
) {
    match try_stage_gitlink(repo, index, abs, rel, opts) {
        Ok(true) => result.modified.push(rel.to_string()),
        Ok(false) => result.added.push(rel.to_string()),
        Err(e) => result.failed.push((rel.to_string(), e.to_string())),
    }
}

fn try_stage_gitlink(
    repo: &Repository,
    index: &mut Index,
    abs: &Path,
    rel: &str,
    opts: &AddOptions,
) -> Result<bool> {
    let sub = Repository::open(abs)?;
    let id = refs::read_head(&sub)?
        .id()
        .ok_or_else(|| Error::RefNotFound(format!("{}: HEAD has no commits", rel)))?;

    let existed = index.get(rel).is_some();
    if !opts.dry_run {
        let meta = fs::symlink_metadata(abs).with_path(abs)?;
        let mut entry = IndexEntry::from_metadata(rel, FileMode::Gitlink, id, &meta);
        entry.file_size = 0;
        index.upsert(entry);
    }
    Ok(existed)
}

#[cfg(unix)]
fn link_target_bytes(path: &Path) -> Result<Vec<u8>> {
    use std::os::unix::ffi::OsStrExt;
    let target = fs::read_link(path).with_path(path)?;
    Ok(target.as_os_str().as_bytes().to_vec())
}

fn check_cancelled(opts: &AddOptions) -> Result<()> {
    match &opts.cancel {
        Some(flag) if flag.is_cancelled() => Err(Error::Cancelled),
        _ => Ok(()),
    }
}

fn display_path(rel: &str, input: &Path) -> String {
    if rel.is_empty() {
        input.display().to_string()
    } else {
        rel.to_string()
    }
}

/// reduce a path to its repository-relative, `/`-separated form,
/// rejecting anything that escapes the root
fn normalize_under_root(root: &Path, abs: &Path) -> Result<String> {
    let stripped = abs
        .strip_prefix(root)
        .map_err(|_| Error::PathOutsideRepo(abs.to_path_buf()))?;

    let mut parts: Vec<&str> = Vec::new();
    for component in stripped.components() {
        match component {
            Component::Normal(part) => {
                let part = part
                    .to_str()
                    .ok_or_else(|| Error::PathOutsideRepo(abs.to_path_buf()))?;
                parts.push(part);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(Error::PathOutsideRepo(abs.to_path_buf()));
                }
            }
            _ => return Err(Error::PathOutsideRepo(abs.to_path_buf())),
        }
    }
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    fn add_all(repo: &Repository, index: &mut Index, paths: &[&str]) -> AddResult {
        let paths: Vec<PathBuf> = paths.iter().map(|p| PathBuf::from(*p)).collect();
        add(repo, index, &paths, &NoIgnore, &AddOptions::default()).unwrap()
    }

    #[test]
    fn test_add_single_file() {
        let (_dir, repo) = test_repo();
        fs::write(repo.root().join("a.txt"), b"A\n").unwrap();

        let mut index = Index::new();
        let result = add_all(&repo, &mut index, &["a.txt"]);

        assert_eq!(result.added, ["a.txt"]);
        assert!(result.modified.is_empty());
        assert!(result.failed.is_empty());

        let entry = index.get("a.txt").unwrap();
        assert_eq!(entry.mode, FileMode::Regular);
        assert_eq!(entry.file_size, 2);
        assert!(store::has_object(&repo, &entry.id));
    }

    #[test]
    fn test_readd_reports_modified() {
        let (_dir, repo) = test_repo();
        fs::write(repo.root().join("a.txt"), b"v1").unwrap();

        let mut index = Index::new();
        add_all(&repo, &mut index, &["a.txt"]);

        fs::write(repo.root().join("a.txt"), b"v2").unwrap();
        let result = add_all(&repo, &mut index, &["a.txt"]);

        assert_eq!(result.modified, ["a.txt"]);
        assert!(result.added.is_empty());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_add_directory_recursively() {
        let (_dir, repo) = test_repo();
        fs::create_dir_all(repo.root().join("src/deep")).unwrap();
        fs::write(repo.root().join("src/lib.rs"), b"pub fn x() {}\n").unwrap();
        fs::write(repo.root().join("src/deep/mod.rs"), b"// deep\n").unwrap();
        fs::write(repo.root().join("top.txt"), b"top\n").unwrap();

        let mut index = Index::new();
        let result = add_all(&repo, &mut index, &["."]);

        assert_eq!(result.added.len(), 3);
        assert!(index.get("src/lib.rs").is_some());
        assert!(index.get("src/deep/mod.rs").is_some());
        assert!(index.get("top.txt").is_some());
        // the metadata directory is never staged
        assert!(index.entries().iter().all(|e| !e.path.starts_with(".source")));
    }

    #[test]
    fn test_add_rejects_path_outside_root() {
        let (_dir, repo) = test_repo();

        let mut index = Index::new();
        let result = add_all(&repo, &mut index, &["../elsewhere.txt"]);

        assert_eq!(result.failed.len(), 1);
        assert!(result.failed[0].1.contains("outside"));
        assert!(index.is_empty());
    }

    #[test]
    fn test_add_missing_file_collected_as_failed() {
        let (_dir, repo) = test_repo();

        let mut index = Index::new();
        let result = add_all(&repo, &mut index, &["ghost.txt"]);

        assert!(result.added.is_empty());
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].0, "ghost.txt");
    }

    #[test]
    fn test_ignored_paths_reported() {
        let (_dir, repo) = test_repo();
        fs::write(repo.root().join("kept.txt"), b"k").unwrap();
        fs::write(repo.root().join("skipped.log"), b"s").unwrap();

        struct LogIgnore;
        impl IgnoreRules for LogIgnore {
            fn is_ignored(&self, path: &str, _is_dir: bool) -> bool {
                path.ends_with(".log")
            }
        }

        let mut index = Index::new();
        let result = add(
            &repo,
            &mut index,
            &[PathBuf::from(".")],
            &LogIgnore,
            &AddOptions::default(),
        )
        .unwrap();

        assert_eq!(result.added, ["kept.txt"]);
        assert_eq!(result.ignored, ["skipped.log"]);
        assert!(index.get("skipped.log").is_none());
    }

    #[test]
    fn test_force_stages_ignored_paths() {
        let (_dir, repo) = test_repo();
        fs::write(repo.root().join(".hidden"), b"h").unwrap();

        let mut index = Index::new();
        let opts = AddOptions {
            force: true,
            ..Default::default()
        };
        let result = add(&repo, &mut index, &[PathBuf::from(".")], &HideDotfiles, &opts).unwrap();

        assert_eq!(result.added, [".hidden"]);
        assert!(result.ignored.is_empty());
    }

    #[test]
    fn test_dotfiles_hidden_by_default_rules() {
        let (_dir, repo) = test_repo();
        fs::write(repo.root().join(".hidden"), b"h").unwrap();
        fs::write(repo.root().join("seen.txt"), b"s").unwrap();

        let mut index = Index::new();
        let result = add(
            &repo,
            &mut index,
            &[PathBuf::from(".")],
            &HideDotfiles,
            &AddOptions::default(),
        )
        .unwrap();

        assert_eq!(result.added, ["seen.txt"]);
        assert_eq!(result.ignored, [".hidden"]);
    }

    #[test]
    fn test_symlink_stages_target_text() {
        let (_dir, repo) = test_repo();
        symlink("target/elsewhere", repo.root().join("link")).unwrap();

        let mut index = Index::new();
        let result = add_all(&repo, &mut index, &["link"]);

        assert_eq!(result.added, ["link"]);
        let entry = index.get("link").unwrap();
        assert_eq!(entry.mode, FileMode::Symlink);
        assert_eq!(
            store::read_blob(&repo, &entry.id).unwrap(),
            b"target/elsewhere"
        );
    }

    #[test]
    fn test_executable_mode_detected() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, repo) = test_repo();
        let path = repo.root().join("run.sh");
        fs::write(&path, b"#!/bin/sh\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();

        let mut index = Index::new();
        add_all(&repo, &mut index, &["run.sh"]);

        assert_eq!(index.get("run.sh").unwrap().mode, FileMode::Executable);
    }

    #[test]
    fn test_nested_repo_staged_as_gitlink() {
        let (_dir, repo) = test_repo();

        // a nested repository with one commit
        let sub_root = repo.root().join("vendor/lib");
        fs::create_dir_all(&sub_root).unwrap();
        let sub = Repository::init(&sub_root).unwrap();
        fs::write(sub_root.join("f.txt"), b"sub file").unwrap();
        let sub_commit = {
            let mut sub_index = Index::new();
            add(
                &sub,
                &mut sub_index,
                &[PathBuf::from("f.txt")],
                &NoIgnore,
                &AddOptions::default(),
            )
            .unwrap();
            let tree = crate::ops::write_tree_from_index(&sub, &sub_index).unwrap();
            let sig = crate::types::Signature::new("S", "s@s", 0, 0);
            let commit =
                crate::types::Commit::new(tree, vec![], sig.clone(), sig, "sub init\n");
            let id = store::write_commit(&sub, &commit).unwrap();
            refs::update_head(&sub, &id).unwrap();
            id
        };

        let mut index = Index::new();
        let result = add_all(&repo, &mut index, &["."]);

        assert!(result.added.contains(&"vendor/lib".to_string()));
        let entry = index.get("vendor/lib").unwrap();
        assert_eq!(entry.mode, FileMode::Gitlink);
        assert_eq!(entry.id, sub_commit);
        assert_eq!(entry.file_size, 0);
        // contents of the nested repository are not recursed into
        assert!(index.get("vendor/lib/f.txt").is_none());
    }

    #[test]
    fn test_dry_run_stages_nothing() {
        let (_dir, repo) = test_repo();
        fs::write(repo.root().join("a.txt"), b"dry").unwrap();

        let mut index = Index::new();
        let opts = AddOptions {
            dry_run: true,
            ..Default::default()
        };
        let result = add(&repo, &mut index, &[PathBuf::from("a.txt")], &NoIgnore, &opts).unwrap();

        assert_eq!(result.added, ["a.txt"]);
        assert!(index.is_empty());
        // no blob was written either
        let id = compute_object_id(ObjectKind::Blob, b"dry");
        assert!(!store::has_object(&repo, &id));
    }

    #[test]
    fn test_cancellation_aborts() {
        let (_dir, repo) = test_repo();
        fs::write(repo.root().join("a.txt"), b"a").unwrap();

        let cancel = CancelFlag::new();
        cancel.cancel();
        let opts = AddOptions {
            cancel: Some(cancel),
            ..Default::default()
        };

        let mut index = Index::new();
        let result = add(&repo, &mut index, &[PathBuf::from("a.txt")], &NoIgnore, &opts);
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn test_normalize_under_root() {
        let root = Path::new("/repo");
        assert_eq!(
            normalize_under_root(root, Path::new("/repo/a/b.txt")).unwrap(),
            "a/b.txt"
        );
        assert_eq!(
            normalize_under_root(root, Path::new("/repo/a/./b/../c")).unwrap(),
            "a/c"
        );
        assert_eq!(normalize_under_root(root, Path::new("/repo")).unwrap(), "");
        assert!(normalize_under_root(root, Path::new("/repo/../out")).is_err());
        assert!(normalize_under_root(root, Path::new("/elsewhere/x")).is_err());
    }
}
