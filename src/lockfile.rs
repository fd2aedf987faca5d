use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, IoResultExt, Result};

/// exclusive advisory lock over a file, following the `<name>.lock`
/// protocol: create the lock file with O_CREAT|O_EXCL, write the new
/// content into it, then rename it over the target.
///
/// a lock file left behind by another process is reported via
/// `Error::LockHeld` and never removed. dropping an uncommitted lock
/// removes only our own lock file.
pub struct LockFile {
    target: PathBuf,
    lock_path: PathBuf,
    file: Option<File>,
    committed: bool,
}

impl LockFile {
    /// take the lock for `target` by creating `<target>.lock`
    pub fn acquire(target: &Path) -> Result<Self> {
        let lock_path = lock_path_for(target);
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).with_path(parent)?;
        }

        let file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(Error::LockHeld(lock_path));
            }
            Err(source) => {
                return Err(Error::Io {
                    path: lock_path,
                    source,
                });
            }
        };

        Ok(Self {
            target: target.to_path_buf(),
            lock_path,
            file: Some(file),
            committed: false,
        })
    }

    /// append bytes to the lock file
    pub fn write_all(&mut self, data: &[u8]) -> Result<()> {
        match self.file.as_mut() {
            Some(file) => file.write_all(data).with_path(&self.lock_path),
            None => Err(Error::Io {
                path: self.lock_path.clone(),
                source: io::Error::new(io::ErrorKind::Other, "lock already committed"),
            }),
        }
    }

    /// publish the new content by renaming the lock file onto the target
    pub fn commit(mut self) -> Result<()> {
        if let Some(file) = self.file.take() {
            // fsync is best-effort; the rename is the durability point
            let _ = file.sync_all();
        }
        fs::rename(&self.lock_path, &self.target).with_path(&self.target)?;
        self.committed = true;
        Ok(())
    }

    /// path of the lock file itself
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if !self.committed {
            self.file.take();
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}

/// `<target>.lock`, appended rather than substituted so `index` and
/// `HEAD` both get the conventional names
fn lock_path_for(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    target.with_file_name(name)
}
