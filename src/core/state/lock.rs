use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::platform::{NativePlatform, Platform};

/// Exclusive advisory lock guarding against overlapping runs on one host.
///
/// The kernel drops the lock when the holding process exits, crashed or not,
/// so an abandoned lock never has to be detected or taken over. The file
/// itself stays on disk; only the lock on it matters.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Tries to take the lock at `path`. Returns `Ok(None)` if another live
    /// run holds it.
    pub fn acquire<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let mut file = open_lock_file(&path)?;
        if let Err(e) = file.try_lock_exclusive() {
            if e.kind() == fs2::lock_contended_error().kind() {
                return Ok(None);
            }
            return Err(e).with_context(|| format!("locking {}", path.display()));
        }
        NativePlatform::restrict_file_permissions(&path);

        // Informational only: who holds it.
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        writeln!(file, "{}", std::process::id())?;

        Ok(Some(Self { file, path }))
    }

    /// Whether some run currently holds the lock at `path`.
    pub fn is_held<P: AsRef<Path>>(path: P) -> bool {
        let Ok(file) = OpenOptions::new().read(true).write(true).open(path.as_ref()) else {
            return false;
        };
        match file.try_lock_exclusive() {
            Ok(()) => {
                let _ = FileExt::unlock(&file);
                false
            }
            Err(_) => true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))
}

impl Drop for RunLock {
    fn drop(&mut self) {
        // Never unlink: a waiting run may already hold the same inode open.
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_refused_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_seen.json.lock");

        let first = RunLock::acquire(&path).unwrap();
        assert!(first.is_some());
        assert!(RunLock::is_held(&path));
        assert!(RunLock::acquire(&path).unwrap().is_none());

        drop(first);
        assert!(!RunLock::is_held(&path));
        assert!(RunLock::acquire(&path).unwrap().is_some());
    }

    #[test]
    fn old_lock_file_without_holder_is_free() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.lock");
        std::fs::write(&path, "99999\n").unwrap();

        assert!(!RunLock::is_held(&path));
        let lock = RunLock::acquire(&path).unwrap();
        assert!(lock.is_some());
        drop(lock);
        let pid = std::fs::read_to_string(&path).unwrap();
        assert_eq!(pid.trim(), std::process::id().to_string());
    }

    #[test]
    fn live_holder_is_never_displaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.lock");

        let first = RunLock::acquire(&path).unwrap().unwrap();
        // However long the first run takes, nobody else gets in.
        for _ in 0..3 {
            assert!(RunLock::acquire(&path).unwrap().is_none());
        }
        drop(first);

        let second = RunLock::acquire(&path).unwrap().unwrap();
        assert!(path.exists());
        assert!(RunLock::acquire(&path).unwrap().is_none());
        drop(second);
    }

    #[test]
    fn missing_lock_file_is_not_held() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!RunLock::is_held(dir.path().join("absent.lock")));
    }
}
