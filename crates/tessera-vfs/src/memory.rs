//! In-memory VFS backend for tests and ephemeral arrays.
//!
//! All files live in a shared path-keyed map. Cloning a `MemoryVfs` clones
//! the handle, not the contents: clones observe each other's writes, which
//! is what multi-session tests need.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tessera_error::{Result, TesseraError};

use crate::Vfs;

#[derive(Debug, Default)]
struct MemoryVfsInner {
    files: HashMap<PathBuf, Vec<u8>>,
    dirs: HashSet<PathBuf>,
}

/// An in-memory VFS. No persistence; writes are atomic under the
/// backend's lock.
#[derive(Debug, Clone, Default)]
pub struct MemoryVfs {
    inner: Arc<Mutex<MemoryVfsInner>>,
}

impl MemoryVfs {
    /// Create a new empty in-memory filesystem.
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_err() -> TesseraError {
    TesseraError::Io(std::io::Error::other("MemoryVfs lock poisoned"))
}

fn not_found(path: &Path) -> TesseraError {
    TesseraError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("no such file or directory: '{}'", path.display()),
    ))
}

impl Vfs for MemoryVfs {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn create_dir(&self, path: &Path) -> Result<()> {
        let mut inner = self.inner.lock().map_err(|_| lock_err())?;
        let mut dir = Some(path);
        while let Some(p) = dir {
            inner.dirs.insert(p.to_path_buf());
            dir = p.parent();
        }
        Ok(())
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        let inner = self.inner.lock().map_err(|_| lock_err())?;
        let names: Vec<String> = inner
            .files
            .keys()
            .filter(|p| p.parent() == Some(path))
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        if names.is_empty() && !inner.dirs.contains(path) {
            return Err(not_found(path));
        }
        Ok(names)
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        let inner = self.inner.lock().map_err(|_| lock_err())?;
        inner
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| not_found(path))
    }

    fn write_file(&self, path: &Path, data: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock().map_err(|_| lock_err())?;
        inner.files.insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let mut inner = self.inner.lock().map_err(|_| lock_err())?;
        let data = inner.files.remove(from).ok_or_else(|| not_found(from))?;
        inner.files.insert(to.to_path_buf(), data);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let mut inner = self.inner.lock().map_err(|_| lock_err())?;
        inner
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }

    fn file_exists(&self, path: &Path) -> Result<bool> {
        let inner = self.inner.lock().map_err(|_| lock_err())?;
        Ok(inner.files.contains_key(path) || inner.dirs.contains(path))
    }
}
