//! Local-filesystem VFS backend over `std::fs`.
//!
//! `write_file` stages into a sibling temp file and renames it into place,
//! so a crashing writer never leaves a half-written file under a published
//! name. POSIX `rename(2)` within one directory is atomic, which is all the
//! publish path relies on.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use tessera_error::Result;
use tracing::debug;

use crate::Vfs;

/// Monotonic counter distinguishing concurrent staging files from the same
/// process.
static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// VFS backend for local POSIX (and Windows) filesystems.
#[derive(Debug, Clone, Copy, Default)]
pub struct PosixVfs;

impl PosixVfs {
    /// Create a new local-filesystem backend.
    pub const fn new() -> Self {
        Self
    }
}

impl Vfs for PosixVfs {
    fn name(&self) -> &'static str {
        "posix"
    }

    fn create_dir(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        Ok(())
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(fs::read(path)?)
    }

    fn write_file(&self, path: &Path, data: &[u8]) -> Result<()> {
        let seq = STAGING_SEQ.fetch_add(1, Ordering::Relaxed);
        let mut staging = path.as_os_str().to_owned();
        staging.push(format!(".stage.{}.{seq}", std::process::id()));
        let staging = Path::new(&staging);

        fs::write(staging, data)?;
        if let Err(err) = fs::rename(staging, path) {
            let _ = fs::remove_file(staging);
            return Err(err.into());
        }
        debug!(path = %path.display(), bytes = data.len(), "posix write_file");
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to)?;
        debug!(from = %from.display(), to = %to.display(), "posix rename");
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)?;
        Ok(())
    }

    fn file_exists(&self, path: &Path) -> Result<bool> {
        Ok(path.try_exists()?)
    }
}
