//! Virtual filesystem capability layer.
//!
//! The metadata core performs only whole-file operations: list a directory,
//! read a file, publish a file, rename, unlink. This trait captures exactly
//! that capability set so backends can range from local POSIX directories to
//! object stores, and tests can run against an in-memory map.

mod memory;
mod posix;

pub use memory::MemoryVfs;
pub use posix::PosixVfs;

use std::path::Path;

use tessera_error::Result;

/// A virtual filesystem backend.
///
/// All operations are synchronous: when a call returns, the effect is
/// visible to subsequent calls on the same backend. `write_file` is
/// create-or-replace and must never expose a partially-written file under
/// the target name.
pub trait Vfs: Send + Sync {
    /// The name of this backend (e.g. "posix", "memory").
    fn name(&self) -> &'static str;

    /// Create a directory (and missing parents). Succeeds if it already
    /// exists.
    fn create_dir(&self, path: &Path) -> Result<()>;

    /// List the entry names (not full paths) directly under `path`.
    fn list_dir(&self, path: &Path) -> Result<Vec<String>>;

    /// Read an entire file.
    fn read_file(&self, path: &Path) -> Result<Vec<u8>>;

    /// Atomically create or replace `path` with `data`.
    fn write_file(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Atomically rename `from` to `to`, replacing `to` if present.
    ///
    /// Backends that return `false` from [`Vfs::supports_rename`] may leave
    /// this unimplemented; callers must publish with `write_file` instead.
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Remove a file.
    fn remove_file(&self, path: &Path) -> Result<()>;

    /// Whether a file or directory exists at `path`.
    fn file_exists(&self, path: &Path) -> Result<bool>;

    /// Whether `rename` is atomic on this backend. Object-store backends
    /// without rename return `false`, and publishers fall back to a direct
    /// `write_file` of the final name.
    fn supports_rename(&self) -> bool {
        true
    }
}
