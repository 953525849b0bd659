//! Fragment file naming and atomic publication.
//!
//! A fragment is named `__<T>_<suffix>`: `T` is the producing session's
//! open timestamp as 20 zero-padded decimal digits, and the suffix is a
//! random 16-char lowercase-hex token that makes concurrent writers
//! collision-free. Because `T` is fixed-width and the prefix constant,
//! lexicographic filename order equals `(T, suffix)` order, which is the
//! fold order readers rely on.

use std::path::Path;

use tessera_error::Result;
use tessera_vfs::Vfs;

/// Name of the metadata subdirectory under an array's root URI.
pub const METADATA_DIR: &str = "__meta";

const NAME_PREFIX: &str = "__";
const TIMESTAMP_DIGITS: usize = 20;
const SUFFIX_LEN: usize = 16;

/// Parsed name of one metadata fragment file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FragmentName {
    timestamp: u64,
    suffix: String,
}

impl FragmentName {
    /// Mint a fresh name at `timestamp` with a random uniqueness suffix.
    pub fn generate(timestamp: u64) -> Self {
        Self {
            timestamp,
            suffix: format!("{:016x}", rand::random::<u64>()),
        }
    }

    /// Parse a directory entry name, returning `None` for anything that is
    /// not a well-formed fragment name (temp files, foreign files).
    pub fn parse(name: &str) -> Option<Self> {
        let rest = name.strip_prefix(NAME_PREFIX)?;
        if rest.len() != TIMESTAMP_DIGITS + 1 + SUFFIX_LEN {
            return None;
        }
        let (digits, rest) = rest.split_at(TIMESTAMP_DIGITS);
        let suffix = rest.strip_prefix('_')?;
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if !suffix
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return None;
        }
        let timestamp = digits.parse().ok()?;
        Some(Self {
            timestamp,
            suffix: suffix.to_owned(),
        })
    }

    /// The producing session's open timestamp in milliseconds.
    #[inline]
    pub const fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// The published file name.
    pub fn file_name(&self) -> String {
        format!(
            "{NAME_PREFIX}{:0width$}_{}",
            self.timestamp,
            self.suffix,
            width = TIMESTAMP_DIGITS
        )
    }

    /// Staging name used before the rename that publishes the fragment.
    /// Fails [`FragmentName::parse`], so readers never observe it.
    pub fn staging_name(&self) -> String {
        format!("{}.tmp", self.file_name())
    }
}

impl std::fmt::Display for FragmentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.file_name())
    }
}

/// Durably publish `bytes` as fragment `name` under `dir`.
///
/// Stages to a temp name and renames, so no reader observes a partial
/// fragment under a parseable name. Backends without rename publish with a
/// direct atomic `write_file`. A failed rename unlinks the staging file and
/// leaves the directory unchanged.
pub fn publish<V: Vfs>(vfs: &V, dir: &Path, name: &FragmentName, bytes: &[u8]) -> Result<()> {
    let final_path = dir.join(name.file_name());
    if vfs.supports_rename() {
        let staging_path = dir.join(name.staging_name());
        vfs.write_file(&staging_path, bytes)?;
        if let Err(err) = vfs.rename(&staging_path, &final_path) {
            let _ = vfs.remove_file(&staging_path);
            return Err(err);
        }
    } else {
        vfs.write_file(&final_path, bytes)?;
    }
    Ok(())
}
