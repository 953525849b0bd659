pub mod datatype;

pub use datatype::Datatype;

use std::fmt;

/// The mode an array session is opened in.
///
/// Reads and writes are strictly separated: a READ session materializes a
/// snapshot and serves lookups; a WRITE session stages mutations and flushes
/// them as one fragment on close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    /// Snapshot reads: `get`, `num`, enumeration by index.
    Read,
    /// Staged mutations: `put`, `delete`.
    Write,
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
        }
    }
}

/// Encryption algorithm tag for an array.
///
/// Only AES-256-GCM is implemented; the enum is closed so that adding an
/// algorithm is an explicit wire-visible decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EncryptionType {
    /// No encryption; files are stored as plaintext.
    #[default]
    NoEncryption,
    /// Whole-file AES-256-GCM with a per-file random nonce.
    Aes256Gcm,
}

impl fmt::Display for EncryptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoEncryption => f.write_str("NO_ENCRYPTION"),
            Self::Aes256Gcm => f.write_str("AES_256_GCM"),
        }
    }
}
