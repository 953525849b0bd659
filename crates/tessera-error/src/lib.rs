use thiserror::Error;

/// Primary error type for Tessera array-metadata operations.
///
/// Structured variants for the cases callers can act on, with a lossy
/// mapping onto the C-API status codes in [`Status`] for bindings that
/// only speak ternary results.
#[derive(Error, Debug)]
pub enum TesseraError {
    /// A caller-supplied argument failed validation.
    #[error("invalid argument: {detail}")]
    InvalidArgument { detail: String },

    /// The operation is not allowed in the array's current state.
    #[error("cannot {op}: array is {state}")]
    InvalidMode {
        op: &'static str,
        state: &'static str,
    },

    /// The supplied encryption configuration does not match the on-disk
    /// array (missing key, wrong key, or wrong algorithm).
    #[error("encryption mismatch: {detail}")]
    EncryptionMismatch { detail: String },

    /// GCM tag verification failed while decrypting a file.
    #[error("authentication failed: ciphertext was tampered with or the key is wrong")]
    AuthenticationFailed,

    /// A metadata fragment violated the wire-format invariants.
    #[error("corrupt metadata fragment: {detail}")]
    CorruptFragment { detail: String },

    /// An I/O error surfaced verbatim from the VFS.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Enumeration index past the end of the snapshot.
    #[error("metadata index {index} out of range ({num} keys)")]
    OutOfRange { index: u64, num: u64 },

    /// Out of memory. Reserved: the core never raises this itself, but the
    /// status mapping keeps the slot for embedding layers that do.
    #[error("out of memory")]
    OutOfMemory,
}

/// Ternary result codes for the C-style API surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Status {
    /// Successful result.
    Ok = 0,
    /// Generic failure; fetch the message from the error for detail.
    Err = -1,
    /// Allocation failure.
    Oom = -2,
}

impl TesseraError {
    /// Map this error to its C-API status code.
    pub const fn status(&self) -> Status {
        match self {
            Self::OutOfMemory => Status::Oom,
            _ => Status::Err,
        }
    }

    /// Whether retrying with corrected inputs can succeed (as opposed to
    /// on-disk damage that needs operator attention).
    pub const fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument { .. }
                | Self::InvalidMode { .. }
                | Self::EncryptionMismatch { .. }
                | Self::OutOfRange { .. }
        )
    }

    /// Create an `InvalidArgument` error.
    pub fn invalid_argument(detail: impl Into<String>) -> Self {
        Self::InvalidArgument {
            detail: detail.into(),
        }
    }

    /// Create an `InvalidMode` error for `op` against an array in `state`.
    pub const fn invalid_mode(op: &'static str, state: &'static str) -> Self {
        Self::InvalidMode { op, state }
    }

    /// Create an `EncryptionMismatch` error.
    pub fn encryption_mismatch(detail: impl Into<String>) -> Self {
        Self::EncryptionMismatch {
            detail: detail.into(),
        }
    }

    /// Create a `CorruptFragment` error.
    pub fn corrupt(detail: impl Into<String>) -> Self {
        Self::CorruptFragment {
            detail: detail.into(),
        }
    }
}

/// Result type alias using `TesseraError`.
pub type Result<T> = std::result::Result<T, TesseraError>;
