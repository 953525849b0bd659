//! Whole-file authenticated encryption.
//!
//! Every metadata fragment passes through a [`CryptoFilter`] on its way to
//! and from the VFS. Unkeyed, the filter is the identity. Keyed, a sealed
//! file has the layout:
//!
//! ```text
//! [nonce: 12 bytes, random per file]
//! [AES-256-GCM ciphertext]
//! [GCM tag: 16 bytes]
//! ```
//!
//! The key is never persisted; a reader that cannot authenticate a file
//! learns only that its key is wrong or the file was tampered with.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use tessera_error::{Result, TesseraError};
use tessera_types::EncryptionType;

/// AES-256 key size in bytes.
pub const KEY_SIZE: usize = 32;

/// GCM nonce size in bytes (96 bits).
pub const NONCE_SIZE: usize = 12;

/// GCM authentication tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// A validated 32-byte AES-256-GCM key.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey {
    bytes: [u8; KEY_SIZE],
}

impl EncryptionKey {
    /// Validate an algorithm tag and raw key bytes into a usable key.
    ///
    /// The algorithm must be [`EncryptionType::Aes256Gcm`]; anything else
    /// with key material attached is an `EncryptionMismatch`. The key must
    /// be exactly [`KEY_SIZE`] bytes.
    pub fn new(encryption_type: EncryptionType, key: &[u8]) -> Result<Self> {
        if encryption_type != EncryptionType::Aes256Gcm {
            return Err(TesseraError::encryption_mismatch(format!(
                "unsupported encryption algorithm {encryption_type}"
            )));
        }
        let bytes: [u8; KEY_SIZE] = key.try_into().map_err(|_| {
            TesseraError::invalid_argument(format!(
                "encryption key must be {KEY_SIZE} bytes, got {}",
                key.len()
            ))
        })?;
        Ok(Self { bytes })
    }

    fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

// Key material stays out of logs and error chains.
impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// Seals and opens whole files, transparently passing them through when no
/// key is attached.
#[derive(Debug, Clone, Default)]
pub enum CryptoFilter {
    /// No encryption; bytes pass through unchanged.
    #[default]
    Passthrough,
    /// AES-256-GCM with the given key.
    Aes256Gcm(EncryptionKey),
}

impl CryptoFilter {
    /// The identity filter.
    pub const fn passthrough() -> Self {
        Self::Passthrough
    }

    /// An AES-256-GCM filter over `key`.
    pub const fn aes_256_gcm(key: EncryptionKey) -> Self {
        Self::Aes256Gcm(key)
    }

    /// Whether this filter encrypts.
    pub const fn is_keyed(&self) -> bool {
        matches!(self, Self::Aes256Gcm(_))
    }

    /// Encrypt `plaintext` into the sealed on-disk representation.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let key = match self {
            Self::Passthrough => return Ok(plaintext.to_vec()),
            Self::Aes256Gcm(key) => key,
        };

        let mut nonce = [0u8; NONCE_SIZE];
        StdRng::from_entropy().fill_bytes(&mut nonce);

        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| TesseraError::Io(std::io::Error::other(format!("cipher init: {e}"))))?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| TesseraError::Io(std::io::Error::other(format!("encrypt: {e}"))))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Decrypt a sealed file, verifying the authentication tag first.
    ///
    /// Fails `EncryptionMismatch` when `sealed` is too short to carry a
    /// nonce and tag, and `AuthenticationFailed` when tag verification
    /// rejects the ciphertext.
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        let key = match self {
            Self::Passthrough => return Ok(sealed.to_vec()),
            Self::Aes256Gcm(key) => key,
        };

        if sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(TesseraError::encryption_mismatch(format!(
                "file of {} bytes is too short to be AES-256-GCM encrypted",
                sealed.len()
            )));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);

        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| TesseraError::Io(std::io::Error::other(format!("cipher init: {e}"))))?;
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| TesseraError::AuthenticationFailed)
    }
}
