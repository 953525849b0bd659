//! Array handles and the session lifecycle.
//!
//! A handle moves `Closed -> Opened(mode, T) -> Closed`. Opening for READ
//! materializes the metadata snapshot at `T` by folding every fragment with
//! timestamp `<= T` in filename order; opening for WRITE starts an empty
//! staged set that `close` flushes as one new fragment. The snapshot's
//! fragment list is frozen at open time: fragments published afterwards are
//! invisible until `reopen`.

use std::path::{Path, PathBuf};

use tessera_crypto::{CryptoFilter, EncryptionKey};
use tessera_error::{Result, TesseraError};
use tessera_types::{Datatype, EncryptionType, QueryType};
use tessera_vfs::Vfs;
use tracing::debug;

use crate::clock::now_ms;
use crate::codec;
use crate::fragment::{self, FragmentName, METADATA_DIR};
use crate::metadata::{Metadata, MetadataValue};

/// A handle to one array on a VFS backend.
///
/// The handle is single-session: callers sharing it across threads must
/// synchronize externally. Cloneable backends (e.g. `MemoryVfs`) let many
/// handles target the same array concurrently.
#[derive(Debug)]
pub struct Array<V: Vfs> {
    vfs: V,
    uri: PathBuf,
    state: State,
}

#[derive(Debug)]
enum State {
    /// Freshly allocated or closed; no I/O has been tied to the handle.
    Closed,
    Opened(OpenSession),
}

#[derive(Debug)]
struct OpenSession {
    mode: QueryType,
    timestamp: u64,
    filter: CryptoFilter,
    metadata: Metadata,
}

impl<V: Vfs> Array<V> {
    /// Allocate a handle for the array rooted at `uri`. No I/O.
    pub fn new(vfs: V, uri: impl Into<PathBuf>) -> Self {
        Self {
            vfs,
            uri: uri.into(),
            state: State::Closed,
        }
    }

    /// The array's root URI.
    pub fn uri(&self) -> &Path {
        &self.uri
    }

    /// Whether a session is currently open.
    pub const fn is_open(&self) -> bool {
        matches!(self.state, State::Opened(_))
    }

    /// The open mode, if a session is open.
    pub const fn mode(&self) -> Option<QueryType> {
        match &self.state {
            State::Opened(session) => Some(session.mode),
            State::Closed => None,
        }
    }

    /// Open a session at the current time.
    pub fn open(&mut self, mode: QueryType) -> Result<()> {
        self.open_inner(mode, None, CryptoFilter::passthrough())
    }

    /// Open a READ session showing the array as of `timestamp_ms`.
    ///
    /// Fragments with a strictly greater timestamp are excluded even when
    /// present on disk. WRITE sessions always stamp fragments with the
    /// present, so `open_at` rejects [`QueryType::Write`].
    pub fn open_at(&mut self, mode: QueryType, timestamp_ms: u64) -> Result<()> {
        if mode != QueryType::Read {
            return Err(TesseraError::invalid_argument(
                "open_at is only valid for read sessions",
            ));
        }
        self.open_inner(mode, Some(timestamp_ms), CryptoFilter::passthrough())
    }

    /// Open a session on an encrypted array.
    pub fn open_with_key(
        &mut self,
        mode: QueryType,
        encryption_type: EncryptionType,
        key: &[u8],
    ) -> Result<()> {
        let key = EncryptionKey::new(encryption_type, key)?;
        self.open_inner(mode, None, CryptoFilter::aes_256_gcm(key))
    }

    /// Open a READ session on an encrypted array as of `timestamp_ms`.
    pub fn open_at_with_key(
        &mut self,
        mode: QueryType,
        timestamp_ms: u64,
        encryption_type: EncryptionType,
        key: &[u8],
    ) -> Result<()> {
        if mode != QueryType::Read {
            return Err(TesseraError::invalid_argument(
                "open_at is only valid for read sessions",
            ));
        }
        let key = EncryptionKey::new(encryption_type, key)?;
        self.open_inner(mode, Some(timestamp_ms), CryptoFilter::aes_256_gcm(key))
    }

    fn open_inner(
        &mut self,
        mode: QueryType,
        timestamp: Option<u64>,
        filter: CryptoFilter,
    ) -> Result<()> {
        if self.is_open() {
            return Err(TesseraError::invalid_mode("open", "already open"));
        }
        let timestamp = timestamp.unwrap_or_else(now_ms);

        let metadata = match mode {
            QueryType::Read => {
                let (metadata, fragments) =
                    load_snapshot(&self.vfs, &self.metadata_dir(), &filter, timestamp)?;
                debug!(
                    uri = %self.uri.display(),
                    timestamp,
                    fragments = fragments.len(),
                    keys = metadata.num(),
                    "opened array for reading"
                );
                metadata
            }
            QueryType::Write => {
                debug!(uri = %self.uri.display(), timestamp, "opened array for writing");
                Metadata::new()
            }
        };

        self.state = State::Opened(OpenSession {
            mode,
            timestamp,
            filter,
            metadata,
        });
        Ok(())
    }

    /// Refresh a READ session to the present: re-list the fragments and
    /// refold at a fresh timestamp. Values borrowed from the previous
    /// snapshot do not survive this call.
    pub fn reopen(&mut self) -> Result<()> {
        let session = match &mut self.state {
            State::Opened(session) if session.mode == QueryType::Read => session,
            State::Opened(_) => {
                return Err(TesseraError::invalid_mode("reopen", "opened for writing"))
            }
            State::Closed => return Err(TesseraError::invalid_mode("reopen", "not open")),
        };

        let timestamp = now_ms();
        let (metadata, fragments) = load_snapshot(
            &self.vfs,
            &self.uri.join(METADATA_DIR),
            &session.filter,
            timestamp,
        )?;
        debug!(
            uri = %self.uri.display(),
            timestamp,
            fragments = fragments.len(),
            "reopened array"
        );
        session.timestamp = timestamp;
        session.metadata = metadata;
        Ok(())
    }

    /// Close the session. A WRITE session with staged mutations flushes
    /// them as one fragment, published atomically; on failure the array's
    /// on-disk state is unchanged and the session stays open.
    pub fn close(&mut self) -> Result<()> {
        let session = match &self.state {
            State::Opened(session) => session,
            State::Closed => return Err(TesseraError::invalid_mode("close", "not open")),
        };

        if session.mode == QueryType::Write && session.metadata.has_staged() {
            let payload = codec::encode(session.metadata.staged_entries())?;
            let sealed = session.filter.seal(&payload)?;

            let dir = self.metadata_dir();
            self.vfs.create_dir(&dir)?;
            let name = FragmentName::generate(session.timestamp);
            fragment::publish(&self.vfs, &dir, &name, &sealed)?;
            debug!(
                uri = %self.uri.display(),
                fragment = %name,
                entries = session.metadata.staged_entries().len(),
                bytes = sealed.len(),
                "flushed metadata fragment"
            );
        }

        self.state = State::Closed;
        Ok(())
    }

    /// Stage a metadata value for `key`. Requires an open WRITE session.
    pub fn put_metadata(
        &mut self,
        key: &str,
        datatype: Datatype,
        num: u32,
        data: &[u8],
    ) -> Result<()> {
        self.write_session("put_metadata")?
            .metadata
            .put(key, datatype, num, data)
    }

    /// Stage deletion of `key`. Requires an open WRITE session; succeeds
    /// even when the key does not exist.
    pub fn delete_metadata(&mut self, key: &str) -> Result<()> {
        self.write_session("delete_metadata")?.metadata.delete(key)
    }

    /// Look up `key` in the snapshot. Requires an open READ session.
    /// Absence is `Ok(None)`, not an error.
    pub fn get_metadata(&self, key: &str) -> Result<Option<&MetadataValue>> {
        Ok(self.read_session("get_metadata")?.metadata.get(key))
    }

    /// Number of keys in the snapshot. Requires an open READ session.
    pub fn metadata_num(&self) -> Result<u64> {
        Ok(self.read_session("metadata_num")?.metadata.num())
    }

    /// Enumerate the snapshot in lexicographic raw-byte key order.
    /// Requires an open READ session; `OutOfRange` past the end.
    pub fn metadata_from_index(&self, index: u64) -> Result<(&str, &MetadataValue)> {
        self.read_session("metadata_from_index")?
            .metadata
            .get_from_index(index)
    }

    fn metadata_dir(&self) -> PathBuf {
        self.uri.join(METADATA_DIR)
    }

    fn read_session(&self, op: &'static str) -> Result<&OpenSession> {
        match &self.state {
            State::Opened(session) if session.mode == QueryType::Read => Ok(session),
            State::Opened(_) => Err(TesseraError::invalid_mode(op, "opened for writing")),
            State::Closed => Err(TesseraError::invalid_mode(op, "not open")),
        }
    }

    fn write_session(&mut self, op: &'static str) -> Result<&mut OpenSession> {
        match &mut self.state {
            State::Opened(session) if session.mode == QueryType::Write => Ok(session),
            State::Opened(_) => Err(TesseraError::invalid_mode(op, "opened for reading")),
            State::Closed => Err(TesseraError::invalid_mode(op, "not open")),
        }
    }
}

/// Fold every fragment in `dir` with timestamp `<= upto` into a snapshot,
/// returning it with the exact fragment list folded (oldest first).
///
/// A missing directory reads as an empty array. Failures while reading a
/// fragment are classified against the keying state: an authentication
/// failure under a key, or an undecodable fragment without one, both mean
/// the caller's encryption configuration does not match the array.
pub(crate) fn load_snapshot<V: Vfs>(
    vfs: &V,
    dir: &Path,
    filter: &CryptoFilter,
    upto: u64,
) -> Result<(Metadata, Vec<FragmentName>)> {
    let mut metadata = Metadata::new();
    if !vfs.file_exists(dir)? {
        return Ok((metadata, Vec::new()));
    }

    let mut fragments: Vec<FragmentName> = vfs
        .list_dir(dir)?
        .iter()
        .filter_map(|name| FragmentName::parse(name))
        .filter(|fragment| fragment.timestamp() <= upto)
        .collect();
    fragments.sort();

    for name in &fragments {
        let sealed = vfs.read_file(&dir.join(name.file_name()))?;
        let plaintext = filter
            .open(&sealed)
            .map_err(|err| classify_read_error(err, filter, name))?;
        let entries =
            codec::decode(&plaintext).map_err(|err| classify_read_error(err, filter, name))?;
        metadata.apply_fragment(entries);
    }
    Ok((metadata, fragments))
}

/// Map fragment read failures onto the session-level error the caller can
/// act on. Fragments carry no plaintext marker (everything in an encrypted
/// array is ciphertext), so mis-keyed opens surface as read failures here.
fn classify_read_error(
    err: TesseraError,
    filter: &CryptoFilter,
    name: &FragmentName,
) -> TesseraError {
    match err {
        TesseraError::AuthenticationFailed | TesseraError::EncryptionMismatch { .. }
            if filter.is_keyed() =>
        {
            TesseraError::encryption_mismatch(format!(
                "cannot decrypt fragment {name}: wrong key, or the array is not encrypted"
            ))
        }
        TesseraError::CorruptFragment { detail } if !filter.is_keyed() => {
            TesseraError::encryption_mismatch(format!(
                "cannot decode fragment {name} ({detail}): the array may be encrypted \
                 and no key was given"
            ))
        }
        TesseraError::CorruptFragment { detail } => TesseraError::corrupt(format!(
            "fragment {name}: {detail}"
        )),
        other => other,
    }
}
