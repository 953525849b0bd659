//! Metadata consolidation: fuse the fragment log into one fragment.
//!
//! Runs outside any open session. The merged fragment contains the folded
//! snapshot in key order with no tombstones (a tombstone with nothing below
//! it to delete is a no-op and vanishes). Ordering of durability matters:
//! the merged fragment is published before any predecessor is unlinked, so
//! a crash at any point leaves a directory that still folds to the correct
//! snapshot, at worst with a redundant file.

use std::path::Path;

use tessera_crypto::{CryptoFilter, EncryptionKey};
use tessera_error::Result;
use tessera_types::EncryptionType;
use tessera_vfs::Vfs;
use tracing::debug;

use crate::array::load_snapshot;
use crate::clock::now_ms;
use crate::codec;
use crate::fragment::{self, FragmentName, METADATA_DIR};

/// Consolidate the metadata of the unencrypted array at `uri`.
pub fn consolidate_metadata<V: Vfs>(vfs: &V, uri: &Path) -> Result<()> {
    consolidate(vfs, uri, CryptoFilter::passthrough())
}

/// Consolidate the metadata of an encrypted array.
///
/// The key must match the one the fragments were written with; without it
/// the snapshot cannot be rebuilt and consolidation fails up front.
pub fn consolidate_metadata_with_key<V: Vfs>(
    vfs: &V,
    uri: &Path,
    encryption_type: EncryptionType,
    key: &[u8],
) -> Result<()> {
    let key = EncryptionKey::new(encryption_type, key)?;
    consolidate(vfs, uri, CryptoFilter::aes_256_gcm(key))
}

fn consolidate<V: Vfs>(vfs: &V, uri: &Path, filter: CryptoFilter) -> Result<()> {
    let dir = uri.join(METADATA_DIR);
    let timestamp = now_ms();

    // The fragment list captured here is exactly the set folded into the
    // snapshot, and exactly the set unlinked below. Writers publishing
    // after this list is taken survive untouched and fold after the merged
    // fragment, preserving last-writer-wins.
    let (metadata, fragments) = load_snapshot(vfs, &dir, &filter, timestamp)?;
    if fragments.is_empty() {
        return Ok(());
    }

    let payload = codec::encode(&metadata.snapshot_entries())?;
    let sealed = filter.seal(&payload)?;
    let name = FragmentName::generate(timestamp);
    fragment::publish(vfs, &dir, &name, &sealed)?;

    for old in &fragments {
        vfs.remove_file(&dir.join(old.file_name()))?;
    }
    debug!(
        uri = %uri.display(),
        fragment = %name,
        consolidated = fragments.len(),
        keys = metadata.num(),
        "consolidated metadata"
    );
    Ok(())
}
