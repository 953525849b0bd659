//! Tessera: persistent n-dimensional arrays with versioned key/value
//! metadata.
//!
//! This facade re-exports the array metadata surface: open an array for
//! reading or writing, attach typed values to it, travel back in time with
//! `open_at`, and consolidate the fragment log when it grows.
//!
//! ```
//! use tessera::{Array, Datatype, MemoryVfs, QueryType};
//!
//! # fn main() -> tessera::Result<()> {
//! let vfs = MemoryVfs::new();
//! let mut array = Array::new(vfs.clone(), "/arrays/demo");
//!
//! array.open(QueryType::Write)?;
//! array.put_metadata("rows", Datatype::UInt64, 1, &100u64.to_le_bytes())?;
//! array.close()?;
//!
//! array.open(QueryType::Read)?;
//! let rows = array.get_metadata("rows")?.expect("just written");
//! assert_eq!(rows.data, 100u64.to_le_bytes());
//! array.close()?;
//! # Ok(())
//! # }
//! ```

pub use tessera_array::{
    clock, consolidate_metadata, consolidate_metadata_with_key, Array, FragmentName, Metadata,
    MetadataEntry, MetadataValue, METADATA_DIR,
};
pub use tessera_crypto::{CryptoFilter, EncryptionKey};
pub use tessera_error::{Result, Status, TesseraError};
pub use tessera_types::{Datatype, EncryptionType, QueryType};
pub use tessera_vfs::{MemoryVfs, PosixVfs, Vfs};
