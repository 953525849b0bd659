//! Array sessions and the metadata fragment log.
//!
//! Durable metadata for an array is an append-only series of *fragments*:
//! one immutable file per write session, named by the session's open
//! timestamp, living under the array's `__meta` directory. A read session
//! folds the fragments in filename order into a key/value snapshot; a write
//! session stages mutations and flushes them as one new fragment on close.
//! [`consolidate_metadata`] fuses the log back into a single fragment.

pub mod array;
pub mod clock;
pub mod codec;
pub mod consolidate;
pub mod fragment;
pub mod metadata;

pub use array::Array;
pub use consolidate::{consolidate_metadata, consolidate_metadata_with_key};
pub use fragment::{FragmentName, METADATA_DIR};
pub use metadata::{Metadata, MetadataEntry, MetadataValue};
