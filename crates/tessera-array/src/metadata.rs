//! The in-memory metadata store behind one array session.
//!
//! A READ session owns a `snapshot`: the fold of all visible fragments,
//! kept in a `BTreeMap` so enumeration is lexicographic by raw key bytes
//! with no extra bookkeeping. A WRITE session owns a `staged` list: the
//! mutations of this session in insertion order, with repeated operations
//! on one key overwriting in place so each key is emitted exactly once.

use std::collections::{BTreeMap, HashMap};

use tessera_error::{Result, TesseraError};
use tessera_types::Datatype;

/// One typed metadata value: `num` elements of `datatype`, little-endian.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataValue {
    /// Element type.
    pub datatype: Datatype,
    /// Number of elements (not bytes); always positive.
    pub num: u32,
    /// `num * datatype.size()` raw bytes.
    pub data: Vec<u8>,
}

/// One mutation in a fragment: a value for `key`, or its deletion.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataEntry {
    /// UTF-8 key; non-empty.
    pub key: String,
    /// `Some` stores a value; `None` is a tombstone.
    pub value: Option<MetadataValue>,
}

/// Key/value state of one session: folded snapshot plus staged mutations.
#[derive(Debug, Default)]
pub struct Metadata {
    snapshot: BTreeMap<String, MetadataValue>,
    staged: Vec<MetadataEntry>,
    staged_index: HashMap<String, usize>,
}

impl Metadata {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a value for `key`, overwriting any mutation already staged
    /// for it in this session.
    pub fn put(&mut self, key: &str, datatype: Datatype, num: u32, data: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(TesseraError::invalid_argument("metadata key is empty"));
        }
        if u32::try_from(key.len()).is_err() {
            return Err(TesseraError::invalid_argument(
                "metadata key longer than u32::MAX bytes",
            ));
        }
        if !datatype.is_storable() {
            return Err(TesseraError::invalid_argument(format!(
                "datatype {datatype} is not storable as metadata"
            )));
        }
        if num == 0 {
            return Err(TesseraError::invalid_argument(
                "metadata value count must be positive",
            ));
        }
        let expected = u64::from(num) * datatype.size();
        if data.len() as u64 != expected {
            return Err(TesseraError::invalid_argument(format!(
                "value is {} bytes but {num} x {datatype} needs {expected}",
                data.len()
            )));
        }

        self.stage(MetadataEntry {
            key: key.to_owned(),
            value: Some(MetadataValue {
                datatype,
                num,
                data: data.to_vec(),
            }),
        });
        Ok(())
    }

    /// Stage a tombstone for `key`.
    ///
    /// Succeeds whether or not the key exists anywhere: deleting an absent
    /// key is a recorded no-op that consolidation later drops.
    pub fn delete(&mut self, key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(TesseraError::invalid_argument("metadata key is empty"));
        }
        self.stage(MetadataEntry {
            key: key.to_owned(),
            value: None,
        });
        Ok(())
    }

    fn stage(&mut self, entry: MetadataEntry) {
        if let Some(&i) = self.staged_index.get(&entry.key) {
            self.staged[i] = entry;
        } else {
            self.staged_index.insert(entry.key.clone(), self.staged.len());
            self.staged.push(entry);
        }
    }

    /// Look up `key` in the snapshot.
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.snapshot.get(key)
    }

    /// Number of live keys in the snapshot.
    pub fn num(&self) -> u64 {
        self.snapshot.len() as u64
    }

    /// Enumerate the snapshot in lexicographic raw-byte key order.
    pub fn get_from_index(&self, index: u64) -> Result<(&str, &MetadataValue)> {
        let num = self.num();
        if index >= num {
            return Err(TesseraError::OutOfRange { index, num });
        }
        let (key, value) = usize::try_from(index)
            .ok()
            .and_then(|i| self.snapshot.iter().nth(i))
            .ok_or(TesseraError::OutOfRange { index, num })?;
        Ok((key.as_str(), value))
    }

    /// Fold one decoded fragment into the snapshot, in file order.
    pub fn apply_fragment(&mut self, entries: Vec<MetadataEntry>) {
        for entry in entries {
            match entry.value {
                Some(value) => {
                    self.snapshot.insert(entry.key, value);
                }
                None => {
                    self.snapshot.remove(&entry.key);
                }
            }
        }
    }

    /// The mutations staged so far, in insertion order.
    pub fn staged_entries(&self) -> &[MetadataEntry] {
        &self.staged
    }

    /// Whether this session staged anything.
    pub fn has_staged(&self) -> bool {
        !self.staged.is_empty()
    }

    /// The snapshot re-expressed as entries in key order, tombstone-free:
    /// the content of a consolidated fragment.
    pub fn snapshot_entries(&self) -> Vec<MetadataEntry> {
        self.snapshot
            .iter()
            .map(|(key, value)| MetadataEntry {
                key: key.clone(),
                value: Some(value.clone()),
            })
            .collect()
    }
}
