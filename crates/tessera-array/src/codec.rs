//! Wire codec for metadata fragments.
//!
//! A fragment file is a bare concatenation of entries, no header and no
//! checksum (integrity belongs to the crypto filter when keyed, to the
//! backend otherwise). Each entry is:
//!
//! ```text
//! [tombstone: u8, 0 or 1]
//! [key_len:   u32 LE, > 0]
//! [key:       key_len UTF-8 bytes, no NUL]
//! [type:      u8 datatype tag; CHAR for tombstones]
//! [count:     u32 LE; 0 iff tombstone]
//! [payload:   count * size(type) bytes]
//! ```
//!
//! All multi-byte integers are little-endian regardless of host, so
//! fragments move freely between backends and architectures. The absence
//! of a header lets consolidation re-encode a folded snapshot without any
//! bookkeeping.

use tessera_error::{Result, TesseraError};
use tessera_types::Datatype;

use crate::metadata::{MetadataEntry, MetadataValue};

const TOMBSTONE_CLEAR: u8 = 0;
const TOMBSTONE_SET: u8 = 1;

/// Serialize entries in order into one fragment blob.
///
/// Callers have already validated the entries at the `put` boundary; the
/// only encode-time failure is a key too long for its `u32` length field.
pub fn encode(entries: &[MetadataEntry]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for entry in entries {
        let key_len = u32::try_from(entry.key.len()).map_err(|_| {
            TesseraError::invalid_argument("metadata key longer than u32::MAX bytes")
        })?;
        match &entry.value {
            Some(value) => {
                debug_assert_eq!(value.data.len() as u64, u64::from(value.num) * value.datatype.size());
                out.push(TOMBSTONE_CLEAR);
                out.extend_from_slice(&key_len.to_le_bytes());
                out.extend_from_slice(entry.key.as_bytes());
                out.push(value.datatype.tag());
                out.extend_from_slice(&value.num.to_le_bytes());
                out.extend_from_slice(&value.data);
            }
            None => {
                out.push(TOMBSTONE_SET);
                out.extend_from_slice(&key_len.to_le_bytes());
                out.extend_from_slice(entry.key.as_bytes());
                out.push(Datatype::Char.tag());
                out.extend_from_slice(&0u32.to_le_bytes());
            }
        }
    }
    Ok(out)
}

/// Deserialize one fragment blob back into its ordered entries.
///
/// Fails `CorruptFragment` on truncation, malformed flags, unknown type
/// tags, count/tombstone contradictions, or non-UTF-8 keys. An empty blob
/// is a valid empty fragment.
pub fn decode(bytes: &[u8]) -> Result<Vec<MetadataEntry>> {
    let mut reader = Reader { bytes, pos: 0 };
    let mut entries = Vec::new();

    while !reader.is_at_end() {
        entries.push(decode_entry(&mut reader)?);
    }
    Ok(entries)
}

fn decode_entry(reader: &mut Reader<'_>) -> Result<MetadataEntry> {
    let tombstone = match reader.read_u8("tombstone flag")? {
        TOMBSTONE_CLEAR => false,
        TOMBSTONE_SET => true,
        other => {
            return Err(TesseraError::corrupt(format!(
                "tombstone flag must be 0 or 1, got {other}"
            )))
        }
    };

    let key_len = reader.read_u32_le("key length")?;
    if key_len == 0 {
        return Err(TesseraError::corrupt("zero-length key"));
    }
    let key_bytes = reader.read_bytes(key_len as usize, "key bytes")?;
    let key = std::str::from_utf8(key_bytes)
        .map_err(|_| TesseraError::corrupt("key is not valid UTF-8"))?
        .to_owned();

    let tag = reader.read_u8("type tag")?;
    let datatype = Datatype::from_tag(tag)
        .ok_or_else(|| TesseraError::corrupt(format!("unknown type tag {tag}")))?;
    let count = reader.read_u32_le("element count")?;

    if tombstone {
        if count != 0 {
            return Err(TesseraError::corrupt(format!(
                "tombstone for '{key}' carries {count} elements"
            )));
        }
        if datatype != Datatype::Char {
            return Err(TesseraError::corrupt(format!(
                "tombstone for '{key}' has type {datatype}, expected CHAR"
            )));
        }
        return Ok(MetadataEntry { key, value: None });
    }

    if count == 0 {
        return Err(TesseraError::corrupt(format!(
            "entry '{key}' has zero elements"
        )));
    }
    let payload_len = usize::try_from(u64::from(count) * datatype.size())
        .map_err(|_| TesseraError::corrupt("payload length overflows"))?;
    let data = reader.read_bytes(payload_len, "payload")?.to_vec();

    Ok(MetadataEntry {
        key,
        value: Some(MetadataValue {
            datatype,
            num: count,
            data,
        }),
    })
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn read_bytes(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).filter(|&e| e <= self.bytes.len());
        match end {
            Some(end) => {
                let slice = &self.bytes[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(TesseraError::corrupt(format!(
                "truncated fragment: {what} needs {len} bytes at offset {}, file is {}",
                self.pos,
                self.bytes.len()
            ))),
        }
    }

    fn read_u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.read_bytes(1, what)?[0])
    }

    fn read_u32_le(&mut self, what: &str) -> Result<u32> {
        let bytes = self.read_bytes(4, what)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}
