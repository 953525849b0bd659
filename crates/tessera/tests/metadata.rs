//! End-to-end tests for the array metadata lifecycle.
//!
//! Each test drives the public surface the way an embedding application
//! would: allocate a handle, open sessions, mutate, close, reopen, and
//! consolidate. Most run on the in-memory backend; the basic round-trip
//! also runs against a real directory to exercise the POSIX publish path.

use tessera::{
    consolidate_metadata, consolidate_metadata_with_key, Array, Datatype, EncryptionType,
    MemoryVfs, PosixVfs, QueryType, TesseraError, Vfs,
};

const KEY: &[u8] = b"0123456789abcdeF0123456789abcdeF";

fn float_pair(a: f32, b: f32) -> Vec<u8> {
    [a.to_le_bytes(), b.to_le_bytes()].concat()
}

// ─── Scenario: errors on closed or wrong-mode arrays ─────────────────────

#[test]
fn basic_errors() {
    let vfs = MemoryVfs::new();
    let mut array = Array::new(vfs.clone(), "/arrays/errors");
    let v = 5i32.to_le_bytes();

    // Put on an array that is not opened.
    assert!(matches!(
        array.put_metadata("key", Datatype::Int32, 1, &v),
        Err(TesseraError::InvalidMode { .. })
    ));

    // Put on an array opened for reading.
    array.open(QueryType::Read).unwrap();
    assert!(matches!(
        array.put_metadata("key", Datatype::Int32, 1, &v),
        Err(TesseraError::InvalidMode { .. })
    ));
    array.close().unwrap();

    array.open(QueryType::Write).unwrap();

    // Empty key.
    assert!(matches!(
        array.put_metadata("", Datatype::Int32, 1, &v),
        Err(TesseraError::InvalidArgument { .. })
    ));
    // Missing value bytes.
    assert!(matches!(
        array.put_metadata("key", Datatype::Int32, 1, &[]),
        Err(TesseraError::InvalidArgument { .. })
    ));
    // Zero values.
    assert!(matches!(
        array.put_metadata("key", Datatype::Int32, 0, &v),
        Err(TesseraError::InvalidArgument { .. })
    ));
    // The ANY sentinel.
    assert!(matches!(
        array.put_metadata("key", Datatype::Any, 1, &v),
        Err(TesseraError::InvalidArgument { .. })
    ));
    // A correct item.
    array.put_metadata("key", Datatype::Int32, 1, &v).unwrap();
    array.close().unwrap();

    // Opening an unencrypted array with a key fails.
    assert!(matches!(
        array.open_with_key(QueryType::Read, EncryptionType::Aes256Gcm, KEY),
        Err(TesseraError::EncryptionMismatch { .. })
    ));
}

// ─── Scenario: basic write/read ──────────────────────────────────────────

fn write_read_roundtrip<V: Vfs>(vfs: V, uri: &str) {
    let mut array = Array::new(vfs, uri);

    array.open(QueryType::Write).unwrap();
    array
        .put_metadata("aaa", Datatype::Int32, 1, &5i32.to_le_bytes())
        .unwrap();
    array
        .put_metadata("bb", Datatype::Float32, 2, &float_pair(1.1, 1.2))
        .unwrap();
    array.close().unwrap();

    array.open(QueryType::Read).unwrap();

    let value = array.get_metadata("aaa").unwrap().unwrap();
    assert_eq!(value.datatype, Datatype::Int32);
    assert_eq!(value.num, 1);
    assert_eq!(value.data, 5i32.to_le_bytes());

    let value = array.get_metadata("bb").unwrap().unwrap();
    assert_eq!(value.datatype, Datatype::Float32);
    assert_eq!(value.num, 2);
    assert_eq!(value.data, float_pair(1.1, 1.2));

    assert_eq!(array.get_metadata("foo").unwrap(), None);
    assert_eq!(array.metadata_num().unwrap(), 2);

    let (key, value) = array.metadata_from_index(1).unwrap();
    assert_eq!(key, "bb");
    assert_eq!(value.num, 2);

    assert!(matches!(
        array.metadata_from_index(10),
        Err(TesseraError::OutOfRange { .. })
    ));
    array.close().unwrap();
}

#[test]
fn write_read_on_memory_backend() {
    write_read_roundtrip(MemoryVfs::new(), "/arrays/rw");
}

#[test]
fn write_read_on_posix_backend() {
    let root = tempfile::tempdir().unwrap();
    let uri = root.path().join("rw_array");
    write_read_roundtrip(PosixVfs::new(), uri.to_str().unwrap());
}

// ─── Scenario: UTF-8 keys ────────────────────────────────────────────────

#[test]
fn utf8_keys_roundtrip_exactly() {
    let vfs = MemoryVfs::new();
    let mut array = Array::new(vfs, "/arrays/utf8");

    array.open(QueryType::Write).unwrap();
    // "≥" is three bytes of UTF-8.
    array
        .put_metadata("≥", Datatype::Int32, 1, &5i32.to_le_bytes())
        .unwrap();
    array.close().unwrap();

    array.open(QueryType::Read).unwrap();
    let value = array.get_metadata("≥").unwrap().unwrap();
    assert_eq!(value.data, 5i32.to_le_bytes());

    let (key, value) = array.metadata_from_index(0).unwrap();
    assert_eq!(key, "≥");
    assert_eq!(key.len(), 3);
    assert_eq!(value.data, 5i32.to_le_bytes());
    array.close().unwrap();
}

// ─── Scenario: delete and ghost delete ───────────────────────────────────

#[test]
fn delete_and_ghost_delete() {
    let vfs = MemoryVfs::new();
    let mut array = Array::new(vfs, "/arrays/delete");

    array.open(QueryType::Write).unwrap();
    array
        .put_metadata("aaa", Datatype::Int32, 1, &5i32.to_le_bytes())
        .unwrap();
    array
        .put_metadata("bb", Datatype::Float32, 2, &float_pair(1.1, 1.2))
        .unwrap();
    array.close().unwrap();

    // A later session deletes one key that exists and one that never did.
    array.open(QueryType::Write).unwrap();
    array.delete_metadata("aaa").unwrap();
    array.delete_metadata("foo").unwrap();
    array.close().unwrap();

    array.open(QueryType::Read).unwrap();
    assert_eq!(array.get_metadata("aaa").unwrap(), None);
    assert_eq!(array.get_metadata("foo").unwrap(), None);
    let value = array.get_metadata("bb").unwrap().unwrap();
    assert_eq!(value.data, float_pair(1.1, 1.2));
    assert_eq!(array.metadata_num().unwrap(), 1);

    let (key, _) = array.metadata_from_index(0).unwrap();
    assert_eq!(key, "bb");
    array.close().unwrap();
}

// ─── Scenario: consolidation ─────────────────────────────────────────────

#[test]
fn multiple_fragments_and_consolidation() {
    let vfs = MemoryVfs::new();
    let uri = "/arrays/consolidate";
    let mut array = Array::new(vfs.clone(), uri);

    array.open(QueryType::Write).unwrap();
    array
        .put_metadata("aaa", Datatype::Int32, 1, &5i32.to_le_bytes())
        .unwrap();
    array
        .put_metadata("bb", Datatype::Float32, 2, &float_pair(1.1, 1.2))
        .unwrap();
    array.close().unwrap();

    array.open(QueryType::Write).unwrap();
    array.delete_metadata("aaa").unwrap();
    array
        .put_metadata("cccc", Datatype::Int32, 1, &10i32.to_le_bytes())
        .unwrap();
    array.close().unwrap();

    array.open(QueryType::Read).unwrap();
    assert_eq!(array.metadata_num().unwrap(), 2);
    assert_eq!(array.get_metadata("aaa").unwrap(), None);
    assert_eq!(
        array.get_metadata("cccc").unwrap().unwrap().data,
        10i32.to_le_bytes()
    );
    array.close().unwrap();

    consolidate_metadata(&vfs, uri.as_ref()).unwrap();

    array.open(QueryType::Read).unwrap();
    assert_eq!(array.metadata_num().unwrap(), 2);
    array.close().unwrap();

    // Write once more, consolidate again.
    array.open(QueryType::Write).unwrap();
    array
        .put_metadata("d", Datatype::Int32, 1, &50i32.to_le_bytes())
        .unwrap();
    array.close().unwrap();

    consolidate_metadata(&vfs, uri.as_ref()).unwrap();

    array.open(QueryType::Read).unwrap();
    assert_eq!(array.metadata_num().unwrap(), 3);
    assert_eq!(
        array.get_metadata("cccc").unwrap().unwrap().data,
        10i32.to_le_bytes()
    );
    assert_eq!(
        array.get_metadata("d").unwrap().unwrap().data,
        50i32.to_le_bytes()
    );
    array.close().unwrap();

    // Exactly one fragment remains on disk.
    let names = vfs
        .list_dir(&std::path::Path::new(uri).join(tessera::METADATA_DIR))
        .unwrap();
    assert_eq!(names.len(), 1);
}

// ─── Scenario: open at a timestamp, and reopen ───────────────────────────

#[test]
fn open_at_travels_back_in_time() {
    let vfs = MemoryVfs::new();
    let mut array = Array::new(vfs, "/arrays/open_at");

    array.open(QueryType::Write).unwrap();
    array
        .put_metadata("aaa", Datatype::Int32, 1, &5i32.to_le_bytes())
        .unwrap();
    array.close().unwrap();

    let before_delete = tessera::clock::now_ms();

    array.open(QueryType::Write).unwrap();
    array.delete_metadata("aaa").unwrap();
    array.close().unwrap();

    array.open_at(QueryType::Read, before_delete).unwrap();
    let value = array.get_metadata("aaa").unwrap().unwrap();
    assert_eq!(value.data, 5i32.to_le_bytes());
    assert_eq!(array.metadata_num().unwrap(), 1);
    array.close().unwrap();
}

#[test]
fn reopen_refreshes_a_time_traveling_reader() {
    let vfs = MemoryVfs::new();
    let mut array = Array::new(vfs, "/arrays/reopen");

    array.open(QueryType::Write).unwrap();
    array
        .put_metadata("aaa", Datatype::Int32, 1, &5i32.to_le_bytes())
        .unwrap();
    array
        .put_metadata("bb", Datatype::Float32, 2, &float_pair(1.1, 1.2))
        .unwrap();
    array.close().unwrap();

    let timestamp = tessera::clock::now_ms();

    array.open(QueryType::Write).unwrap();
    array.delete_metadata("aaa").unwrap();
    array.close().unwrap();

    array.open_at(QueryType::Read, timestamp).unwrap();
    assert_eq!(array.metadata_num().unwrap(), 2);
    assert!(array.get_metadata("aaa").unwrap().is_some());

    array.reopen().unwrap();
    assert_eq!(array.get_metadata("aaa").unwrap(), None);
    assert_eq!(array.metadata_num().unwrap(), 1);
    array.close().unwrap();
}

// ─── Scenario: encryption ────────────────────────────────────────────────

#[test]
fn encryption_end_to_end() {
    let vfs = MemoryVfs::new();
    let uri = "/arrays/encrypted";
    let mut array = Array::new(vfs.clone(), uri);

    array
        .open_with_key(QueryType::Write, EncryptionType::Aes256Gcm, KEY)
        .unwrap();
    array
        .put_metadata("aaa", Datatype::Int32, 1, &5i32.to_le_bytes())
        .unwrap();
    array
        .put_metadata("bb", Datatype::Float32, 2, &float_pair(1.1, 1.2))
        .unwrap();
    array.close().unwrap();

    array
        .open_with_key(QueryType::Write, EncryptionType::Aes256Gcm, KEY)
        .unwrap();
    array.delete_metadata("aaa").unwrap();
    array
        .put_metadata("cccc", Datatype::Int32, 1, &10i32.to_le_bytes())
        .unwrap();
    array.close().unwrap();

    // Without the key the array does not open.
    assert!(matches!(
        array.open(QueryType::Read),
        Err(TesseraError::EncryptionMismatch { .. })
    ));

    // With the wrong key it does not open either.
    let wrong: Vec<u8> = KEY.iter().map(|b| b ^ 0xff).collect();
    assert!(matches!(
        array.open_with_key(QueryType::Read, EncryptionType::Aes256Gcm, &wrong),
        Err(TesseraError::EncryptionMismatch { .. })
    ));

    // Wrong key length is rejected up front.
    assert!(matches!(
        array.open_with_key(QueryType::Read, EncryptionType::Aes256Gcm, b"short"),
        Err(TesseraError::InvalidArgument { .. })
    ));

    array
        .open_with_key(QueryType::Read, EncryptionType::Aes256Gcm, KEY)
        .unwrap();
    assert_eq!(array.metadata_num().unwrap(), 2);
    assert_eq!(array.get_metadata("aaa").unwrap(), None);
    assert_eq!(
        array.get_metadata("bb").unwrap().unwrap().data,
        float_pair(1.1, 1.2)
    );
    assert_eq!(
        array.get_metadata("cccc").unwrap().unwrap().data,
        10i32.to_le_bytes()
    );
    let (key, _) = array.metadata_from_index(0).unwrap();
    assert_eq!(key, "bb");
    array.close().unwrap();

    // Consolidate without the key: error. With it: one fragment.
    assert!(matches!(
        consolidate_metadata(&vfs, uri.as_ref()),
        Err(TesseraError::EncryptionMismatch { .. })
    ));
    consolidate_metadata_with_key(&vfs, uri.as_ref(), EncryptionType::Aes256Gcm, KEY).unwrap();

    array
        .open_with_key(QueryType::Read, EncryptionType::Aes256Gcm, KEY)
        .unwrap();
    assert_eq!(array.metadata_num().unwrap(), 2);
    array.close().unwrap();

    // Write once more and consolidate again.
    array
        .open_with_key(QueryType::Write, EncryptionType::Aes256Gcm, KEY)
        .unwrap();
    array
        .put_metadata("d", Datatype::Int32, 1, &50i32.to_le_bytes())
        .unwrap();
    array.close().unwrap();

    consolidate_metadata_with_key(&vfs, uri.as_ref(), EncryptionType::Aes256Gcm, KEY).unwrap();

    array
        .open_with_key(QueryType::Read, EncryptionType::Aes256Gcm, KEY)
        .unwrap();
    assert_eq!(array.metadata_num().unwrap(), 3);
    assert_eq!(
        array.get_metadata("cccc").unwrap().unwrap().data,
        10i32.to_le_bytes()
    );
    assert_eq!(
        array.get_metadata("d").unwrap().unwrap().data,
        50i32.to_le_bytes()
    );
    array.close().unwrap();
}

// ─── Scenario: overwrite, within and across sessions ─────────────────────

#[test]
fn overwrite_last_wins() {
    let vfs = MemoryVfs::new();
    let mut array = Array::new(vfs, "/arrays/overwrite");

    array.open(QueryType::Write).unwrap();
    array
        .put_metadata("aaa", Datatype::Int32, 1, &5i32.to_le_bytes())
        .unwrap();
    array
        .put_metadata("aaa", Datatype::Int32, 1, &10i32.to_le_bytes())
        .unwrap();
    array.close().unwrap();

    array.open(QueryType::Read).unwrap();
    assert_eq!(
        array.get_metadata("aaa").unwrap().unwrap().data,
        10i32.to_le_bytes()
    );
    array.close().unwrap();

    // A later session overwrites again; no sleeps are needed for ordering.
    array.open(QueryType::Write).unwrap();
    array
        .put_metadata("aaa", Datatype::Int32, 1, &20i32.to_le_bytes())
        .unwrap();
    array.close().unwrap();

    array.open(QueryType::Read).unwrap();
    assert_eq!(
        array.get_metadata("aaa").unwrap().unwrap().data,
        20i32.to_le_bytes()
    );
    assert_eq!(array.metadata_num().unwrap(), 1);
    array.close().unwrap();
}
