//! Integration tests for tuples stored through the buffer pool

use std::sync::Arc;

use strata::buffer::BufferPoolManager;
use strata::common::PageId;
use strata::storage::disk::DiskManager;
use strata::storage::page::SlottedPageMaker;
use strata::tuple::{DataType, Schema, Tuple, TupleBuilder, Value};
use tempfile::TempDir;

const PAGE_SIZE: usize = 512;

fn create_bpm(pool_size: usize) -> (BufferPoolManager, TempDir) {
    let dir = TempDir::new().unwrap();
    let dm = Arc::new(DiskManager::new(dir.path(), PAGE_SIZE).unwrap());
    (BufferPoolManager::new(pool_size, dm), dir)
}

fn create_user_schema() -> Arc<Schema> {
    Schema::builder()
        .column("id", DataType::Integer)
        .column("name", DataType::Char(12))
        .column("age", DataType::SmallInt)
        .column("active", DataType::Boolean)
        .build_arc()
}

fn user(schema: &Arc<Schema>, id: i32, name: &str, age: i16, active: bool) -> Tuple {
    TupleBuilder::new(schema.clone())
        .value(id)
        .value(name)
        .value(age)
        .value(active)
        .build()
}

#[test]
fn test_tuple_page_disk_roundtrip() {
    let (bpm, _dir) = create_bpm(2);
    let schema = create_user_schema();
    let maker = SlottedPageMaker::new(schema.clone(), PAGE_SIZE);
    let page_id = PageId::new(7, 0);

    let rid = {
        let page = bpm.pin_page(page_id, &maker).unwrap();
        let rid = page
            .write()
            .insert_tuple(user(&schema, 1, "Alice", 30, true))
            .unwrap();
        bpm.unpin_page(page_id, true).unwrap();
        rid
    };
    bpm.flush_page(page_id).unwrap();
    bpm.discard_page(page_id);

    let page = bpm.pin_page(page_id, &maker).unwrap();
    let page = page.read();
    let stored = page.get_tuple(rid.slot).unwrap();

    assert_eq!(stored, &user(&schema, 1, "Alice", 30, true));
    assert_eq!(stored.value(1), Some(&Value::String("Alice".into())));
    assert_eq!(stored.record_id(), Some(rid));
}

#[test]
fn test_multiple_tuples_in_page() {
    let (bpm, _dir) = create_bpm(2);
    let schema = create_user_schema();
    let maker = SlottedPageMaker::new(schema.clone(), PAGE_SIZE);
    let page_id = PageId::new(7, 0);

    let page = bpm.pin_page(page_id, &maker).unwrap();
    {
        let mut page = page.write();
        for i in 0..20 {
            page.insert_tuple(user(&schema, i, &format!("user{}", i), 20 + i as i16, i % 2 == 0))
                .unwrap();
        }
    }
    bpm.unpin_page(page_id, true).unwrap();

    let page = page.read();
    let ids: Vec<Value> = page.iter().map(|t| t.value(0).cloned().unwrap()).collect();
    assert_eq!(ids, (0..20).map(Value::Integer).collect::<Vec<_>>());
    assert_eq!(page.get_tuple(5).unwrap().value(1), Some(&Value::String("user5".into())));
}

#[test]
fn test_all_data_types() {
    let schema = Schema::builder()
        .column("bool_col", DataType::Boolean)
        .column("tinyint_col", DataType::TinyInt)
        .column("smallint_col", DataType::SmallInt)
        .column("int_col", DataType::Integer)
        .column("bigint_col", DataType::BigInt)
        .column("float_col", DataType::Float)
        .column("double_col", DataType::Double)
        .column("char_col", DataType::Char(5))
        .column("ts_col", DataType::Timestamp)
        .build_arc();
    assert_eq!(schema.record_size(), 1 + 1 + 2 + 4 + 8 + 4 + 8 + 5 + 8);

    let tuple = TupleBuilder::new(schema.clone())
        .value(true)
        .value(-8i8)
        .value(1234i16)
        .value(-99_999i32)
        .value(1i64 << 40)
        .value(2.5f32)
        .value(-0.125f64)
        .value("hey")
        .value(Value::Timestamp(1_700_000_000_000_000))
        .build();

    let bytes = tuple.to_bytes().unwrap();
    assert_eq!(bytes.len(), schema.record_size());
    // Integers are big-endian and chars are NUL padded
    assert_eq!(&bytes[4..8], &(-99_999i32).to_be_bytes());
    assert_eq!(&bytes[28..33], b"hey\0\0");

    let decoded = Tuple::from_bytes(schema, &bytes).unwrap();
    assert_eq!(decoded, tuple);
}

#[test]
fn test_schema_equality_ignores_names() {
    let a = Schema::builder()
        .column("id", DataType::Integer)
        .column("name", DataType::Char(8))
        .build();
    let b = Schema::builder()
        .column("key", DataType::Integer)
        .column("label", DataType::Char(8))
        .build();
    let c = Schema::builder()
        .column("id", DataType::Integer)
        .column("name", DataType::Char(9))
        .build();

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.to_string(), "id(INTEGER), name(CHAR(8))");
}

#[test]
fn test_nonconforming_tuple_rejected() {
    let schema = create_user_schema();
    let too_long = user(&schema, 1, "a name that is far too long", 1, false);

    assert!(!too_long.conforms());
    assert!(too_long.to_bytes().is_none());
}

#[test]
fn test_tuple_display() {
    let schema = create_user_schema();
    assert_eq!(user(&schema, 3, "Carol", 41, false).to_string(), "3\tCarol\t41\tfalse");
}
