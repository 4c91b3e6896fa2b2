//! Integration tests for the buffer pool manager

use std::sync::Arc;
use std::thread;

use strata::buffer::{BufferPoolManager, PageRef};
use strata::common::{PageId, StrataError};
use strata::storage::disk::DiskManager;
use strata::storage::page::SlottedPageMaker;
use strata::tuple::{DataType, Schema, TupleBuilder, Value};
use tempfile::TempDir;

const PAGE_SIZE: usize = 64;

fn create_bpm(pool_size: usize) -> (BufferPoolManager, SlottedPageMaker, TempDir) {
    let dir = TempDir::new().unwrap();
    let dm = Arc::new(DiskManager::new(dir.path(), PAGE_SIZE).unwrap());
    let schema = Schema::builder().column("v", DataType::Integer).build_arc();
    let maker = SlottedPageMaker::new(schema, PAGE_SIZE);
    (BufferPoolManager::new(pool_size, dm), maker, dir)
}

fn pid(n: u32) -> PageId {
    PageId::new(1, n)
}

fn insert(page: &PageRef, v: i32) {
    let mut page = page.write();
    let tuple = TupleBuilder::new(page.schema().clone()).value(v).build();
    page.insert_tuple(tuple).unwrap();
}

fn values(page: &PageRef) -> Vec<Value> {
    page.read().iter().map(|t| t.value(0).cloned().unwrap()).collect()
}

#[test]
fn test_lru_victim_is_least_recently_used() {
    let (bpm, maker, _dir) = create_bpm(2);
    let (a, b, c) = (pid(0), pid(1), pid(2));

    bpm.pin_page(a, &maker).unwrap();
    bpm.pin_page(b, &maker).unwrap();
    bpm.unpin_page(a, false).unwrap();
    bpm.unpin_page(b, false).unwrap();

    // Touch B again so A becomes the least recently used
    bpm.pin_page(b, &maker).unwrap();
    bpm.unpin_page(b, false).unwrap();

    bpm.pin_page(c, &maker).unwrap();
    assert!(!bpm.in_buffer_pool(a));
    assert!(bpm.in_buffer_pool(b));
    assert!(bpm.in_buffer_pool(c));
}

#[test]
fn test_unpin_counts_as_use() {
    let (bpm, maker, _dir) = create_bpm(2);
    let (a, b, c) = (pid(0), pid(1), pid(2));

    bpm.pin_page(a, &maker).unwrap();
    bpm.pin_page(b, &maker).unwrap();
    bpm.unpin_page(b, false).unwrap();
    bpm.unpin_page(a, false).unwrap();

    bpm.pin_page(c, &maker).unwrap();
    assert!(bpm.in_buffer_pool(a));
    assert!(!bpm.in_buffer_pool(b));
}

#[test]
fn test_pinned_pages_are_never_evicted() {
    let (bpm, maker, _dir) = create_bpm(3);

    for i in 0..3 {
        bpm.pin_page(pid(i), &maker).unwrap();
    }
    assert!(matches!(bpm.pin_page(pid(3), &maker), Err(StrataError::BufferPoolFull)));

    bpm.unpin_page(pid(1), false).unwrap();
    bpm.pin_page(pid(3), &maker).unwrap();
    assert!(!bpm.in_buffer_pool(pid(1)));
    assert_eq!(bpm.get_pin_count(pid(0)), Some(1));
    assert_eq!(bpm.get_pin_count(pid(2)), Some(1));
}

#[test]
fn test_pin_count_never_negative() {
    let (bpm, maker, _dir) = create_bpm(2);

    bpm.pin_page(pid(0), &maker).unwrap();
    bpm.unpin_page(pid(0), false).unwrap();
    assert!(matches!(bpm.unpin_page(pid(0), false), Err(StrataError::PageNotPinned(_))));
    assert!(matches!(bpm.unpin_page(pid(0), true), Err(StrataError::PageNotPinned(_))));
    assert_eq!(bpm.get_pin_count(pid(0)), Some(0));
    assert!(!bpm.is_dirty(pid(0)));

    assert!(matches!(bpm.unpin_page(pid(9), false), Err(StrataError::PageNotResident(_))));
}

#[test]
fn test_dirty_page_survives_eviction_when_allowed() {
    let (bpm, maker, _dir) = create_bpm(2);
    bpm.set_evict_dirty(true);

    let page = bpm.pin_page(pid(0), &maker).unwrap();
    insert(&page, 42);
    bpm.unpin_page(pid(0), true).unwrap();
    drop(page);

    bpm.pin_page(pid(1), &maker).unwrap();
    bpm.pin_page(pid(2), &maker).unwrap();
    assert!(!bpm.in_buffer_pool(pid(0)));

    bpm.unpin_page(pid(1), false).unwrap();
    let page = bpm.pin_page(pid(0), &maker).unwrap();
    assert_eq!(values(&page), vec![Value::Integer(42)]);
}

#[test]
fn test_dirty_pages_skipped_by_default() {
    let (bpm, maker, _dir) = create_bpm(2);

    bpm.pin_page(pid(0), &maker).unwrap();
    bpm.unpin_page(pid(0), true).unwrap();
    bpm.pin_page(pid(1), &maker).unwrap();
    bpm.unpin_page(pid(1), false).unwrap();

    // The clean page goes even though the dirty one is older
    bpm.pin_page(pid(2), &maker).unwrap();
    assert!(bpm.in_buffer_pool(pid(0)));
    assert!(!bpm.in_buffer_pool(pid(1)));

    assert!(matches!(bpm.pin_page(pid(3), &maker), Err(StrataError::BufferPoolFull)));
}

#[test]
fn test_flush_all_writes_dirty_pages() {
    let (bpm, maker, _dir) = create_bpm(4);

    for i in 0..4 {
        let page = bpm.pin_page(pid(i), &maker).unwrap();
        insert(&page, i as i32);
        bpm.unpin_page(pid(i), i % 2 == 0).unwrap();
    }
    bpm.flush_all_pages().unwrap();

    assert_eq!(bpm.disk_manager().get_num_writes(), 2);
    for i in 0..4 {
        assert!(!bpm.is_dirty(pid(i)));
    }
    assert_ne!(bpm.disk_manager().read_page(pid(0)).unwrap(), vec![0u8; PAGE_SIZE]);
    assert_eq!(bpm.disk_manager().read_page(pid(1)).unwrap(), vec![0u8; PAGE_SIZE]);
}

#[test]
fn test_discard_forgets_changes() {
    let (bpm, maker, _dir) = create_bpm(2);

    let page = bpm.pin_page(pid(0), &maker).unwrap();
    insert(&page, 1);
    bpm.unpin_page(pid(0), true).unwrap();
    bpm.flush_page(pid(0)).unwrap();

    insert(&page, 2);
    bpm.discard_page(pid(0));
    drop(page);

    let page = bpm.pin_page(pid(0), &maker).unwrap();
    assert_eq!(values(&page), vec![Value::Integer(1)]);
}

#[test]
fn test_allocate_page_writes_empty_page() {
    let (bpm, maker, _dir) = create_bpm(2);

    bpm.allocate_page(pid(0)).unwrap();
    bpm.allocate_page(pid(1)).unwrap();
    assert_eq!(bpm.disk_manager().num_pages(1).unwrap(), 2);

    let page = bpm.pin_page(pid(1), &maker).unwrap();
    let page = page.read();
    assert_eq!(page.num_empty_slots(), page.num_slots());
}

#[test]
fn test_concurrent_pins() {
    let (bpm, maker, _dir) = create_bpm(8);
    let bpm = Arc::new(bpm);
    let maker = Arc::new(maker);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let bpm = Arc::clone(&bpm);
            let maker = Arc::clone(&maker);
            thread::spawn(move || {
                for round in 0..50 {
                    let page_id = pid(round % 8);
                    bpm.pin_page(page_id, maker.as_ref()).unwrap();
                    bpm.unpin_page(page_id, false).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(bpm.resident_count(), 8);
    for i in 0..8 {
        assert_eq!(bpm.get_pin_count(pid(i)), Some(0));
    }
}
