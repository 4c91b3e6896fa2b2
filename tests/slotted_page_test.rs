//! Integration tests for slotted page storage and its binary format

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strata::common::{PageId, StrataError};
use strata::storage::page::{formatter, PageMaker, SlottedPage, SlottedPageMaker};
use strata::tuple::{DataType, Schema, Tuple, TupleBuilder, Value};

const PAGE_SIZE: usize = 64;

fn create_schema() -> Arc<Schema> {
    Schema::builder()
        .column("id", DataType::Integer)
        .column("tag", DataType::Char(4))
        .build_arc()
}

fn row(schema: &Arc<Schema>, id: i32, tag: &str) -> Tuple {
    TupleBuilder::new(schema.clone()).value(id).value(tag).build()
}

#[test]
fn test_slotted_page_capacity() {
    let page = SlottedPage::new(PageId::new(0, 0), create_schema(), PAGE_SIZE);

    // 64 * 8 / (8 * 8 + 1) = 7
    assert_eq!(page.num_slots(), 7);
    assert_eq!(formatter::header_size(page.num_slots()), 1);
    assert_eq!(formatter::compute_page_capacity(4096, 8), 504);
}

#[test]
fn test_slotted_page_exact_bytes() {
    let schema = create_schema();
    let mut page = SlottedPage::new(PageId::new(0, 0), schema.clone(), PAGE_SIZE);
    page.insert_tuple_at(0, row(&schema, 1, "ab")).unwrap();
    page.insert_tuple_at(2, row(&schema, -1, "wxyz")).unwrap();

    let bytes = page.page_data();
    assert_eq!(bytes.len(), PAGE_SIZE);

    // Header: slots 0 and 2 occupied, LSB first
    assert_eq!(bytes[0], 0b0000_0101);
    // Slot 0
    assert_eq!(&bytes[1..5], &[0, 0, 0, 1]);
    assert_eq!(&bytes[5..9], b"ab\0\0");
    // Slot 1 is empty
    assert_eq!(&bytes[9..17], &[0u8; 8]);
    // Slot 2
    assert_eq!(&bytes[17..21], &[0xff, 0xff, 0xff, 0xff]);
    assert_eq!(&bytes[21..25], b"wxyz");
    // Remaining slots and padding
    assert!(bytes[25..].iter().all(|&b| b == 0));
}

#[test]
fn test_slotted_page_random_round_trip() {
    let schema = create_schema();
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for round in 0..20 {
        let page_id = PageId::new(3, round);
        let mut page = SlottedPage::new(page_id, schema.clone(), PAGE_SIZE);
        for slot in 0..page.num_slots() {
            if rng.gen_bool(0.6) {
                let len = rng.gen_range(0..=4);
                let tag: String = (0..len).map(|_| rng.gen_range(b'a'..=b'z') as char).collect();
                page.insert_tuple_at(slot, row(&schema, rng.gen(), &tag)).unwrap();
            }
        }

        let bytes = page.page_data();
        let decoded = SlottedPage::from_bytes(page_id, schema.clone(), &bytes).unwrap();

        assert_eq!(decoded.num_empty_slots(), page.num_empty_slots());
        for slot in 0..page.num_slots() {
            assert_eq!(decoded.is_slot_used(slot), page.is_slot_used(slot));
            if page.is_slot_used(slot) {
                let tuple = decoded.get_tuple(slot).unwrap();
                assert_eq!(tuple, page.get_tuple(slot).unwrap());
                assert_eq!(tuple.record_id().map(|rid| rid.slot), Some(slot));
            }
        }
        assert_eq!(decoded.page_data(), bytes);
        assert_eq!(decoded.before_image(), bytes);
    }
}

#[test]
fn test_char_whitespace_survives_round_trip() {
    let schema = create_schema();
    let page_id = PageId::new(0, 0);
    let mut page = SlottedPage::new(page_id, schema.clone(), PAGE_SIZE);
    for (slot, tag) in ["ab ", " ", "  x ", ""].into_iter().enumerate() {
        page.insert_tuple_at(slot, row(&schema, slot as i32, tag)).unwrap();
    }

    let decoded = SlottedPage::from_bytes(page_id, schema, &page.page_data()).unwrap();
    let tags: Vec<Option<&Value>> = decoded.iter().map(|t| t.value(1)).collect();
    assert_eq!(
        tags,
        vec![
            Some(&Value::from("ab ")),
            Some(&Value::from(" ")),
            Some(&Value::from("  x ")),
            Some(&Value::from("")),
        ]
    );
}

#[test]
fn test_slot_reuse_after_delete() {
    let schema = create_schema();
    let mut page = SlottedPage::new(PageId::new(0, 0), schema.clone(), PAGE_SIZE);

    for i in 0..7 {
        page.insert_tuple(row(&schema, i, "x")).unwrap();
    }
    assert_eq!(page.num_empty_slots(), 0);
    assert!(matches!(page.insert_tuple(row(&schema, 8, "x")), Err(StrataError::PageFull)));

    let mut victim = page.get_tuple(3).unwrap().clone();
    page.delete_tuple(&mut victim).unwrap();
    assert!(matches!(page.get_tuple(3), Err(StrataError::EmptySlot(3))));

    let rid = page.insert_tuple(row(&schema, 9, "y")).unwrap();
    assert_eq!(rid.slot, 3);
    assert_eq!(page.get_tuple(3).unwrap().value(0), Some(&Value::Integer(9)));
}

#[test]
fn test_page_maker() {
    let schema = create_schema();
    let maker = SlottedPageMaker::new(schema.clone(), PAGE_SIZE);

    let mut source = SlottedPage::new(PageId::new(1, 1), schema.clone(), PAGE_SIZE);
    source.insert_tuple(row(&schema, 5, "five")).unwrap();

    let page = maker.make_page(PageId::new(1, 1), &source.page_data()).unwrap();
    assert_eq!(page.page_id(), PageId::new(1, 1));
    assert_eq!(page.iter().count(), 1);

    let zeroed = maker.make_page(PageId::new(1, 2), &[0u8; PAGE_SIZE]).unwrap();
    assert_eq!(zeroed.num_empty_slots(), zeroed.num_slots());

    assert!(matches!(
        maker.make_page(PageId::new(1, 3), &[0u8; PAGE_SIZE / 2]),
        Err(StrataError::PageFormat(_))
    ));
}

#[test]
fn test_wrong_size_rejected() {
    let mut page = SlottedPage::new(PageId::new(0, 0), create_schema(), PAGE_SIZE);
    assert!(matches!(
        formatter::bytes_to_page(&[0u8; PAGE_SIZE + 1], &mut page),
        Err(StrataError::PageFormat(_))
    ));
}
