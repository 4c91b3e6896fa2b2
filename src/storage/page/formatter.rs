//! Translation between a [`SlottedPage`] and its on-disk bytes.
//!
//! Page layout:
//!
//! ```text
//! +---------------------+--------------------------------+-----------------+
//! | Header              | Payload                        | Padding         |
//! | ceil(slots/8) bytes | slots * record_size bytes      | zero bytes      |
//! +---------------------+--------------------------------+-----------------+
//! ```
//!
//! The header is an occupancy bitmap. Slot `i` lives in byte `i / 8` at bit
//! `i % 8`, with bit 0 being the least significant, so the first header byte
//! covers slots `7,6,5,4,3,2,1,0` reading from the high bit down. A set bit
//! means the slot is occupied.
//!
//! The payload holds the records in slot order. An occupied slot holds the
//! record's fields in schema order; an empty slot is `record_size` zero bytes.

use crate::common::{Result, StrataError};
use crate::tuple::Tuple;

use super::SlottedPage;

/// Number of records that fit on a page.
///
/// Each record needs `record_size * 8` bits of payload plus one header bit.
pub fn compute_page_capacity(page_size: usize, record_size: usize) -> usize {
    (page_size * 8) / (record_size * 8 + 1)
}

/// Size of the occupancy bitmap for the given number of slots.
pub fn header_size(num_slots: usize) -> usize {
    (num_slots + 7) / 8
}

/// Checks whether a slot is marked used in the header.
pub fn is_slot_used(slot: usize, header: &[u8]) -> bool {
    match header.get(slot / 8) {
        Some(byte) => byte & (1 << (slot % 8)) != 0,
        None => false,
    }
}

/// Marks a slot in the header as used or empty.
pub fn mark_slot(slot: usize, header: &mut [u8], used: bool) {
    if let Some(byte) = header.get_mut(slot / 8) {
        let mask = 1u8 << (slot % 8);
        if used {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
    }
}

/// Writes the page out as exactly `page.page_size()` bytes.
pub fn page_to_bytes(page: &SlottedPage) -> Vec<u8> {
    let num_slots = page.num_slots();
    let record_size = page.schema().record_size();
    let header_len = header_size(num_slots);

    let mut bytes = vec![0u8; header_len];
    for slot in 0..num_slots {
        mark_slot(slot, &mut bytes, page.is_slot_used(slot));
    }

    for slot in 0..num_slots {
        let encoded = page.tuple_at(slot).and_then(Tuple::to_bytes);
        match encoded {
            Some(record) => bytes.extend_from_slice(&record),
            // insert_tuple_at only stores conforming tuples
            None => bytes.resize(bytes.len() + record_size, 0),
        }
    }

    bytes.resize(page.page_size(), 0);
    bytes
}

/// Populates an empty page from its on-disk bytes.
pub fn bytes_to_page(data: &[u8], page: &mut SlottedPage) -> Result<()> {
    if data.len() != page.page_size() {
        return Err(StrataError::PageFormat(format!(
            "expected {} bytes, got {}",
            page.page_size(),
            data.len()
        )));
    }

    let num_slots = page.num_slots();
    let record_size = page.schema().record_size();
    let header_len = header_size(num_slots);
    let (header, payload) = data.split_at(header_len);

    for slot in 0..num_slots {
        if !is_slot_used(slot, header) {
            continue;
        }
        let start = slot * record_size;
        let tuple = Tuple::from_bytes(page.schema().clone(), &payload[start..start + record_size])
            .ok_or_else(|| StrataError::PageFormat(format!("undecodable record in slot {}", slot)))?;
        page.insert_tuple_at(slot, tuple)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity() {
        // 4096 * 8 / (8 * 8 + 1) = 504
        assert_eq!(compute_page_capacity(4096, 8), 504);
        assert_eq!(compute_page_capacity(4096, 4), 992);
        assert_eq!(compute_page_capacity(16, 100), 0);
    }

    #[test]
    fn test_header_size() {
        assert_eq!(header_size(0), 0);
        assert_eq!(header_size(1), 1);
        assert_eq!(header_size(8), 1);
        assert_eq!(header_size(9), 2);
        assert_eq!(header_size(504), 63);
    }

    #[test]
    fn test_bit_order_is_lsb_first() {
        let mut header = [0u8; 2];
        for slot in [1, 2, 4, 7] {
            mark_slot(slot, &mut header, true);
        }
        assert_eq!(header[0], 0b1001_0110);

        mark_slot(8, &mut header, true);
        assert_eq!(header[1], 0b0000_0001);

        mark_slot(2, &mut header, false);
        assert_eq!(header[0], 0b1001_0010);
        assert!(is_slot_used(1, &header));
        assert!(!is_slot_used(2, &header));
        assert!(!is_slot_used(16, &header));
    }

    #[test]
    fn test_mark_slot_is_idempotent() {
        let mut header = [0u8; 1];
        mark_slot(3, &mut header, true);
        mark_slot(3, &mut header, true);
        assert_eq!(header[0], 0b0000_1000);
        mark_slot(5, &mut header, false);
        assert_eq!(header[0], 0b0000_1000);
    }
}
