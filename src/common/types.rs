use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Page identifier - a page number within a table's file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    table_id: u32,
    page_number: u32,
}

impl PageId {
    pub fn new(table_id: u32, page_number: u32) -> Self {
        Self {
            table_id,
            page_number,
        }
    }

    pub fn table_id(&self) -> u32 {
        self.table_id
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.table_id, self.page_number)
    }
}

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Transaction identifier. Unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Allocates a fresh identifier.
    pub fn new() -> Self {
        Self(NEXT_TRANSACTION_ID.fetch_add(1, Ordering::SeqCst))
    }

    /// Rebuilds an identifier read back from the log.
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Makes sure identifiers allocated from now on are greater than `tid`.
    pub fn advance_past(tid: TransactionId) {
        NEXT_TRANSACTION_ID.fetch_max(tid.0 + 1, Ordering::SeqCst);
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T_{}", self.0)
    }
}

/// Slot index within a slotted page
pub type SlotId = usize;

/// Record identifier - combination of page ID and slot number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: SlotId,
}

impl RecordId {
    pub fn new(page_id: PageId, slot: SlotId) -> Self {
        Self { page_id, slot }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_page_id_equality_uses_both_fields() {
        assert_eq!(PageId::new(1, 2), PageId::new(1, 2));
        assert_ne!(PageId::new(1, 2), PageId::new(2, 1));

        let set: HashSet<_> = [PageId::new(1, 2), PageId::new(2, 1), PageId::new(1, 2)]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_page_id_display() {
        assert_eq!(PageId::new(3, 7).to_string(), "3-7");
    }

    #[test]
    fn test_transaction_ids_are_unique_and_increasing() {
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();
        assert_ne!(t1, t2);
        assert!(t1 < t2);
        assert_eq!(TransactionId::from_raw(t1.as_u64()), t1);
    }

    #[test]
    fn test_advance_past_skips_logged_ids() {
        let logged = TransactionId::from_raw(TransactionId::new().as_u64() + 100);
        TransactionId::advance_past(logged);
        assert!(TransactionId::new() > logged);

        // Never moves backwards
        TransactionId::advance_past(TransactionId::from_raw(1));
        assert!(TransactionId::new() > logged);
    }
}
