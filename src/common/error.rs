use thiserror::Error;

use super::types::{PageId, SlotId, TransactionId};

/// Storage engine error types
#[derive(Error, Debug)]
pub enum StrataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transaction {0} aborted")]
    TransactionAborted(TransactionId),

    #[error("Buffer pool is full, no evictable frames available")]
    BufferPoolFull,

    #[error("Page {0} is not in the buffer pool")]
    PageNotResident(PageId),

    #[error("Page {0} is not pinned")]
    PageNotPinned(PageId),

    #[error("Transaction {tid} does not hold a lock on page {page_id}")]
    LockNotHeld { tid: TransactionId, page_id: PageId },

    #[error("Tuple schema does not match the page schema")]
    SchemaMismatch,

    #[error("Slot {0} is already occupied")]
    SlotOccupied(SlotId),

    #[error("Slot {0} is empty")]
    EmptySlot(SlotId),

    #[error("Invalid slot: {0}")]
    InvalidSlot(SlotId),

    #[error("Page is full")]
    PageFull,

    #[error("Tuple is not stored on page {0}")]
    TupleNotOnPage(PageId),

    #[error("Tuple has no record id")]
    MissingRecordId,

    #[error("Malformed page data: {0}")]
    PageFormat(String),

    #[error("Log corrupted: {0}")]
    LogCorrupted(String),

    #[error("Cannot roll back committed transaction {0}")]
    RollbackCommitted(TransactionId),
}

pub type Result<T> = std::result::Result<T, StrataError>;
