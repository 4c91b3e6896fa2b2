use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::access::AccessManager;
use crate::common::{PageId, RecordId, Result, StrataError, TransactionId};
use crate::concurrency::LockMode;
use crate::tuple::{Schema, Tuple};

use super::page::SlottedPageMaker;

/// An unordered collection of tuples stored in the slotted pages of one table.
///
/// All page access goes through the [`AccessManager`], so reads take shared
/// locks and modifications take exclusive locks held until the transaction
/// completes.
pub struct HeapFile {
    table_id: u32,
    maker: SlottedPageMaker,
    num_pages: AtomicU32,
    /// Serializes page allocation
    allocation: Mutex<()>,
    access: Arc<AccessManager>,
}

impl HeapFile {
    /// Opens the heap file for `table_id`, sizing it from the pages already on disk.
    pub fn open(access: Arc<AccessManager>, table_id: u32, schema: Arc<Schema>) -> Result<Self> {
        let disk = access.pool().disk_manager();
        let page_size = disk.page_size();
        let num_pages = disk.num_pages(table_id)?;
        Ok(Self {
            table_id,
            maker: SlottedPageMaker::new(schema, page_size),
            num_pages: AtomicU32::new(num_pages),
            allocation: Mutex::new(()),
            access,
        })
    }

    pub fn table_id(&self) -> u32 {
        self.table_id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        self.maker.schema()
    }

    pub fn page_size(&self) -> usize {
        self.maker.page_size()
    }

    pub fn num_pages(&self) -> u32 {
        self.num_pages.load(Ordering::SeqCst)
    }

    /// Inserts a tuple into the first page with a free slot, allocating a
    /// new page when every page is full.
    pub fn insert_tuple(&self, tid: TransactionId, tuple: Tuple) -> Result<RecordId> {
        if **tuple.schema() != **self.schema() {
            return Err(StrataError::SchemaMismatch);
        }

        for page_number in 0..self.num_pages() {
            let page_id = PageId::new(self.table_id, page_number);
            let already_held = self.access.holds_lock(tid, page_id, LockMode::Shared);

            self.access.acquire_lock(tid, page_id, LockMode::Shared)?;
            let page = self.access.pin_page(tid, page_id, &self.maker)?;
            let has_room = page.read().num_empty_slots() > 0;

            if has_room {
                if let Err(e) = self.access.acquire_lock(tid, page_id, LockMode::Exclusive) {
                    self.access.unpin_page(tid, page_id, false)?;
                    return Err(e);
                }
                let inserted = page.write().insert_tuple(tuple);
                self.access.unpin_page(tid, page_id, inserted.is_ok())?;
                return inserted;
            }

            self.access.unpin_page(tid, page_id, false)?;
            // Nothing was read from a full page, so the lock can go early
            if !already_held {
                self.access.release_lock(tid, page_id)?;
            }
        }

        self.insert_into_new_page(tid, tuple)
    }

    fn insert_into_new_page(&self, tid: TransactionId, tuple: Tuple) -> Result<RecordId> {
        let page_id = {
            let _allocation = self.allocation.lock();
            let page_number = self.num_pages();
            let page_id = PageId::new(self.table_id, page_number);
            self.access.allocate_page(page_id)?;
            self.num_pages.store(page_number + 1, Ordering::SeqCst);
            page_id
        };

        self.access.acquire_lock(tid, page_id, LockMode::Exclusive)?;
        let page = self.access.pin_page(tid, page_id, &self.maker)?;
        let inserted = page.write().insert_tuple(tuple);
        self.access.unpin_page(tid, page_id, inserted.is_ok())?;
        inserted
    }

    /// Deletes a stored tuple and clears its record id.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &mut Tuple) -> Result<()> {
        let page_id = tuple.record_id().ok_or(StrataError::MissingRecordId)?.page_id;
        if page_id.table_id() != self.table_id || page_id.page_number() >= self.num_pages() {
            return Err(StrataError::TupleNotOnPage(page_id));
        }

        self.access.acquire_lock(tid, page_id, LockMode::Exclusive)?;
        let page = self.access.pin_page(tid, page_id, &self.maker)?;
        let deleted = page.write().delete_tuple(tuple);
        self.access.unpin_page(tid, page_id, deleted.is_ok())?;
        deleted
    }

    /// Reads every tuple in the file, page by page, under shared locks.
    pub fn scan(&self, tid: TransactionId) -> Result<Vec<Tuple>> {
        let mut tuples = Vec::new();
        for page_number in 0..self.num_pages() {
            let page_id = PageId::new(self.table_id, page_number);
            self.access.acquire_lock(tid, page_id, LockMode::Shared)?;
            let page = self.access.pin_page(tid, page_id, &self.maker)?;
            tuples.extend(page.read().iter().cloned());
            self.access.unpin_page(tid, page_id, false)?;
        }
        Ok(tuples)
    }
}
