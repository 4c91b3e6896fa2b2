use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use parking_lot::{Mutex, RwLock};

use crate::buffer::{BufferPoolManager, PageRef};
use crate::common::{PageId, Result, TransactionId};
use crate::concurrency::{LockManager, LockMode};
use crate::storage::page::PageMaker;
use crate::wal::{LogFile, RecoveryManager};

/// Per-transaction bookkeeping
#[derive(Default)]
struct Bookkeeping {
    /// One entry per outstanding pin
    pins: HashMap<PageId, Vec<TransactionId>>,
    /// Pages each transaction has unpinned dirty
    dirtied: HashMap<TransactionId, HashSet<PageId>>,
}

/// AccessManager is the entry point transactions use to reach pages.
///
/// It pairs the lock manager with the buffer pool and the log: every dirty
/// unpin is logged before the page can reach disk, and
/// [`transaction_complete`](Self::transaction_complete) applies the commit
/// or abort policy and then releases every lock the transaction holds.
///
/// Page guards obtained from a pinned [`PageRef`] must be dropped before the
/// page is unpinned.
pub struct AccessManager {
    pool: BufferPoolManager,
    locks: LockManager,
    log: LogFile,
    /// Flush a transaction's pages at commit
    force: AtomicBool,
    book: Mutex<Bookkeeping>,
    /// Held shared from a dirty unpin's log write until the pool sees the
    /// dirty flag; held exclusively while a checkpoint is taken
    checkpoint_gate: RwLock<()>,
}

impl AccessManager {
    pub fn new(pool: BufferPoolManager, locks: LockManager, log: LogFile, force: bool) -> Self {
        Self {
            pool,
            locks,
            log,
            force: AtomicBool::new(force),
            book: Mutex::new(Bookkeeping::default()),
            checkpoint_gate: RwLock::new(()),
        }
    }

    /// Starts a new transaction.
    pub fn begin_transaction(&self) -> TransactionId {
        let tid = TransactionId::new();
        debug!("{} started", tid);
        tid
    }

    pub fn acquire_lock(&self, tid: TransactionId, page_id: PageId, mode: LockMode) -> Result<()> {
        self.locks.acquire_lock(tid, page_id, mode)
    }

    pub fn release_lock(&self, tid: TransactionId, page_id: PageId) -> Result<()> {
        self.locks.release_lock(tid, page_id)
    }

    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId, mode: LockMode) -> bool {
        self.locks.holds_lock(tid, page_id, mode)
    }

    /// Pins a page on behalf of `tid`.
    pub fn pin_page<M: PageMaker + ?Sized>(&self, tid: TransactionId, page_id: PageId, maker: &M) -> Result<PageRef> {
        let page = self.pool.pin_page(page_id, maker)?;
        self.book.lock().pins.entry(page_id).or_default().push(tid);
        Ok(page)
    }

    /// Releases a pin held by `tid`. A dirty unpin logs the page's before
    /// image and current bytes first.
    pub fn unpin_page(&self, tid: TransactionId, page_id: PageId, is_dirty: bool) -> Result<()> {
        let gate = self.checkpoint_gate.read();
        if is_dirty {
            let (before, after) = {
                let page = self.pool.get_page(page_id)?;
                let page = page.read();
                (page.before_image(), page.page_data())
            };
            self.log.log_write(tid, page_id, before, after)?;
            self.book.lock().dirtied.entry(tid).or_default().insert(page_id);
        }

        self.pool.unpin_page(page_id, is_dirty)?;
        drop(gate);

        let mut book = self.book.lock();
        if let Some(tids) = book.pins.get_mut(&page_id) {
            if let Some(pos) = tids.iter().position(|&t| t == tid) {
                tids.remove(pos);
            }
            if tids.is_empty() {
                book.pins.remove(&page_id);
            }
        }
        Ok(())
    }

    pub fn allocate_page(&self, page_id: PageId) -> Result<()> {
        self.pool.allocate_page(page_id)
    }

    /// Commits or aborts `tid`, then releases all of its locks.
    ///
    /// On commit under the force policy the log is forced and every page the
    /// transaction dirtied is written out before the COMMIT record. On abort
    /// the transaction's remaining pins are released, its updates are rolled
    /// back through the log and its buffered pages are discarded.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> Result<()> {
        let (pins, dirtied) = {
            let mut book = self.book.lock();
            let dirtied = book.dirtied.remove(&tid).unwrap_or_default();
            let mut pins = Vec::new();
            book.pins.retain(|&page_id, tids| {
                tids.retain(|&t| {
                    if t == tid {
                        pins.push(page_id);
                        false
                    } else {
                        true
                    }
                });
                !tids.is_empty()
            });
            (pins, dirtied)
        };

        let result = if commit {
            self.commit(tid, &pins, &dirtied)
        } else {
            self.abort(tid, &pins, &dirtied)
        };

        self.locks.release_all(tid);
        result
    }

    fn commit(&self, tid: TransactionId, pins: &[PageId], dirtied: &HashSet<PageId>) -> Result<()> {
        for &page_id in pins {
            self.pool.unpin_page(page_id, false)?;
        }

        let force = self.force.load(Ordering::SeqCst);
        if force {
            self.log.force()?;
        }
        for &page_id in dirtied {
            if !self.pool.in_buffer_pool(page_id) {
                continue;
            }
            self.pool.get_page(page_id)?.read().set_before_image();
            if force {
                self.pool.flush_page(page_id)?;
            }
        }
        if force && !dirtied.is_empty() {
            self.pool.disk_manager().sync()?;
        }

        self.log.log_commit(tid)?;
        self.log.force()?;
        debug!("{} committed, {} pages dirtied", tid, dirtied.len());
        Ok(())
    }

    fn abort(&self, tid: TransactionId, pins: &[PageId], dirtied: &HashSet<PageId>) -> Result<()> {
        for &page_id in pins {
            self.pool.unpin_page(page_id, false)?;
        }

        let undone = RecoveryManager::new(&self.log, &self.pool).rollback(tid)?;

        // Rollback already wrote the before images of these to disk
        for &page_id in dirtied {
            self.pool.discard_page(page_id);
        }

        // Other exclusively locked pages may hold changes that were never
        // logged; their before image is the last committed state
        for page_id in self.locks.pages_held_by(tid) {
            if dirtied.contains(&page_id) || !self.locks.holds_lock(tid, page_id, LockMode::Exclusive) {
                continue;
            }
            if let Ok(page) = self.pool.get_page(page_id) {
                let mut page = page.write();
                if page.revert_to_before_image()? {
                    // An earlier flush may have written the unlogged bytes
                    self.pool.disk_manager().write_page(page_id, &page.page_data())?;
                    debug!("{} reverted unlogged changes to page {}", tid, page_id);
                }
            }
        }

        self.log.log_abort(tid)?;
        self.log.force()?;
        debug!("{} aborted, {} updates undone", tid, undone);
        Ok(())
    }

    /// Writes a checkpoint: forces the log, flushes every dirty page, then
    /// logs the active transactions and points the log header at them.
    ///
    /// Dirty unpins wait while the checkpoint runs, so every update logged
    /// before the CHECKPOINT record is on disk when it is written.
    pub fn checkpoint(&self) -> Result<u64> {
        let _gate = self.checkpoint_gate.write();
        self.log.force()?;
        self.pool.flush_all_pages()?;
        self.pool.disk_manager().sync()?;
        let offset = self.log.log_checkpoint()?;
        debug!("checkpoint written at offset {}", offset);
        Ok(offset)
    }

    /// Sets whether commits flush the transaction's pages.
    pub fn set_force(&self, force: bool) {
        self.force.store(force, Ordering::SeqCst);
    }

    pub fn is_force(&self) -> bool {
        self.force.load(Ordering::SeqCst)
    }

    pub fn pool(&self) -> &BufferPoolManager {
        &self.pool
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.locks
    }

    pub fn log(&self) -> &LogFile {
        &self.log
    }
}
