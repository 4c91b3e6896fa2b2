use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::common::{PageId, Result, StrataError};
use crate::storage::disk::DiskManager;
use crate::storage::page::PageMaker;

use super::{Frame, PageRef};

/// Internal state guarded by the pool's single mutex
struct BufferPoolState {
    /// Resident pages
    frames: HashMap<PageId, Frame>,
    /// Recency order: front is least recently used, back is most recently used
    lru: VecDeque<PageId>,
    /// Whether dirty pages may be chosen for eviction
    evict_dirty_allowed: bool,
}

impl BufferPoolState {
    /// Moves a page to the most-recently-used end.
    fn touch(&mut self, page_id: PageId) {
        if let Some(pos) = self.lru.iter().position(|&pid| pid == page_id) {
            self.lru.remove(pos);
        }
        self.lru.push_back(page_id);
    }

    fn forget(&mut self, page_id: PageId) -> Option<Frame> {
        if let Some(pos) = self.lru.iter().position(|&pid| pid == page_id) {
            self.lru.remove(pos);
        }
        self.frames.remove(&page_id)
    }
}

/// BufferPoolManager caches a bounded number of pages in memory.
///
/// Pages are pinned while in use; only unpinned pages can be evicted, and the
/// least recently used evictable page is chosen. Dirty pages are evicted only
/// when dirty eviction has been allowed, and are written out first.
/// Every operation runs under one mutex.
pub struct BufferPoolManager {
    /// Maximum number of resident pages
    pool_size: usize,
    /// Backing page storage
    disk_manager: Arc<DiskManager>,
    /// Frames and recency order
    state: Mutex<BufferPoolState>,
}

impl BufferPoolManager {
    /// Creates a new BufferPoolManager holding at most `pool_size` pages.
    pub fn new(pool_size: usize, disk_manager: Arc<DiskManager>) -> Self {
        Self {
            pool_size,
            disk_manager,
            state: Mutex::new(BufferPoolState {
                frames: HashMap::with_capacity(pool_size),
                lru: VecDeque::with_capacity(pool_size),
                evict_dirty_allowed: false,
            }),
        }
    }

    /// Pins a page, reading it from disk with `maker` if it is not resident.
    pub fn pin_page<M: PageMaker + ?Sized>(&self, page_id: PageId, maker: &M) -> Result<PageRef> {
        let mut state = self.state.lock();

        if let Some(frame) = state.frames.get_mut(&page_id) {
            frame.pin();
            let page = Arc::clone(frame.page());
            state.touch(page_id);
            return Ok(page);
        }

        if state.frames.len() >= self.pool_size {
            self.evict(&mut state)?;
        }

        let data = self.disk_manager.read_page(page_id)?;
        let mut frame = Frame::new(maker.make_page(page_id, &data)?);
        frame.pin();
        let page = Arc::clone(frame.page());

        state.frames.insert(page_id, frame);
        state.lru.push_back(page_id);
        Ok(page)
    }

    /// Releases one pin on a page. A dirty unpin marks the page dirty; a clean
    /// unpin never clears the flag.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<()> {
        let mut state = self.state.lock();

        let frame = state
            .frames
            .get_mut(&page_id)
            .ok_or(StrataError::PageNotResident(page_id))?;
        frame.unpin().ok_or(StrataError::PageNotPinned(page_id))?;
        if is_dirty {
            frame.set_dirty(true);
        }

        state.touch(page_id);
        Ok(())
    }

    /// Writes a page to disk if it is resident and dirty, then clears its dirty flag.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let mut state = self.state.lock();

        if let Some(frame) = state.frames.get_mut(&page_id) {
            self.write_frame(page_id, frame)?;
        }
        Ok(())
    }

    /// Flushes all dirty pages in the buffer pool to disk.
    pub fn flush_all_pages(&self) -> Result<()> {
        let mut state = self.state.lock();

        for (&page_id, frame) in state.frames.iter_mut() {
            self.write_frame(page_id, frame)?;
        }
        Ok(())
    }

    /// Reserves space for a new page on disk.
    pub fn allocate_page(&self, page_id: PageId) -> Result<()> {
        let _state = self.state.lock();
        self.disk_manager.allocate_page(page_id)
    }

    /// Drops a resident page without writing it.
    /// Returns true if the page was resident.
    pub fn discard_page(&self, page_id: PageId) -> bool {
        let mut state = self.state.lock();
        let discarded = state.forget(page_id).is_some();
        if discarded {
            debug!("discarded page {}", page_id);
        }
        discarded
    }

    /// Returns whether a resident page is dirty.
    pub fn is_dirty(&self, page_id: PageId) -> bool {
        let state = self.state.lock();
        state.frames.get(&page_id).is_some_and(Frame::is_dirty)
    }

    /// Returns whether the page is resident.
    pub fn in_buffer_pool(&self, page_id: PageId) -> bool {
        self.state.lock().frames.contains_key(&page_id)
    }

    /// Returns a resident page without pinning it.
    pub fn get_page(&self, page_id: PageId) -> Result<PageRef> {
        let state = self.state.lock();
        state
            .frames
            .get(&page_id)
            .map(|frame| Arc::clone(frame.page()))
            .ok_or(StrataError::PageNotResident(page_id))
    }

    /// Returns the pin count for a resident page.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        self.state.lock().frames.get(&page_id).map(Frame::pin_count)
    }

    /// Sets whether dirty pages may be evicted.
    pub fn set_evict_dirty(&self, allowed: bool) {
        self.state.lock().evict_dirty_allowed = allowed;
    }

    /// Returns the pool size.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Returns the number of resident pages.
    pub fn resident_count(&self) -> usize {
        self.state.lock().frames.len()
    }

    /// Returns the disk manager backing this pool.
    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.disk_manager
    }

    /// Evicts the least recently used evictable page.
    fn evict(&self, state: &mut BufferPoolState) -> Result<()> {
        let allow_dirty = state.evict_dirty_allowed;
        let victim = state
            .lru
            .iter()
            .copied()
            .find(|pid| {
                state.frames.get(pid).is_some_and(|frame| {
                    frame.pin_count() == 0 && (!frame.is_dirty() || allow_dirty)
                })
            })
            .ok_or(StrataError::BufferPoolFull)?;

        if let Some(frame) = state.frames.get_mut(&victim) {
            self.write_frame(victim, frame)?;
        }
        state.forget(victim);
        debug!("evicted page {}", victim);
        Ok(())
    }

    fn write_frame(&self, page_id: PageId, frame: &mut Frame) -> Result<()> {
        if frame.is_dirty() {
            let data = frame.page().read().page_data();
            self.disk_manager.write_page(page_id, &data)?;
            frame.set_dirty(false);
        }
        Ok(())
    }
}
