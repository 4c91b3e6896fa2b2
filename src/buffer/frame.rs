use std::sync::Arc;

use parking_lot::RwLock;

use crate::storage::page::SlottedPage;

/// Shared handle to a page held by the buffer pool.
pub type PageRef = Arc<RwLock<SlottedPage>>;

/// Frame holds one resident page together with its buffer-pool metadata.
pub struct Frame {
    /// The page stored in this frame
    page: PageRef,
    /// Pin count - number of outstanding pins on this page
    pin_count: u32,
    /// Whether the page has been modified since it was last written out.
    /// Set by unpin, cleared only by a flush.
    is_dirty: bool,
}

impl Frame {
    /// Creates an unpinned, clean frame around a page.
    pub fn new(page: SlottedPage) -> Self {
        Self {
            page: Arc::new(RwLock::new(page)),
            pin_count: 0,
            is_dirty: false,
        }
    }

    /// Returns the page handle.
    pub fn page(&self) -> &PageRef {
        &self.page
    }

    /// Returns the current pin count.
    pub fn pin_count(&self) -> u32 {
        self.pin_count
    }

    /// Increments the pin count and returns the new value.
    pub fn pin(&mut self) -> u32 {
        self.pin_count += 1;
        self.pin_count
    }

    /// Decrements the pin count and returns the new value.
    /// Returns None if the pin count was already 0.
    pub fn unpin(&mut self) -> Option<u32> {
        if self.pin_count == 0 {
            return None;
        }
        self.pin_count -= 1;
        Some(self.pin_count)
    }

    /// Returns whether the page is dirty.
    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    /// Sets the dirty flag.
    pub fn set_dirty(&mut self, dirty: bool) {
        self.is_dirty = dirty;
    }
}
