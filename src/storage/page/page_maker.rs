use std::sync::Arc;

use crate::common::{PageId, Result, StrataError};
use crate::tuple::Schema;

use super::SlottedPage;

/// Builds in-memory pages from on-disk bytes.
///
/// The buffer pool is handed a maker on every pin so that it can construct a
/// page it has to read from disk.
pub trait PageMaker {
    fn make_page(&self, page_id: PageId, data: &[u8]) -> Result<SlottedPage>;
}

/// Makes slotted pages for one table schema.
#[derive(Debug, Clone)]
pub struct SlottedPageMaker {
    schema: Arc<Schema>,
    page_size: usize,
}

impl SlottedPageMaker {
    pub fn new(schema: Arc<Schema>, page_size: usize) -> Self {
        Self { schema, page_size }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }
}

impl PageMaker for SlottedPageMaker {
    fn make_page(&self, page_id: PageId, data: &[u8]) -> Result<SlottedPage> {
        if data.len() != self.page_size {
            return Err(StrataError::PageFormat(format!(
                "page {} has {} bytes, expected {}",
                page_id,
                data.len(),
                self.page_size
            )));
        }
        SlottedPage::from_bytes(page_id, self.schema.clone(), data)
    }
}
