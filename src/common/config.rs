use std::path::{Path, PathBuf};

/// Default size of a page in bytes (4 KB)
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default buffer pool size (number of frames)
pub const DEFAULT_BUFFER_POOL_SIZE: usize = 50;

/// Log header value when no checkpoint has been taken
pub const NO_CHECKPOINT: i64 = -1;

/// Name of the write-ahead log inside the data directory
pub const LOG_FILE_NAME: &str = "wal.log";

/// Settings for opening a database.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding the table files and the log
    pub data_dir: PathBuf,
    /// Size of every page in bytes
    pub page_size: usize,
    /// Number of frames in the buffer pool
    pub buffer_pool_size: usize,
    /// Flush dirtied pages synchronously at commit
    pub force: bool,
    /// Allow dirty pages of running transactions to be evicted
    pub evict_dirty_allowed: bool,
}

impl StoreConfig {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_buffer_pool_size(mut self, buffer_pool_size: usize) -> Self {
        self.buffer_pool_size = buffer_pool_size;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_evict_dirty_allowed(mut self, allowed: bool) -> Self {
        self.evict_dirty_allowed = allowed;
        self
    }

    /// Path of the write-ahead log.
    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(LOG_FILE_NAME)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./strata_data"),
            page_size: DEFAULT_PAGE_SIZE,
            buffer_pool_size: DEFAULT_BUFFER_POOL_SIZE,
            force: true,
            evict_dirty_allowed: false,
        }
    }
}
