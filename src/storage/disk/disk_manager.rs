use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use log::trace;
use parking_lot::Mutex;

use crate::common::{PageId, Result, StrataError};

/// DiskManager is responsible for reading and writing pages to/from disk.
/// Every table lives in its own file inside the data directory, and page `n`
/// of a table starts at byte `n * page_size` of that file.
pub struct DiskManager {
    /// Directory holding the table files
    data_dir: PathBuf,
    /// Size of every page in bytes
    page_size: usize,
    /// Open table files, keyed by table ID
    files: Mutex<HashMap<u32, File>>,
    /// Number of page reads performed
    num_reads: AtomicU32,
    /// Number of page writes performed
    num_writes: AtomicU32,
}

impl DiskManager {
    /// Creates a new DiskManager rooted at the given directory.
    /// Creates the directory if it doesn't exist.
    pub fn new<P: AsRef<Path>>(data_dir: P, page_size: usize) -> Result<Self> {
        fs::create_dir_all(&data_dir)?;

        Ok(Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            page_size,
            files: Mutex::new(HashMap::new()),
            num_reads: AtomicU32::new(0),
            num_writes: AtomicU32::new(0),
        })
    }

    /// Returns the path of the file backing a table.
    pub fn table_path(&self, table_id: u32) -> PathBuf {
        self.data_dir.join(format!("table_{}.dat", table_id))
    }

    /// Reads a page from disk.
    /// Reading beyond the end of the file yields zeros.
    pub fn read_page(&self, page_id: PageId) -> Result<Vec<u8>> {
        let mut data = vec![0u8; self.page_size];
        let offset = self.offset_of(page_id);

        let mut files = self.files.lock();
        let file = self.file_for(&mut files, page_id.table_id())?;
        file.seek(SeekFrom::Start(offset))?;

        // Short reads leave the tail zeroed
        let mut filled = 0;
        while filled < data.len() {
            let n = file.read(&mut data[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        self.num_reads.fetch_add(1, Ordering::Relaxed);
        trace!("read page {}", page_id);
        Ok(data)
    }

    /// Writes a page to disk.
    /// The buffer must be exactly `page_size` bytes.
    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        if data.len() != self.page_size {
            return Err(StrataError::PageFormat(format!(
                "cannot write {} bytes to page {}, page size is {}",
                data.len(),
                page_id,
                self.page_size
            )));
        }
        let offset = self.offset_of(page_id);

        let mut files = self.files.lock();
        let file = self.file_for(&mut files, page_id.table_id())?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        file.flush()?;

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        trace!("wrote page {}", page_id);
        Ok(())
    }

    /// Allocates space for a page on disk by writing zeros to it.
    /// An all-zero page decodes as an empty slotted page.
    pub fn allocate_page(&self, page_id: PageId) -> Result<()> {
        let zeros = vec![0u8; self.page_size];
        self.write_page(page_id, &zeros)
    }

    /// Returns the number of whole pages stored for a table.
    pub fn num_pages(&self, table_id: u32) -> Result<u32> {
        let mut files = self.files.lock();
        let file = self.file_for(&mut files, table_id)?;
        let len = file.metadata()?.len();
        Ok((len / self.page_size as u64) as u32)
    }

    /// Returns the page size.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the number of page reads performed.
    pub fn get_num_reads(&self) -> u32 {
        self.num_reads.load(Ordering::Relaxed)
    }

    /// Returns the number of page writes performed.
    pub fn get_num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }

    /// Flushes any buffered writes to disk.
    pub fn sync(&self) -> Result<()> {
        let files = self.files.lock();
        for file in files.values() {
            file.sync_all()?;
        }
        Ok(())
    }

    fn offset_of(&self, page_id: PageId) -> u64 {
        page_id.page_number() as u64 * self.page_size as u64
    }

    fn file_for<'a>(&self, files: &'a mut HashMap<u32, File>, table_id: u32) -> Result<&'a mut File> {
        let file = match files.entry(table_id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(
                OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(false)
                    .open(self.table_path(table_id))?,
            ),
        };
        Ok(file)
    }
}

impl Drop for DiskManager {
    fn drop(&mut self) {
        // Ensure all data is flushed to disk
        for file in self.files.get_mut().values() {
            let _ = file.sync_all();
        }
    }
}
