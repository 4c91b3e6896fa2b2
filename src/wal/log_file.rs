use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::trace;
use parking_lot::Mutex;

use crate::common::{PageId, Result, StrataError, TransactionId, NO_CHECKPOINT};

use super::{LogRecord, PageImage, FOOTER_SIZE};

/// Size of the file header holding the checkpoint offset.
pub const LOG_HEADER_SIZE: u64 = 8;

/// A decoded record and the file offset it starts at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub offset: u64,
    pub record: LogRecord,
}

struct LogInner {
    file: File,
    /// End of the log, where the next record is appended
    end: u64,
    /// Transactions with a BEGIN but no COMMIT or ABORT yet
    active: HashSet<TransactionId>,
}

/// Append-only write-ahead log file.
///
/// The file starts with an 8 byte header holding the offset of the most
/// recent checkpoint record ([`NO_CHECKPOINT`] when there is none), followed
/// by records in the format described on [`LogRecord`].
pub struct LogFile {
    path: PathBuf,
    inner: Mutex<LogInner>,
}

impl LogFile {
    /// Opens the log at `path`, creating it with an empty header if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let mut end = file.metadata()?.len();
        if end < LOG_HEADER_SIZE {
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&NO_CHECKPOINT.to_be_bytes())?;
            file.sync_all()?;
            end = LOG_HEADER_SIZE;
        }

        Ok(Self {
            path,
            inner: Mutex::new(LogInner {
                file,
                end,
                active: HashSet::new(),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Logs the start of a transaction. Does nothing if it already began.
    pub fn log_begin(&self, tid: TransactionId) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.active.insert(tid) {
            Self::append_locked(&mut inner, &LogRecord::Begin { tid })?;
        }
        Ok(())
    }

    /// Logs a commit. Only written for a transaction that has begun.
    pub fn log_commit(&self, tid: TransactionId) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.active.remove(&tid) {
            Self::append_locked(&mut inner, &LogRecord::Commit { tid })?;
        }
        Ok(())
    }

    /// Logs an abort. Only written for a transaction that has begun.
    pub fn log_abort(&self, tid: TransactionId) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.active.remove(&tid) {
            Self::append_locked(&mut inner, &LogRecord::Abort { tid })?;
        }
        Ok(())
    }

    /// Logs an update of `page_id` from `before` to `after`, logging a BEGIN
    /// first if the transaction has not begun yet.
    pub fn log_write(&self, tid: TransactionId, page_id: PageId, before: Vec<u8>, after: Vec<u8>) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.active.insert(tid) {
            Self::append_locked(&mut inner, &LogRecord::Begin { tid })?;
        }
        let record = LogRecord::Update {
            tid,
            before: PageImage::new(page_id, before),
            after: PageImage::new(page_id, after),
        };
        Self::append_locked(&mut inner, &record)?;
        Ok(())
    }

    /// Logs a compensation record: `page_id` was restored to `after`.
    pub fn log_clr(&self, tid: TransactionId, page_id: PageId, after: Vec<u8>) -> Result<()> {
        let record = LogRecord::Clr {
            tid,
            after: PageImage::new(page_id, after),
        };
        self.append(&record)?;
        Ok(())
    }

    /// Logs a checkpoint listing the active transactions, then points the
    /// header at it. The log is forced before returning.
    ///
    /// The caller must have flushed every dirty page beforehand.
    pub fn log_checkpoint(&self) -> Result<u64> {
        let mut inner = self.inner.lock();
        let mut active: Vec<TransactionId> = inner.active.iter().copied().collect();
        active.sort();

        let offset = Self::append_locked(&mut inner, &LogRecord::Checkpoint { active })?;
        inner.file.seek(SeekFrom::Start(0))?;
        inner.file.write_all(&(offset as i64).to_be_bytes())?;
        inner.file.sync_all()?;
        Ok(offset)
    }

    /// Makes every appended record durable.
    pub fn force(&self) -> Result<()> {
        self.inner.lock().file.sync_all()?;
        Ok(())
    }

    /// Appends a record without touching the active set.
    /// Returns the offset it was written at.
    pub(crate) fn append(&self, record: &LogRecord) -> Result<u64> {
        let mut inner = self.inner.lock();
        Self::append_locked(&mut inner, record)
    }

    /// Returns the offset of the last checkpoint, if any.
    pub fn checkpoint_offset(&self) -> Result<Option<u64>> {
        let mut inner = self.inner.lock();
        let mut header = [0u8; LOG_HEADER_SIZE as usize];
        inner.file.seek(SeekFrom::Start(0))?;
        inner.file.read_exact(&mut header)?;

        let offset = i64::from_be_bytes(header);
        if offset == NO_CHECKPOINT {
            Ok(None)
        } else if offset < LOG_HEADER_SIZE as i64 || offset as u64 >= inner.end {
            Err(StrataError::LogCorrupted(format!("checkpoint offset {} out of range", offset)))
        } else {
            Ok(Some(offset as u64))
        }
    }

    /// Returns the transactions that have begun but not finished.
    pub fn active_transactions(&self) -> Vec<TransactionId> {
        let mut active: Vec<TransactionId> = self.inner.lock().active.iter().copied().collect();
        active.sort();
        active
    }

    /// Returns the current length of the log in bytes.
    pub fn len(&self) -> u64 {
        self.inner.lock().end
    }

    /// Returns true if the log holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == LOG_HEADER_SIZE
    }

    /// Reads the whole log into memory.
    pub fn snapshot(&self) -> Result<LogSnapshot> {
        let mut inner = self.inner.lock();
        let mut data = vec![0u8; inner.end as usize];
        inner.file.seek(SeekFrom::Start(0))?;
        inner.file.read_exact(&mut data)?;
        Ok(LogSnapshot { data })
    }

    /// Decodes every record in the log, in order.
    pub fn records(&self) -> Result<Vec<LogEntry>> {
        self.snapshot()?.forward(LOG_HEADER_SIZE)
    }

    /// Renders a human-readable listing of the log.
    pub fn dump(&self) -> Result<String> {
        let mut out = String::new();
        let checkpoint = self.checkpoint_offset()?;
        let _ = writeln!(out, "BEGIN LOG FILE");
        for entry in self.records()? {
            let marker = if Some(entry.offset) == checkpoint { " *" } else { "" };
            let _ = writeln!(out, "{:>8}: {}{}", entry.offset, entry.record, marker);
        }
        let _ = writeln!(out, "END LOG FILE");
        Ok(out)
    }

    fn append_locked(inner: &mut LogInner, record: &LogRecord) -> Result<u64> {
        let offset = inner.end;
        let mut buf = Vec::with_capacity(record.encoded_len());
        record.encode(offset, &mut buf);

        inner.file.seek(SeekFrom::Start(offset))?;
        inner.file.write_all(&buf)?;
        inner.end += buf.len() as u64;
        trace!("appended {} at offset {}", record, offset);
        Ok(offset)
    }
}

/// An in-memory copy of the log, read in either direction.
pub struct LogSnapshot {
    data: Vec<u8>,
}

impl LogSnapshot {
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= LOG_HEADER_SIZE
    }

    /// Decodes the record starting at `offset`.
    /// Returns the entry and the offset just past it.
    pub fn read_at(&self, offset: u64) -> Result<(LogEntry, u64)> {
        let start = offset as usize;
        if offset < LOG_HEADER_SIZE || start >= self.data.len() {
            return Err(StrataError::LogCorrupted(format!("no record at offset {}", offset)));
        }
        let mut buf = &self.data[start..];
        let (record, stored) = LogRecord::decode(&mut buf)?;
        if stored != offset {
            return Err(StrataError::LogCorrupted(format!(
                "record at offset {} claims to start at {}",
                offset, stored
            )));
        }
        let next = (self.data.len() - buf.len()) as u64;
        Ok((LogEntry { offset, record }, next))
    }

    /// Decodes every record from `offset` to the end.
    pub fn forward(&self, mut offset: u64) -> Result<Vec<LogEntry>> {
        let mut entries = Vec::new();
        while offset < self.len() {
            let (entry, next) = self.read_at(offset)?;
            entries.push(entry);
            offset = next;
        }
        Ok(entries)
    }

    /// Returns the record ending at `end`, found through its start-offset footer.
    pub fn read_before(&self, end: u64) -> Result<LogEntry> {
        let end = end as usize;
        if end < LOG_HEADER_SIZE as usize + FOOTER_SIZE || end > self.data.len() {
            return Err(StrataError::LogCorrupted(format!("no record ends at offset {}", end)));
        }
        let mut footer = [0u8; FOOTER_SIZE];
        footer.copy_from_slice(&self.data[end - FOOTER_SIZE..end]);
        let start = i64::from_be_bytes(footer);
        if start < LOG_HEADER_SIZE as i64 || start as usize >= end {
            return Err(StrataError::LogCorrupted(format!("bad start offset {} before {}", start, end)));
        }
        let (entry, next) = self.read_at(start as u64)?;
        if next as usize != end {
            return Err(StrataError::LogCorrupted(format!(
                "record at {} does not end at {}",
                start, end
            )));
        }
        Ok(entry)
    }

    /// Iterates records from the end of the log back to the start.
    pub fn backward(&self) -> Backward<'_> {
        Backward {
            snapshot: self,
            end: self.len(),
        }
    }
}

/// Iterator over a [`LogSnapshot`] walking from the newest record to the oldest.
pub struct Backward<'a> {
    snapshot: &'a LogSnapshot,
    end: u64,
}

impl Iterator for Backward<'_> {
    type Item = Result<LogEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.end <= LOG_HEADER_SIZE {
            return None;
        }
        match self.snapshot.read_before(self.end) {
            Ok(entry) => {
                self.end = entry.offset;
                Some(Ok(entry))
            }
            Err(e) => {
                self.end = LOG_HEADER_SIZE;
                Some(Err(e))
            }
        }
    }
}
