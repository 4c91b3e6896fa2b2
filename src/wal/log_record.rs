use std::fmt;

use bytes::{Buf, BufMut};

use crate::common::{PageId, Result, StrataError, TransactionId};

/// Size of the start-offset footer that ends every record.
pub const FOOTER_SIZE: usize = 8;

/// Transaction id written for records that belong to no transaction.
const NO_TRANSACTION: i64 = -1;

/// Types of log records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRecordType {
    Abort,
    Commit,
    Update,
    Begin,
    Checkpoint,
    /// Compensation log record, written when an update is undone
    Clr,
}

impl LogRecordType {
    /// On-disk code
    pub fn code(self) -> i32 {
        match self {
            LogRecordType::Abort => 1,
            LogRecordType::Commit => 2,
            LogRecordType::Update => 3,
            LogRecordType::Begin => 4,
            LogRecordType::Checkpoint => 5,
            LogRecordType::Clr => 6,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(LogRecordType::Abort),
            2 => Some(LogRecordType::Commit),
            3 => Some(LogRecordType::Update),
            4 => Some(LogRecordType::Begin),
            5 => Some(LogRecordType::Checkpoint),
            6 => Some(LogRecordType::Clr),
            _ => None,
        }
    }
}

impl fmt::Display for LogRecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogRecordType::Abort => "ABORT",
            LogRecordType::Commit => "COMMIT",
            LogRecordType::Update => "UPDATE",
            LogRecordType::Begin => "BEGIN",
            LogRecordType::Checkpoint => "CHECKPOINT",
            LogRecordType::Clr => "CLR",
        };
        f.write_str(name)
    }
}

/// The full bytes of one page at some point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    pub page_id: PageId,
    pub data: Vec<u8>,
}

impl PageImage {
    pub fn new(page_id: PageId, data: Vec<u8>) -> Self {
        Self { page_id, data }
    }

    fn encoded_len(&self) -> usize {
        12 + self.data.len()
    }

    fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_i32(self.page_id.table_id() as i32);
        buf.put_i32(self.page_id.page_number() as i32);
        buf.put_i32(self.data.len() as i32);
        buf.put_slice(&self.data);
    }

    fn decode(buf: &mut &[u8]) -> Result<Self> {
        ensure(buf, 12, "page image header")?;
        let table_id = buf.get_i32();
        let page_number = buf.get_i32();
        let len = buf.get_i32();
        if table_id < 0 || page_number < 0 || len < 0 {
            return Err(StrataError::LogCorrupted(format!(
                "invalid page image header {}/{}/{}",
                table_id, page_number, len
            )));
        }
        let len = len as usize;
        ensure(buf, len, "page image bytes")?;
        let data = buf[..len].to_vec();
        buf.advance(len);
        Ok(Self::new(PageId::new(table_id as u32, page_number as u32), data))
    }
}

/// A single write-ahead log record.
///
/// On disk every record is laid out as
/// `[type i32][tid i64][payload][start offset i64]`, big-endian, where the
/// trailing start offset lets the log be walked backwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    Begin { tid: TransactionId },
    Commit { tid: TransactionId },
    Abort { tid: TransactionId },
    Update {
        tid: TransactionId,
        before: PageImage,
        after: PageImage,
    },
    Clr { tid: TransactionId, after: PageImage },
    Checkpoint { active: Vec<TransactionId> },
}

impl LogRecord {
    pub fn record_type(&self) -> LogRecordType {
        match self {
            LogRecord::Begin { .. } => LogRecordType::Begin,
            LogRecord::Commit { .. } => LogRecordType::Commit,
            LogRecord::Abort { .. } => LogRecordType::Abort,
            LogRecord::Update { .. } => LogRecordType::Update,
            LogRecord::Clr { .. } => LogRecordType::Clr,
            LogRecord::Checkpoint { .. } => LogRecordType::Checkpoint,
        }
    }

    /// Returns the owning transaction, or None for a checkpoint.
    pub fn tid(&self) -> Option<TransactionId> {
        match self {
            LogRecord::Begin { tid }
            | LogRecord::Commit { tid }
            | LogRecord::Abort { tid }
            | LogRecord::Update { tid, .. }
            | LogRecord::Clr { tid, .. } => Some(*tid),
            LogRecord::Checkpoint { .. } => None,
        }
    }

    /// Returns the encoded size, footer included.
    pub fn encoded_len(&self) -> usize {
        let payload = match self {
            LogRecord::Begin { .. } | LogRecord::Commit { .. } | LogRecord::Abort { .. } => 0,
            LogRecord::Update { before, after, .. } => before.encoded_len() + after.encoded_len(),
            LogRecord::Clr { after, .. } => after.encoded_len(),
            LogRecord::Checkpoint { active } => 4 + 8 * active.len(),
        };
        4 + 8 + payload + FOOTER_SIZE
    }

    /// Encodes the record, ending with `start_offset`, the file offset the
    /// record is written at.
    pub fn encode<B: BufMut>(&self, start_offset: u64, buf: &mut B) {
        buf.put_i32(self.record_type().code());
        buf.put_i64(self.tid().map_or(NO_TRANSACTION, |tid| tid.as_u64() as i64));

        match self {
            LogRecord::Begin { .. } | LogRecord::Commit { .. } | LogRecord::Abort { .. } => {}
            LogRecord::Update { before, after, .. } => {
                before.encode(buf);
                after.encode(buf);
            }
            LogRecord::Clr { after, .. } => after.encode(buf),
            LogRecord::Checkpoint { active } => {
                buf.put_i32(active.len() as i32);
                for tid in active {
                    buf.put_i64(tid.as_u64() as i64);
                }
            }
        }

        buf.put_i64(start_offset as i64);
    }

    /// Decodes one record from the front of `buf`, advancing past it.
    /// Returns the record and its stored start offset.
    pub fn decode(buf: &mut &[u8]) -> Result<(Self, u64)> {
        ensure(buf, 12, "record header")?;
        let code = buf.get_i32();
        let raw_tid = buf.get_i64();
        let record_type = LogRecordType::from_code(code)
            .ok_or_else(|| StrataError::LogCorrupted(format!("unknown record type {}", code)))?;

        let tid = || {
            if raw_tid < 0 {
                Err(StrataError::LogCorrupted(format!(
                    "{} record without a transaction",
                    record_type
                )))
            } else {
                Ok(TransactionId::from_raw(raw_tid as u64))
            }
        };

        let record = match record_type {
            LogRecordType::Begin => LogRecord::Begin { tid: tid()? },
            LogRecordType::Commit => LogRecord::Commit { tid: tid()? },
            LogRecordType::Abort => LogRecord::Abort { tid: tid()? },
            LogRecordType::Update => {
                let tid = tid()?;
                let before = PageImage::decode(buf)?;
                let after = PageImage::decode(buf)?;
                LogRecord::Update { tid, before, after }
            }
            LogRecordType::Clr => {
                let tid = tid()?;
                let after = PageImage::decode(buf)?;
                LogRecord::Clr { tid, after }
            }
            LogRecordType::Checkpoint => {
                ensure(buf, 4, "checkpoint count")?;
                let count = buf.get_i32().max(0) as usize;
                ensure(buf, count * 8, "checkpoint transactions")?;
                let active = (0..count)
                    .map(|_| TransactionId::from_raw(buf.get_i64() as u64))
                    .collect();
                LogRecord::Checkpoint { active }
            }
        };

        ensure(buf, FOOTER_SIZE, "record footer")?;
        let start_offset = buf.get_i64();
        if start_offset < 0 {
            return Err(StrataError::LogCorrupted(format!(
                "negative start offset {}",
                start_offset
            )));
        }
        Ok((record, start_offset as u64))
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogRecord::Begin { tid } | LogRecord::Commit { tid } | LogRecord::Abort { tid } => {
                write!(f, "<{} {}>", tid, self.record_type())
            }
            LogRecord::Update { tid, before, .. } => {
                write!(f, "<{} UPDATE pid={}>", tid, before.page_id)
            }
            LogRecord::Clr { tid, after } => write!(f, "<{} CLR pid={}>", tid, after.page_id),
            LogRecord::Checkpoint { active } => {
                let tids: Vec<String> = active.iter().map(|tid| tid.as_u64().to_string()).collect();
                write!(f, "<T_{} CHECKPOINT [{}]>", NO_TRANSACTION, tids.join(", "))
            }
        }
    }
}

fn ensure(buf: &[u8], needed: usize, what: &str) -> Result<()> {
    if buf.remaining() < needed {
        return Err(StrataError::LogCorrupted(format!(
            "truncated {}: need {} bytes, have {}",
            what,
            needed,
            buf.remaining()
        )));
    }
    Ok(())
}
