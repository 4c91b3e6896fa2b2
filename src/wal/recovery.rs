use std::collections::{BTreeMap, HashSet};

use log::info;

use crate::buffer::BufferPoolManager;
use crate::common::{PageId, Result, StrataError, TransactionId};

use super::{LogFile, LogRecord, PageImage, LOG_HEADER_SIZE};

/// Recovery statistics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Number of records read by the redo pass.
    pub records_scanned: usize,
    /// Number of update and compensation records redone.
    pub pages_redone: usize,
    /// Number of pages the redo pass actually wrote.
    pub pages_written: usize,
    /// Number of unfinished transactions rolled back.
    pub losers_undone: usize,
    /// Number of compensation records written by the undo pass.
    pub clrs_written: usize,
}

/// Applies the log to the data files: rolls back single transactions and
/// recovers after a crash.
///
/// The caller guarantees no other transaction touches the buffer pool or the
/// log while either operation runs.
pub struct RecoveryManager<'a> {
    log: &'a LogFile,
    pool: &'a BufferPoolManager,
}

impl<'a> RecoveryManager<'a> {
    pub fn new(log: &'a LogFile, pool: &'a BufferPoolManager) -> Self {
        Self { log, pool }
    }

    /// Undoes every update of `tid`, newest first, and logs its abort.
    ///
    /// Each update's before image is written straight to disk, the buffered
    /// copy is discarded and a compensation record is appended. Returns the
    /// number of updates undone.
    pub fn rollback(&self, tid: TransactionId) -> Result<usize> {
        let snapshot = self.log.snapshot()?;
        let mut undone = 0;

        for entry in snapshot.backward() {
            match entry?.record {
                LogRecord::Commit { tid: t } if t == tid => {
                    return Err(StrataError::RollbackCommitted(tid));
                }
                LogRecord::Begin { tid: t } if t == tid => break,
                LogRecord::Update { tid: t, before, .. } if t == tid => {
                    self.undo_update(tid, before)?;
                    undone += 1;
                }
                _ => {}
            }
        }

        self.log.log_abort(tid)?;
        Ok(undone)
    }

    /// Brings the data files to a state where every committed transaction's
    /// updates are present and no unfinished transaction's updates are.
    ///
    /// Recovering twice in a row writes no pages the second time.
    pub fn recover(&self) -> Result<RecoveryStats> {
        let mut stats = RecoveryStats::default();
        let snapshot = self.log.snapshot()?;

        // Analysis
        info!("recovery: analysis pass over {} bytes of log", snapshot.len());
        let (mut losers, start) = match self.log.checkpoint_offset()? {
            Some(offset) => {
                let (entry, next) = snapshot.read_at(offset)?;
                match entry.record {
                    LogRecord::Checkpoint { active } => (active.into_iter().collect::<HashSet<_>>(), next),
                    other => {
                        return Err(StrataError::LogCorrupted(format!(
                            "checkpoint pointer {} refers to {}",
                            offset, other
                        )));
                    }
                }
            }
            None => (HashSet::new(), LOG_HEADER_SIZE),
        };

        // Redo
        info!("recovery: redo pass from offset {}", start);
        let mut latest: BTreeMap<PageId, Vec<u8>> = BTreeMap::new();
        for entry in snapshot.forward(start)? {
            stats.records_scanned += 1;
            match entry.record {
                LogRecord::Begin { tid } => {
                    if !losers.insert(tid) {
                        return Err(StrataError::LogCorrupted(format!(
                            "duplicate BEGIN for {} at offset {}",
                            tid, entry.offset
                        )));
                    }
                }
                LogRecord::Commit { tid } | LogRecord::Abort { tid } => {
                    if !losers.remove(&tid) {
                        return Err(StrataError::LogCorrupted(format!(
                            "end of unknown transaction {} at offset {}",
                            tid, entry.offset
                        )));
                    }
                }
                LogRecord::Update { after, .. } | LogRecord::Clr { after, .. } => {
                    stats.pages_redone += 1;
                    self.pool.discard_page(after.page_id);
                    latest.insert(after.page_id, after.data);
                }
                LogRecord::Checkpoint { .. } => {
                    return Err(StrataError::LogCorrupted(format!(
                        "stale checkpoint at offset {}",
                        entry.offset
                    )));
                }
            }
        }

        let disk = self.pool.disk_manager();
        for (page_id, data) in latest {
            if disk.read_page(page_id)? != data {
                disk.write_page(page_id, &data)?;
                stats.pages_written += 1;
            }
        }
        info!(
            "recovery: redo done, {} records scanned, {} pages written",
            stats.records_scanned, stats.pages_written
        );

        // Undo
        stats.losers_undone = losers.len();
        if !losers.is_empty() {
            info!("recovery: undo pass for {} unfinished transactions", losers.len());
            for entry in snapshot.backward() {
                if losers.is_empty() {
                    break;
                }
                match entry?.record {
                    LogRecord::Update { tid, before, .. } if losers.contains(&tid) => {
                        self.undo_update(tid, before)?;
                        stats.clrs_written += 1;
                    }
                    LogRecord::Begin { tid } if losers.remove(&tid) => {
                        self.log.append(&LogRecord::Abort { tid })?;
                    }
                    _ => {}
                }
            }
            let mut remaining: Vec<TransactionId> = losers.into_iter().collect();
            remaining.sort();
            for tid in remaining {
                self.log.append(&LogRecord::Abort { tid })?;
            }
        }

        self.pool.disk_manager().sync()?;
        self.log.force()?;
        info!(
            "recovery: complete, {} redone, {} written, {} undone, {} CLRs",
            stats.pages_redone, stats.pages_written, stats.losers_undone, stats.clrs_written
        );
        Ok(stats)
    }

    fn undo_update(&self, tid: TransactionId, before: PageImage) -> Result<()> {
        self.pool.disk_manager().write_page(before.page_id, &before.data)?;
        self.pool.discard_page(before.page_id);
        self.log.log_clr(tid, before.page_id, before.data)
    }
}
