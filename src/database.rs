use std::sync::Arc;

use log::info;

use crate::access::AccessManager;
use crate::buffer::BufferPoolManager;
use crate::common::{Result, StoreConfig, TransactionId};
use crate::concurrency::LockManager;
use crate::storage::disk::DiskManager;
use crate::storage::HeapFile;
use crate::tuple::Schema;
use crate::wal::{LogFile, RecoveryManager, RecoveryStats};

/// An open store: the data files, the log and the components built on them.
///
/// Opening a database runs crash recovery before any transaction can start.
pub struct Database {
    config: StoreConfig,
    access: Arc<AccessManager>,
    recovery_stats: RecoveryStats,
}

impl Database {
    pub fn open(config: StoreConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let disk_manager = Arc::new(DiskManager::new(&config.data_dir, config.page_size)?);
        let log = LogFile::open(config.log_path())?;
        let pool = BufferPoolManager::new(config.buffer_pool_size, disk_manager);
        pool.set_evict_dirty(config.evict_dirty_allowed);

        let recovery_stats = RecoveryManager::new(&log, &pool).recover()?;
        // Identifiers restart at 1 in a new process
        if let Some(max) = log.records()?.iter().filter_map(|entry| entry.record.tid()).max() {
            TransactionId::advance_past(max);
        }
        info!(
            "opened {} (page size {}, {} frames)",
            config.data_dir.display(),
            config.page_size,
            config.buffer_pool_size
        );

        let access = AccessManager::new(pool, LockManager::new(), log, config.force);
        Ok(Self {
            config,
            access: Arc::new(access),
            recovery_stats,
        })
    }

    pub fn access(&self) -> &Arc<AccessManager> {
        &self.access
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Statistics from the recovery run at open.
    pub fn recovery_stats(&self) -> &RecoveryStats {
        &self.recovery_stats
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        self.access.pool().disk_manager()
    }

    /// Opens the heap file for a table.
    pub fn heap_file(&self, table_id: u32, schema: Arc<Schema>) -> Result<HeapFile> {
        HeapFile::open(Arc::clone(&self.access), table_id, schema)
    }
}
