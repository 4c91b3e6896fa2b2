//! Strata - a single-node transactional page store
//!
//! This crate stores fixed-size records in slotted pages on disk and gives
//! concurrent transactions atomic, durable access to them. Isolation comes
//! from strict two-phase locking at page granularity; durability and
//! rollback come from a write-ahead log of whole-page images.
//!
//! # Architecture
//!
//! The system is organized into several layers:
//!
//! - **Storage Layer** (`storage`): Handles disk I/O and page organization
//!   - `DiskManager`: Reads and writes pages, one file per table
//!   - `SlottedPage`: Fixed-length record slots with an occupancy bitmap
//!   - `HeapFile`: Unordered table built on slotted pages
//!
//! - **Buffer Pool** (`buffer`): Memory management for database pages
//!   - `BufferPoolManager`: Pins pages in memory with LRU eviction
//!   - `Frame`: Per-page pin count and dirty flag
//!
//! - **Concurrency** (`concurrency`): Page-level locking
//!   - `LockManager`: Shared/exclusive locks with upgrade
//!   - `WaitForGraph`: Deadlock detection
//!
//! - **Write-Ahead Log** (`wal`): Logging and recovery
//!   - `LogFile`: Append-only log of page images
//!   - `RecoveryManager`: Rollback and crash recovery
//!
//! - **Access** (`access`): `AccessManager` coordinates locks, pins and the
//!   log for each transaction
//!
//! # Example
//!
//! ```rust,no_run
//! use strata::common::StoreConfig;
//! use strata::tuple::{DataType, Schema, TupleBuilder};
//! use strata::Database;
//!
//! let db = Database::open(StoreConfig::new("strata_data")).unwrap();
//! let schema = Schema::builder()
//!     .column("id", DataType::Integer)
//!     .column("name", DataType::Char(16))
//!     .build_arc();
//! let table = db.heap_file(1, schema.clone()).unwrap();
//!
//! let access = db.access();
//! let tid = access.begin_transaction();
//! let tuple = TupleBuilder::new(schema).value(1).value("alice").build();
//! table.insert_tuple(tid, tuple).unwrap();
//! access.transaction_complete(tid, true).unwrap();
//! ```

pub mod access;
pub mod buffer;
pub mod common;
pub mod concurrency;
pub mod database;
pub mod storage;
pub mod tuple;
pub mod wal;

// Re-export commonly used types at the crate root
pub use common::{PageId, RecordId, Result, SlotId, StrataError, TransactionId};
pub use database::Database;
