use std::collections::{HashMap, HashSet};

use log::{debug, warn};
use parking_lot::{Condvar, Mutex};

use crate::common::{PageId, Result, StrataError, TransactionId};

use super::{LockMode, LockTableEntry, WaitForGraph};

/// Everything guarded by the lock manager's monitor
#[derive(Default)]
struct LockState {
    table: HashMap<PageId, LockTableEntry>,
    graph: WaitForGraph,
    /// Order of first contact with the lock manager; smaller is older
    timestamps: HashMap<TransactionId, u64>,
    next_timestamp: u64,
    /// Waiting transactions chosen to abort by an older transaction
    victims: HashSet<TransactionId>,
}

impl LockState {
    fn holds(&self, tid: TransactionId, page_id: PageId, mode: LockMode) -> bool {
        let held = self.table.get(&page_id).and_then(|entry| entry.held_mode(tid));
        match (held, mode) {
            (None, _) => false,
            (Some(_), LockMode::Shared) => true,
            (Some(held), LockMode::Exclusive) => held == LockMode::Exclusive,
        }
    }

    fn timestamp(&mut self, tid: TransactionId) -> u64 {
        let next = &mut self.next_timestamp;
        *self.timestamps.entry(tid).or_insert_with(|| {
            let ts = *next;
            *next += 1;
            ts
        })
    }

    /// Withdraws a waiting request and forgets the transaction's edges.
    fn withdraw(&mut self, tid: TransactionId, page_id: PageId) {
        if let Some(entry) = self.table.get_mut(&page_id) {
            entry.remove_request(tid);
            if entry.is_idle() {
                self.table.remove(&page_id);
            }
        }
        self.graph.remove_transaction(tid);
        self.victims.remove(&tid);
    }
}

/// Page-granularity shared/exclusive lock manager with deadlock detection.
///
/// Waiting requests are queued per page and waiters block on a single
/// condition variable that is notified on every release. Each time a request
/// has to wait, the wait-for graph is updated and checked for a cycle. When a
/// deadlock is found the younger transaction on the cycle is aborted: the
/// requester aborts itself if it is waiting on an older transaction on the
/// cycle, otherwise the younger waiters are marked and abort when they wake.
pub struct LockManager {
    state: Mutex<LockState>,
    cond: Condvar,
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            cond: Condvar::new(),
        }
    }

    /// Acquires a lock on `page_id`, blocking until it is granted.
    ///
    /// Returns `TransactionAborted` if the transaction was chosen to break a
    /// deadlock. The caller is expected to abort the transaction.
    pub fn acquire_lock(&self, tid: TransactionId, page_id: PageId, mode: LockMode) -> Result<()> {
        let mut state = self.state.lock();
        if state.holds(tid, page_id, mode) {
            return Ok(());
        }
        let ts = state.timestamp(tid);
        let mut queued = false;

        loop {
            if state.victims.contains(&tid) {
                state.withdraw(tid, page_id);
                self.cond.notify_all();
                warn!("{} aborted: chosen as deadlock victim on page {}", tid, page_id);
                return Err(StrataError::TransactionAborted(tid));
            }

            let entry = state.table.entry(page_id).or_default();
            if entry.can_grant(tid, mode) {
                entry.grant(tid, mode);
                state.graph.remove_outgoing(tid);
                return Ok(());
            }

            if !queued {
                entry.add_request(tid, mode);
                queued = true;
                debug!("{} waits for {} lock on page {}", tid, mode, page_id);
            }
            let blockers = entry.blockers(tid, mode);
            state.graph.set_edges(tid, blockers.iter().copied());

            if state.graph.has_cycle() {
                let on_cycle: Vec<TransactionId> = blockers
                    .into_iter()
                    .filter(|&b| state.graph.reaches(b, tid))
                    .collect();
                let older = on_cycle
                    .iter()
                    .any(|b| state.timestamps.get(b).is_some_and(|&other| other < ts));

                if older {
                    state.withdraw(tid, page_id);
                    self.cond.notify_all();
                    warn!("{} aborted: deadlock on page {}", tid, page_id);
                    return Err(StrataError::TransactionAborted(tid));
                }
                if !on_cycle.is_empty() {
                    for victim in on_cycle {
                        debug!("{} marks {} as deadlock victim", tid, victim);
                        state.victims.insert(victim);
                    }
                    self.cond.notify_all();
                }
            }

            self.cond.wait(&mut state);
        }
    }

    /// Releases the lock `tid` holds on `page_id`.
    pub fn release_lock(&self, tid: TransactionId, page_id: PageId) -> Result<()> {
        let mut state = self.state.lock();
        let state = &mut *state;

        let entry = state
            .table
            .get_mut(&page_id)
            .filter(|entry| entry.held_mode(tid).is_some())
            .ok_or(StrataError::LockNotHeld { tid, page_id })?;

        entry.release(tid);
        if entry.requests().next().is_some() {
            state.graph.remove_transaction(tid);
        }
        if entry.is_idle() {
            state.table.remove(&page_id);
        }

        self.cond.notify_all();
        Ok(())
    }

    /// Releases every lock held by `tid` and forgets the transaction.
    pub fn release_all(&self, tid: TransactionId) {
        let mut state = self.state.lock();

        state.table.retain(|_, entry| {
            entry.release(tid);
            entry.remove_request(tid);
            !entry.is_idle()
        });
        state.graph.remove_transaction(tid);
        state.timestamps.remove(&tid);
        state.victims.remove(&tid);

        self.cond.notify_all();
    }

    /// Returns true if `tid` holds a lock on `page_id` at least as strong as `mode`.
    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId, mode: LockMode) -> bool {
        self.state.lock().holds(tid, page_id, mode)
    }

    /// Returns the pages `tid` holds a lock on.
    pub fn pages_held_by(&self, tid: TransactionId) -> Vec<PageId> {
        let state = self.state.lock();
        state
            .table
            .iter()
            .filter(|(_, entry)| entry.held_mode(tid).is_some())
            .map(|(&page_id, _)| page_id)
            .collect()
    }

    /// Returns the transactions holding a lock on `page_id`.
    pub fn holders_of(&self, page_id: PageId) -> Vec<TransactionId> {
        let state = self.state.lock();
        state
            .table
            .get(&page_id)
            .map(|entry| entry.holders().copied().collect())
            .unwrap_or_default()
    }

    /// Returns the mode of the lock on `page_id`, if anyone holds it.
    pub fn lock_mode(&self, page_id: PageId) -> Option<LockMode> {
        self.state.lock().table.get(&page_id).and_then(LockTableEntry::mode)
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}
