use std::collections::{HashSet, VecDeque};
use std::fmt;

use crate::common::TransactionId;

/// Lock modes supported by the lock manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Read access, compatible with other shared holders.
    Shared,
    /// Write access, held by a single transaction.
    Exclusive,
}

impl LockMode {
    /// Returns true if a holder in `self` mode and a holder in `other` mode can coexist.
    pub fn is_compatible_with(&self, other: &LockMode) -> bool {
        matches!((self, other), (LockMode::Shared, LockMode::Shared))
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Shared => write!(f, "SHARED"),
            LockMode::Exclusive => write!(f, "EXCLUSIVE"),
        }
    }
}

/// A waiting request for a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRequest {
    pub tid: TransactionId,
    pub mode: LockMode,
}

/// Lock state for a single page: the mode, its holders and the queue of
/// waiting requests.
#[derive(Debug, Default)]
pub struct LockTableEntry {
    /// None when there are no holders
    mode: Option<LockMode>,
    holders: HashSet<TransactionId>,
    requests: VecDeque<LockRequest>,
}

impl LockTableEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Option<LockMode> {
        self.mode
    }

    pub fn holders(&self) -> impl Iterator<Item = &TransactionId> {
        self.holders.iter()
    }

    pub fn requests(&self) -> impl Iterator<Item = &LockRequest> {
        self.requests.iter()
    }

    /// Returns the mode `tid` holds this lock in, if any.
    pub fn held_mode(&self, tid: TransactionId) -> Option<LockMode> {
        if self.holders.contains(&tid) {
            self.mode
        } else {
            None
        }
    }

    /// Returns true if nobody holds or waits for this lock.
    pub fn is_idle(&self) -> bool {
        self.holders.is_empty() && self.requests.is_empty()
    }

    pub fn has_request(&self, tid: TransactionId) -> bool {
        self.position(tid).is_some()
    }

    /// Returns true if `tid` can be granted the lock in `mode` right now.
    pub fn can_grant(&self, tid: TransactionId, mode: LockMode) -> bool {
        match mode {
            LockMode::Shared => {
                self.mode != Some(LockMode::Exclusive)
                    && !self.ahead_of(tid).any(|req| req.mode == LockMode::Exclusive)
            }
            LockMode::Exclusive => {
                let sole_holder = self.holders.len() == 1 && self.holders.contains(&tid);
                let at_head = match self.requests.front() {
                    None => true,
                    Some(head) => *head == LockRequest { tid, mode },
                };
                sole_holder || (self.holders.is_empty() && at_head)
            }
        }
    }

    /// Queues a request. An upgrade from shared goes to the front; anything
    /// else goes to the back. A transaction has at most one queued request.
    pub fn add_request(&mut self, tid: TransactionId, mode: LockMode) {
        if self.has_request(tid) {
            return;
        }
        let request = LockRequest { tid, mode };
        if mode == LockMode::Exclusive && self.held_mode(tid) == Some(LockMode::Shared) {
            self.requests.push_front(request);
        } else {
            self.requests.push_back(request);
        }
    }

    /// Removes any queued request of `tid`.
    pub fn remove_request(&mut self, tid: TransactionId) {
        if let Some(pos) = self.position(tid) {
            self.requests.remove(pos);
        }
    }

    /// Makes `tid` a holder in `mode`, dropping its queued request.
    pub fn grant(&mut self, tid: TransactionId, mode: LockMode) {
        self.remove_request(tid);
        self.holders.insert(tid);
        self.mode = Some(mode);
    }

    /// Removes `tid` from the holders. Returns false if it was not a holder.
    pub fn release(&mut self, tid: TransactionId) -> bool {
        let removed = self.holders.remove(&tid);
        if self.holders.is_empty() {
            self.mode = None;
        }
        removed
    }

    /// Returns the transactions `tid` must wait for before it can be
    /// granted `mode`: conflicting holders and conflicting requests queued
    /// ahead of it.
    pub fn blockers(&self, tid: TransactionId, mode: LockMode) -> Vec<TransactionId> {
        let mut blockers = Vec::new();
        if let Some(held) = self.mode {
            if !held.is_compatible_with(&mode) {
                blockers.extend(self.holders.iter().filter(|&&h| h != tid));
            }
        }
        for req in self.ahead_of(tid) {
            if req.tid != tid && !req.mode.is_compatible_with(&mode) && !blockers.contains(&req.tid) {
                blockers.push(req.tid);
            }
        }
        blockers
    }

    fn position(&self, tid: TransactionId) -> Option<usize> {
        self.requests.iter().position(|req| req.tid == tid)
    }

    /// Requests queued ahead of `tid`, or every request if `tid` is not queued.
    fn ahead_of(&self, tid: TransactionId) -> impl Iterator<Item = &LockRequest> {
        let end = self.position(tid).unwrap_or(self.requests.len());
        self.requests.iter().take(end)
    }
}
