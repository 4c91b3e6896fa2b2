use std::collections::{HashMap, HashSet, VecDeque};

use crate::common::TransactionId;

/// Directed graph of transactions waiting on other transactions.
///
/// An edge `a -> b` means `a` is waiting for a lock that `b` holds or has
/// requested ahead of it. In-degrees are kept alongside the adjacency sets so
/// cycle detection can run a topological sort without recounting.
#[derive(Debug, Default)]
pub struct WaitForGraph {
    edges: HashMap<TransactionId, HashSet<TransactionId>>,
    /// Only positive counts are stored
    in_degree: HashMap<TransactionId, usize>,
}

impl WaitForGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the edge `from -> to`. Self edges and duplicates are ignored.
    pub fn add_edge(&mut self, from: TransactionId, to: TransactionId) -> bool {
        if from == to {
            return false;
        }
        if !self.edges.entry(from).or_default().insert(to) {
            return false;
        }
        *self.in_degree.entry(to).or_insert(0) += 1;
        true
    }

    /// Replaces every outgoing edge of `tid` with edges to `targets`.
    pub fn set_edges(&mut self, tid: TransactionId, targets: impl IntoIterator<Item = TransactionId>) {
        self.remove_outgoing(tid);
        for target in targets {
            self.add_edge(tid, target);
        }
    }

    /// Removes every edge leaving `tid`.
    pub fn remove_outgoing(&mut self, tid: TransactionId) {
        let Some(targets) = self.edges.remove(&tid) else {
            return;
        };
        for target in targets {
            self.decrement(target);
        }
    }

    /// Removes `tid` and every edge touching it.
    pub fn remove_transaction(&mut self, tid: TransactionId) {
        self.remove_outgoing(tid);
        if self.in_degree.remove(&tid).is_none() {
            return;
        }
        self.edges.retain(|_, targets| {
            targets.remove(&tid);
            !targets.is_empty()
        });
    }

    /// Returns the transactions `tid` is waiting for.
    #[cfg(test)]
    pub fn waits_for(&self, tid: TransactionId) -> Vec<TransactionId> {
        self.edges
            .get(&tid)
            .map(|targets| targets.iter().copied().collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn has_edge(&self, from: TransactionId, to: TransactionId) -> bool {
        self.edges.get(&from).is_some_and(|targets| targets.contains(&to))
    }

    #[cfg(test)]
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Returns true if the graph contains a cycle.
    ///
    /// Runs Kahn's algorithm: repeatedly removes nodes with no incoming
    /// edges. Any node left over lies on or behind a cycle.
    pub fn has_cycle(&self) -> bool {
        let mut in_degree = self.in_degree.clone();
        let mut queue: VecDeque<TransactionId> = self
            .edges
            .keys()
            .filter(|tid| !in_degree.contains_key(tid))
            .copied()
            .collect();

        // Every node has an outgoing edge or a positive in-degree
        let mut nodes: HashSet<TransactionId> = self.edges.keys().copied().collect();
        nodes.extend(self.in_degree.keys().copied());
        let mut sorted = 0;

        while let Some(tid) = queue.pop_front() {
            sorted += 1;
            for target in self.edges.get(&tid).into_iter().flatten() {
                if let Some(count) = in_degree.get_mut(target) {
                    *count -= 1;
                    if *count == 0 {
                        in_degree.remove(target);
                        queue.push_back(*target);
                    }
                }
            }
        }

        sorted < nodes.len()
    }

    /// Returns true if `to` can be reached from `from` along wait edges.
    pub fn reaches(&self, from: TransactionId, to: TransactionId) -> bool {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([from]);

        while let Some(current) = queue.pop_front() {
            if current == to {
                return true;
            }
            if visited.insert(current) {
                queue.extend(self.edges.get(&current).into_iter().flatten().copied());
            }
        }
        false
    }

    fn decrement(&mut self, tid: TransactionId) {
        if let Some(count) = self.in_degree.get_mut(&tid) {
            *count -= 1;
            if *count == 0 {
                self.in_degree.remove(&tid);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tid(id: u64) -> TransactionId {
        TransactionId::from_raw(id)
    }

    #[test]
    fn test_no_cycle_in_chain() {
        let mut graph = WaitForGraph::new();
        graph.add_edge(tid(1), tid(2));
        graph.add_edge(tid(2), tid(3));

        assert!(!graph.has_cycle());
        assert!(graph.reaches(tid(1), tid(3)));
        assert!(!graph.reaches(tid(3), tid(1)));
    }

    #[test]
    fn test_two_node_cycle() {
        let mut graph = WaitForGraph::new();
        graph.add_edge(tid(1), tid(2));
        assert!(!graph.has_cycle());

        graph.add_edge(tid(2), tid(1));
        assert!(graph.has_cycle());
    }

    #[test]
    fn test_three_node_cycle_with_tail() {
        let mut graph = WaitForGraph::new();
        graph.add_edge(tid(4), tid(1));
        graph.add_edge(tid(1), tid(2));
        graph.add_edge(tid(2), tid(3));
        graph.add_edge(tid(3), tid(1));
        graph.add_edge(tid(3), tid(5));

        assert!(graph.has_cycle());
        graph.remove_transaction(tid(2));
        assert!(!graph.has_cycle());
    }

    #[test]
    fn test_self_and_duplicate_edges_ignored() {
        let mut graph = WaitForGraph::new();
        assert!(!graph.add_edge(tid(1), tid(1)));
        assert!(graph.add_edge(tid(1), tid(2)));
        assert!(!graph.add_edge(tid(1), tid(2)));

        assert_eq!(graph.edge_count(), 1);
        assert!(!graph.has_cycle());
    }

    #[test]
    fn test_remove_outgoing_keeps_incoming() {
        let mut graph = WaitForGraph::new();
        graph.add_edge(tid(1), tid(2));
        graph.add_edge(tid(2), tid(3));

        graph.remove_outgoing(tid(2));
        assert!(graph.has_edge(tid(1), tid(2)));
        assert!(!graph.has_edge(tid(2), tid(3)));
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_set_edges_replaces() {
        let mut graph = WaitForGraph::new();
        graph.set_edges(tid(1), [tid(2), tid(3)]);
        graph.set_edges(tid(1), [tid(4)]);

        assert_eq!(graph.waits_for(tid(1)), vec![tid(4)]);
        graph.remove_transaction(tid(4));
        assert!(graph.is_empty());
    }
}
