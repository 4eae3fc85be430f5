//! Visited-set-guarded stack of pairs awaiting comparison.

use std::collections::HashSet;

use crate::pair::NodePair;

/// LIFO of node pairs in which every pair is admitted at most once.
///
/// Pairs are deduplicated on push, so a cycle present on both sides is
/// walked once and the comparison terminates.
#[derive(Debug, Default)]
pub(crate) struct WorkList {
    stack: Vec<NodePair>,
    visited: HashSet<NodePair>,
}

impl WorkList {
    pub(crate) fn new(root: NodePair) -> Self {
        let mut list = Self::default();
        list.push(root);
        list
    }

    /// Queue `pair` unless it has been queued before. Returns `true` if it
    /// was queued.
    pub(crate) fn push(&mut self, pair: NodePair) -> bool {
        if !self.visited.insert(pair) {
            return false;
        }
        self.stack.push(pair);
        true
    }

    pub(crate) fn pop(&mut self) -> Option<NodePair> {
        self.stack.pop()
    }

    pub(crate) fn visited_count(&self) -> usize {
        self.visited.len()
    }
}
