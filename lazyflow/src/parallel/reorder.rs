use std::collections::BTreeMap;

/// Holds results that completed ahead of their turn until every lower index has been released.
#[derive(Debug)]
pub(crate) struct ReorderBuffer<R> {
    pending: BTreeMap<usize, R>,
    next: usize,
}

impl<R> ReorderBuffer<R> {
    pub(crate) fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
            next: 0,
        }
    }

    /// Stores the result of the element at `index`.
    pub(crate) fn insert(&mut self, index: usize, result: R) {
        debug_assert!(index >= self.next, "index {index} was already released");
        self.pending.insert(index, result);
    }

    /// Removes and returns the result of the next index in line, if it completed.
    pub(crate) fn pop_ready(&mut self) -> Option<R> {
        let result = self.pending.remove(&self.next)?;
        self.next += 1;

        Some(result)
    }

    /// Number of completed results waiting for a lower index.
    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}
