//! Per-session queue of pending operations.

use canvex_core::protocol::Operation;

/// Ordered, append-only buffer for one frame. Never reorders, splits or
/// coalesces.
#[derive(Debug, Default)]
pub struct OperationQueue {
    ops: Vec<Operation>,
}

impl OperationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, op: Operation) {
        self.ops.push(op);
    }

    /// Remove and return everything queued so far, in enqueue order.
    pub fn drain_all(&mut self) -> Vec<Operation> {
        std::mem::take(&mut self.ops)
    }

    /// Drop pending operations without flushing them.
    pub fn discard(&mut self) -> usize {
        let dropped = self.ops.len();
        self.ops.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
