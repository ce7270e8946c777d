//! A shard: one market's or one pool's state plus its admission queue.

use openvenue_types::{BackpressurePolicy, Result};
use parking_lot::RwLock;

use crate::work_queue::WorkQueue;

/// Exclusive owner of one unit of mutable state.
///
/// Mutations are admitted through the [`WorkQueue`] one at a time, in
/// arrival order, and run under the write lock. Reads take the read lock
/// directly and so wait at most for the mutation in flight.
#[derive(Debug)]
pub struct Shard<S> {
    queue: WorkQueue,
    state: RwLock<S>,
}

impl<S> Shard<S> {
    pub fn new(
        name: impl Into<String>,
        state: S,
        capacity: usize,
        policy: BackpressurePolicy,
    ) -> Self {
        Self {
            queue: WorkQueue::new(name, capacity, policy),
            state: RwLock::new(state),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.queue.name()
    }

    /// Run `op` as the shard's single mutator.
    ///
    /// `op` must be bounded and free of I/O: later arrivals queue behind it.
    pub fn mutate<R>(&self, op: impl FnOnce(&mut S) -> Result<R>) -> Result<R> {
        let _permit = self.queue.enter()?;
        let mut state = self.state.write();
        op(&mut state)
    }

    pub fn read<R>(&self, op: impl FnOnce(&S) -> R) -> R {
        op(&self.state.read())
    }

    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.queue.depth()
    }
}
