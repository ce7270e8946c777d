//! Bounded FIFO admission queue for one shard.
//!
//! Every mutation of a shard takes a ticket and waits until its ticket is
//! served. Tickets are served strictly in issue order, so operations on one
//! shard apply in arrival order. The queue holds at most `capacity`
//! operations (the one in flight included); beyond that the
//! [`BackpressurePolicy`] decides between failing fast and waiting.

use std::time::{Duration, Instant};

use openvenue_types::{BackpressurePolicy, OpenvenueError, Result};
use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct Tickets {
    /// Next ticket to hand out.
    issued: u64,
    /// Ticket currently allowed to run.
    serving: u64,
}

impl Tickets {
    fn depth(&self) -> usize {
        usize::try_from(self.issued - self.serving).unwrap_or(usize::MAX)
    }
}

/// Admission queue shared by all callers of one shard.
#[derive(Debug)]
pub struct WorkQueue {
    name: String,
    tickets: Mutex<Tickets>,
    changed: Condvar,
    capacity: usize,
    policy: BackpressurePolicy,
}

/// Proof that the holder is the shard's single active mutator. Dropping it
/// admits the next ticket.
#[must_use = "the turn ends as soon as the permit is dropped"]
#[derive(Debug)]
pub struct WorkPermit<'a> {
    queue: &'a WorkQueue,
}

impl WorkQueue {
    #[must_use]
    pub fn new(name: impl Into<String>, capacity: usize, policy: BackpressurePolicy) -> Self {
        Self {
            name: name.into(),
            tickets: Mutex::new(Tickets::default()),
            changed: Condvar::new(),
            capacity: capacity.max(1),
            policy,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Operations admitted and not yet finished.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.tickets.lock().depth()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Join the queue and block until it is this caller's turn.
    ///
    /// # Errors
    /// `Busy` if the queue is full under `Reject`, or stays full for the
    /// whole timeout under `Block`.
    pub fn enter(&self) -> Result<WorkPermit<'_>> {
        let mut tickets = self.tickets.lock();

        if tickets.depth() >= self.capacity {
            match self.policy {
                BackpressurePolicy::Reject => return Err(self.busy(tickets.depth())),
                BackpressurePolicy::Block { timeout_ms } => {
                    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
                    while tickets.depth() >= self.capacity {
                        if self.changed.wait_until(&mut tickets, deadline).timed_out()
                            && tickets.depth() >= self.capacity
                        {
                            return Err(self.busy(tickets.depth()));
                        }
                    }
                }
            }
        }

        let ticket = tickets.issued;
        tickets.issued += 1;
        while tickets.serving != ticket {
            self.changed.wait(&mut tickets);
        }
        Ok(WorkPermit { queue: self })
    }

    fn busy(&self, depth: usize) -> OpenvenueError {
        tracing::warn!(shard = %self.name, depth, "Shard queue full, rejecting operation");
        OpenvenueError::Busy {
            shard: self.name.clone(),
            depth,
        }
    }
}

impl Drop for WorkPermit<'_> {
    fn drop(&mut self) {
        let mut tickets = self.queue.tickets.lock();
        tickets.serving += 1;
        drop(tickets);
        self.queue.changed.notify_all();
    }
}
