use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::record::Record;

/// How executed records leave the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CoalescePolicy {
    /// Executed records are dropped from the front on every enqueue and
    /// everywhere after every flush. Each record is independent of the others.
    #[default]
    Continuous,
    /// Either every record has run or none has. A new record joins the pending
    /// batch while its head is unexecuted, and otherwise replaces the whole
    /// queue. Nothing is dropped after a flush.
    ///
    /// Late calls get coupled to whatever batch is still waiting, which is why
    /// this is not the default.
    Gated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Records whose thunk ran during this flush.
    pub ran: usize,
}

/// A FIFO queue of invocation records.
/// Single-threaded, so the records live behind a RefCell.
#[derive(Debug, Default)]
pub struct PendingQueue {
    records: RefCell<VecDeque<Rc<Record>>>,
    policy: CoalescePolicy,
}

impl PendingQueue {
    pub fn new(policy: CoalescePolicy) -> Self {
        Self {
            records: RefCell::new(VecDeque::new()),
            policy,
        }
    }

    pub fn policy(&self) -> CoalescePolicy {
        self.policy
    }

    pub fn enqueue(&self, record: Rc<Record>) {
        let mut records = self.records.borrow_mut();
        match self.policy {
            CoalescePolicy::Continuous => {
                // Flushes run records in arrival order, so executed ones form a prefix.
                while records.front().is_some_and(|r| r.is_executed()) {
                    records.pop_front();
                }
            }
            CoalescePolicy::Gated => {
                let head_pending = records.front().is_some_and(|head| !head.is_executed());
                if !head_pending {
                    records.clear();
                }
            }
        }
        records.push_back(record);
    }

    /// Runs every unexecuted record present right now, in arrival order.
    ///
    /// The batch is snapshotted first: thunks may enqueue (or, under the gated
    /// policy, replace the queue) while the flush runs, and those arrivals wait
    /// for the next flush.
    pub fn flush(&self) -> FlushReport {
        let batch: Vec<Rc<Record>> = self
            .records
            .borrow()
            .iter()
            .filter(|r| !r.is_executed())
            .cloned()
            .collect();

        let mut report = FlushReport::default();
        for record in &batch {
            if record.run_once() {
                report.ran += 1;
            }
        }

        if self.policy == CoalescePolicy::Continuous {
            self.coalesce();
        }
        report
    }

    /// Drops every executed record.
    pub fn coalesce(&self) {
        self.records.borrow_mut().retain(|r| !r.is_executed());
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    /// Number of records still waiting to run.
    pub fn pending(&self) -> usize {
        self.records.borrow().iter().filter(|r| !r.is_executed()).count()
    }

    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }
}
