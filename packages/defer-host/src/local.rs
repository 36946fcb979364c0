use defer_scheduler::{FlushHandle, FlushRequest, Phase};
use slotmap::{SlotMap, new_key_type};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

new_key_type! {
    pub struct HostKey;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CommitReport {
    pub layout: usize,
    pub passive: usize,
}

impl CommitReport {
    pub fn total(&self) -> usize {
        self.layout + self.passive
    }
}

/// Shared "a flush is wanted" flag handed to schedulers as their host hook.
#[derive(Debug, Default, Clone)]
pub struct HostSignal {
    requested: Rc<Cell<bool>>,
}

impl FlushRequest for HostSignal {
    fn request_flush(&self, phase: Phase) {
        tracing::trace!(?phase, "flush requested");
        self.requested.set(true);
    }
}

struct Registration {
    handle: FlushHandle,
}

#[derive(Default)]
pub struct LocalHost {
    registrations: RefCell<SlotMap<HostKey, Registration>>,
    // Slot reuse scrambles SlotMap iteration, so keep registration order here.
    order: RefCell<Vec<HostKey>>,
    signal: HostSignal,
    commits: Cell<u64>,
}

impl LocalHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// The hook to pass to `Scheduler::with_host` / `EffectQueue::with_parts`.
    pub fn signal(&self) -> HostSignal {
        self.signal.clone()
    }

    pub fn register(&self, handle: FlushHandle) -> HostKey {
        let key = self.registrations.borrow_mut().insert(Registration { handle });
        self.order.borrow_mut().push(key);
        key
    }

    pub fn unregister(&self, key: HostKey) -> bool {
        let removed = self.registrations.borrow_mut().remove(key).is_some();
        if removed {
            self.order.borrow_mut().retain(|k| *k != key);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.registrations.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.borrow().is_empty()
    }

    /// True when nothing has asked for a flush since the last commit.
    pub fn is_idle(&self) -> bool {
        !self.signal.requested.get()
    }

    pub fn commits(&self) -> u64 {
        self.commits.get()
    }

    /// Commits if a flush was requested. Returns whether more work arrived
    /// during the commit and another tick is needed.
    pub fn tick(&self) -> bool {
        if self.is_idle() {
            return false;
        }
        self.commit();
        !self.is_idle()
    }

    /// Flushes every live handle: all layout-phase handles, then all passive
    /// ones, each group in registration order. Handles whose owner is gone
    /// are unregistered.
    pub fn commit(&self) -> CommitReport {
        self.signal.requested.set(false);
        self.prune();

        // Cloned out so flushing handlers may register or unregister.
        let handles: Vec<FlushHandle> = {
            let registrations = self.registrations.borrow();
            self.order
                .borrow()
                .iter()
                .filter_map(|key| registrations.get(*key))
                .map(|r| r.handle.clone())
                .collect()
        };

        let mut report = CommitReport::default();
        for phase in [Phase::Layout, Phase::Passive] {
            for handle in handles.iter().filter(|h| h.phase() == phase) {
                let ran = handle.flush().ran;
                match phase {
                    Phase::Layout => report.layout += ran,
                    Phase::Passive => report.passive += ran,
                }
            }
        }

        self.commits.set(self.commits.get() + 1);
        tracing::debug!(
            commit = self.commits.get(),
            layout = report.layout,
            passive = report.passive,
            "commit complete"
        );
        report
    }

    fn prune(&self) {
        let mut registrations = self.registrations.borrow_mut();
        let before = registrations.len();
        registrations.retain(|_, r| r.handle.is_alive());
        if registrations.len() != before {
            self.order.borrow_mut().retain(|key| registrations.contains_key(*key));
            tracing::debug!(dropped = before - registrations.len(), "pruned dead flush handles");
        }
    }

    /// Ticks until nothing is requested, at most `limit` times.
    /// Returns the number of commits performed.
    pub fn run_until_idle(&self, limit: usize) -> usize {
        let mut commits = 0;
        while commits < limit && !self.is_idle() {
            self.commit();
            commits += 1;
        }
        commits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_marks_host_busy() {
        let host = LocalHost::new();
        assert!(host.is_idle());
        assert!(!host.tick());

        host.signal().request_flush(Phase::Passive);
        assert!(!host.is_idle());
        assert!(!host.tick());
        assert!(host.is_idle());
        assert_eq!(host.commits(), 1);
    }

    #[test]
    fn test_unregister_unknown_key() {
        let host = LocalHost::new();
        assert!(!host.unregister(HostKey::default()));
        assert!(host.is_empty());
    }
}
