use std::cell::Cell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use crate::config::{Phase, SchedulerConfig};
use crate::driver::{Action, FlushGuard};
use crate::error::SchedulerError;
use crate::host::{Flush, FlushHandle, FlushRequest, NoHost};
use crate::queue::{CoalescePolicy, FlushReport, PendingQueue};
use crate::record::{Record, panic_message};
use crate::sink::{DiagnosticSink, TracingSink};

struct EffectCore {
    queue: PendingQueue,
    sink: Rc<dyn DiagnosticSink>,
    config: SchedulerConfig,
    host: Box<dyn FlushRequest>,
    flushing: Cell<bool>,
}

impl EffectCore {
    fn push(&self, effect: Box<dyn FnOnce() -> anyhow::Result<()>>) {
        let sink = Rc::clone(&self.sink);
        let label = self.config.label.clone();
        self.queue.enqueue(Record::new(move || {
            let failure = match panic::catch_unwind(AssertUnwindSafe(effect)) {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(err),
                Err(payload) => Some(anyhow::anyhow!("effect panicked: {}", panic_message(payload))),
            };
            if let Some(err) = failure {
                sink.report(&label, &err);
            }
        }));
        tracing::trace!(scheduler = %self.config.label, "enqueue effect");
        self.host.request_flush(self.config.phase);
    }
}

impl Flush for EffectCore {
    fn flush(&self) -> FlushReport {
        let Some(_guard) = FlushGuard::enter(&self.flushing) else {
            tracing::debug!(scheduler = %self.config.label, "nested flush ignored");
            return FlushReport::default();
        };
        if self.queue.is_idle() {
            return FlushReport::default();
        }
        let report = self.queue.flush();
        tracing::debug!(scheduler = %self.config.label, ran = report.ran, "effects flushed");
        report
    }

    fn phase(&self) -> Phase {
        self.config.phase
    }

    fn label(&self) -> &str {
        &self.config.label
    }
}

/// Fire-and-forget queue of zero-argument side effects.
///
/// Effects have no caller waiting on them. A failing (or panicking) effect is
/// reported to the diagnostic sink and the rest of the batch carries on.
/// Panic isolation needs `panic = "unwind"`, and the process panic hook still
/// sees the panic first (see [`crate::CallError::Panicked`]).
pub struct EffectQueue {
    core: Rc<EffectCore>,
}

impl EffectQueue {
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default().with_label("effects"))
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        Self::with_parts(config, NoHost, TracingSink)
    }

    /// Effects always coalesce continuously. Any other policy in `config` is
    /// replaced, with a warning, and [`EffectQueue::config`] shows what is used.
    pub fn with_parts(
        mut config: SchedulerConfig,
        host: impl FlushRequest + 'static,
        sink: impl DiagnosticSink + 'static,
    ) -> Self {
        if config.policy != CoalescePolicy::Continuous {
            tracing::warn!(
                scheduler = %config.label,
                requested = ?config.policy,
                "effect queues only support continuous coalescing"
            );
            config.policy = CoalescePolicy::Continuous;
        }
        Self {
            core: Rc::new(EffectCore {
                queue: PendingQueue::new(CoalescePolicy::Continuous),
                sink: Rc::new(sink),
                config,
                host: Box::new(host),
                flushing: Cell::new(false),
            }),
        }
    }

    pub fn add_effect(&self, effect: impl FnOnce() -> anyhow::Result<()> + 'static) {
        self.core.push(Box::new(effect));
    }

    /// A handle code elsewhere can register effects through. It does not keep
    /// the queue alive.
    pub fn handle(&self) -> EffectHandle {
        EffectHandle {
            core: Rc::downgrade(&self.core),
        }
    }

    pub fn flush_handle(&self) -> FlushHandle {
        let target: Rc<dyn Flush> = self.core.clone();
        FlushHandle::new(Rc::downgrade(&target), self.core.config.phase)
    }

    pub fn flush(&self) -> FlushReport {
        self.core.flush()
    }

    /// Accepts only [`Action::Effect`]; a method call has no business here and panics.
    pub fn dispatch<A, T>(&self, action: Action<A, T>) {
        match action {
            Action::Effect(effect) => self.core.push(effect),
            other => panic!(
                "unknown action type dispatched to effect queue `{}`: {:?}",
                self.core.config.label, other
            ),
        }
    }

    pub fn pending(&self) -> usize {
        self.core.queue.pending()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.core.config
    }

    pub fn is_idle(&self) -> bool {
        self.core.queue.is_idle()
    }
}

impl Default for EffectQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EffectQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectQueue")
            .field("label", &self.core.config.label)
            .field("pending", &self.core.queue.pending())
            .finish()
    }
}

/// Registration side of an [`EffectQueue`], passed explicitly to whoever needs it.
#[derive(Clone)]
pub struct EffectHandle {
    core: Weak<EffectCore>,
}

impl EffectHandle {
    pub fn add_effect(
        &self,
        effect: impl FnOnce() -> anyhow::Result<()> + 'static,
    ) -> Result<(), SchedulerError> {
        let core = self.core.upgrade().ok_or(SchedulerError::Disposed)?;
        core.push(Box::new(effect));
        Ok(())
    }
}

impl fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectHandle")
            .field("alive", &(self.core.strong_count() > 0))
            .finish()
    }
}
