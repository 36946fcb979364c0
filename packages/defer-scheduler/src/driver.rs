use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use crate::config::{Phase, SchedulerConfig};
use crate::error::CallError;
use crate::future::{self, CallFuture, Settle};
use crate::host::{Flush, FlushHandle, FlushRequest, NoHost};
use crate::proxy::{CallTable, HandlerTable, ProxyFactory};
use crate::queue::{FlushReport, PendingQueue};
use crate::record::{Record, panic_message};

/// A message reaching a queue's mutation entry point.
pub enum Action<A, T> {
    /// A named call with its arguments and the means to settle it.
    Method {
        name: String,
        args: A,
        settle: Settle<T>,
    },
    /// A fire-and-forget side effect.
    Effect(Box<dyn FnOnce() -> anyhow::Result<()>>),
}

impl<A, T> Action<A, T> {
    /// Builds a method action plus the future it will settle.
    pub fn method(name: impl Into<String>, args: A) -> (Self, CallFuture<T>) {
        let (settle, future) = future::pair();
        let action = Action::Method {
            name: name.into(),
            args,
            settle,
        };
        (action, future)
    }

    pub fn effect(effect: impl FnOnce() -> anyhow::Result<()> + 'static) -> Self {
        Action::Effect(Box::new(effect))
    }
}

impl<A, T> fmt::Debug for Action<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Method { name, .. } => f
                .debug_struct("Method")
                .field("name", name)
                .finish_non_exhaustive(),
            Action::Effect(_) => f.write_str("Effect(..)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Nothing waiting to run.
    Idle,
    /// At least one record is waiting for the host to flush.
    Pending,
    /// A flush is running handlers right now.
    Flushing,
}

/// Resets the flushing flag even if a thunk unwinds.
pub(crate) struct FlushGuard<'a>(&'a Cell<bool>);

impl<'a> FlushGuard<'a> {
    /// `None` when a flush is already in progress.
    pub(crate) fn enter(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.replace(true) { None } else { Some(Self(flag)) }
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

pub(crate) struct Core<A, T> {
    queue: PendingQueue,
    handlers: RefCell<HandlerTable<A, T>>,
    config: SchedulerConfig,
    host: Box<dyn FlushRequest>,
    flushing: Cell<bool>,
}

impl<A: 'static, T: 'static> Core<A, T> {
    pub(crate) fn enqueue_call(&self, name: &str, args: A) -> CallFuture<T> {
        let (action, future) = Action::method(name, args);
        self.dispatch(action);
        future
    }

    fn dispatch(&self, action: Action<A, T>) {
        let (name, args, settle) = match action {
            Action::Method { name, args, settle } => (name, args, settle),
            other => panic!(
                "unknown action type dispatched to method scheduler `{}`: {:?}",
                self.config.label, other
            ),
        };

        // Resolved now so the record carries the handler that was current at call time.
        let handler = self.handlers.borrow().get(&name).cloned();
        tracing::trace!(scheduler = %self.config.label, operation = %name, "enqueue call");

        let record = Record::new(move || {
            let outcome = match handler {
                Some(handler) => match panic::catch_unwind(AssertUnwindSafe(|| (handler)(args))) {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(err)) => Err(CallError::Rejected(err)),
                    Err(payload) => Err(CallError::Panicked {
                        message: panic_message(payload),
                        name,
                    }),
                },
                None => Err(CallError::UnknownOperation(name)),
            };
            settle.settle(outcome);
        });

        self.queue.enqueue(record);
        self.host.request_flush(self.config.phase);
    }

    fn state(&self) -> SchedulerState {
        if self.flushing.get() {
            SchedulerState::Flushing
        } else if self.queue.is_idle() {
            SchedulerState::Idle
        } else {
            SchedulerState::Pending
        }
    }
}

impl<A: 'static, T: 'static> Flush for Core<A, T> {
    fn flush(&self) -> FlushReport {
        let Some(_guard) = FlushGuard::enter(&self.flushing) else {
            tracing::debug!(scheduler = %self.config.label, "nested flush ignored");
            return FlushReport::default();
        };

        let pending = self.queue.pending();
        if pending == 0 {
            return FlushReport::default();
        }

        tracing::debug!(scheduler = %self.config.label, pending, "flush start");
        let report = self.queue.flush();
        tracing::debug!(scheduler = %self.config.label, ran = report.ran, "flush end");
        report
    }

    fn phase(&self) -> Phase {
        self.config.phase
    }

    fn label(&self) -> &str {
        &self.config.label
    }
}

/// Request/response batch driver.
///
/// Calls made through [`Scheduler::call`] are queued and only run when the
/// host calls [`FlushHandle::flush`] (or [`Scheduler::flush`]). Each call runs
/// once, in arrival order, and settles its future with the handler's result.
///
/// Dropping the scheduler drops every unrun call; their futures resolve to
/// [`CallError::Disposed`]. A panicking handler settles its own call with
/// [`CallError::Panicked`] when built with `panic = "unwind"`.
pub struct Scheduler<A, T> {
    core: Rc<Core<A, T>>,
    factory: ProxyFactory<A, T>,
    call: Rc<CallTable<A, T>>,
}

impl<A: 'static, T: 'static> Scheduler<A, T> {
    pub fn new(handlers: HandlerTable<A, T>) -> Self {
        Self::with_config(handlers, SchedulerConfig::default())
    }

    pub fn with_config(handlers: HandlerTable<A, T>, config: SchedulerConfig) -> Self {
        Self::with_host(handlers, config, NoHost)
    }

    pub fn with_host(
        handlers: HandlerTable<A, T>,
        config: SchedulerConfig,
        host: impl FlushRequest + 'static,
    ) -> Self {
        let core = Rc::new(Core {
            queue: PendingQueue::new(config.policy),
            handlers: RefCell::new(handlers),
            config,
            host: Box::new(host),
            flushing: Cell::new(false),
        });
        let mut factory = ProxyFactory::new(Rc::downgrade(&core));
        let call = factory.build(&core.handlers.borrow());
        Self { core, factory, call }
    }

    /// The wrapper table. Same `Rc` for as long as the callable names stay the same.
    pub fn call(&self) -> Rc<CallTable<A, T>> {
        Rc::clone(&self.call)
    }

    /// Swaps in a new handler table and returns the (possibly reused) wrapper table.
    /// Calls already queued keep the handler they were made against.
    pub fn set_handlers(&mut self, handlers: HandlerTable<A, T>) -> Rc<CallTable<A, T>> {
        self.call = self.factory.build(&handlers);
        *self.core.handlers.borrow_mut() = handlers;
        self.call()
    }

    pub fn flush_handle(&self) -> FlushHandle {
        let target: Rc<dyn Flush> = self.core.clone();
        FlushHandle::new(Rc::downgrade(&target), self.core.config.phase)
    }

    /// Runs every call queued before this point. Calls made by handlers
    /// during the flush wait for the next one.
    pub fn flush(&self) -> FlushReport {
        self.core.flush()
    }

    /// Queue-mutation entry point. Only [`Action::Method`] is meaningful here;
    /// anything else means a caller bypassed the call table and panics.
    pub fn dispatch(&self, action: Action<A, T>) {
        self.core.dispatch(action);
    }

    pub fn state(&self) -> SchedulerState {
        self.core.state()
    }

    pub fn pending(&self) -> usize {
        self.core.queue.pending()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.core.config
    }
}

impl<A, T> fmt::Debug for Scheduler<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("label", &self.core.config.label)
            .field("queued", &self.core.queue.len())
            .field("call", &self.call)
            .finish()
    }
}
