use std::fmt;
use std::rc::Weak;

use crate::config::Phase;
use crate::queue::FlushReport;

/// Notification hook fired on every enqueue. The host reacts by scheduling a
/// flush at its next opportunity; how and when is up to the host.
pub trait FlushRequest {
    fn request_flush(&self, phase: Phase);
}

/// A host that is never told anything. Flushes must be driven by hand.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHost;

impl FlushRequest for NoHost {
    fn request_flush(&self, _phase: Phase) {}
}

impl<F> FlushRequest for F
where
    F: Fn(Phase),
{
    fn request_flush(&self, phase: Phase) {
        self(phase)
    }
}

/// Anything that owns a pending queue a host can drain.
pub trait Flush {
    fn flush(&self) -> FlushReport;
    fn phase(&self) -> Phase;
    fn label(&self) -> &str;
}

/// The explicit "run pending now" handle given to a host.
///
/// It does not keep its scheduler alive; flushing a handle whose scheduler is
/// gone runs nothing.
#[derive(Clone)]
pub struct FlushHandle {
    target: Weak<dyn Flush>,
    phase: Phase,
}

impl FlushHandle {
    pub(crate) fn new(target: Weak<dyn Flush>, phase: Phase) -> Self {
        Self { target, phase }
    }

    pub fn flush(&self) -> FlushReport {
        match self.target.upgrade() {
            Some(target) => target.flush(),
            None => FlushReport::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_alive(&self) -> bool {
        self.target.strong_count() > 0
    }
}

impl fmt::Debug for FlushHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlushHandle")
            .field("phase", &self.phase)
            .field("alive", &self.is_alive())
            .finish()
    }
}
