use futures::channel::oneshot;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::CallError;

type Outcome<T> = Result<T, CallError>;

pub(crate) fn pair<T>() -> (Settle<T>, CallFuture<T>) {
    let (tx, rx) = oneshot::channel();
    (Settle { tx }, CallFuture { rx })
}

/// The resolve/reject side of one call. Consumed on use, so a call settles
/// at most once. Dropping it unsettled makes the future yield `Disposed`.
pub struct Settle<T> {
    tx: oneshot::Sender<Outcome<T>>,
}

impl<T> Settle<T> {
    pub fn resolve(self, value: T) {
        self.settle(Ok(value));
    }

    pub fn reject(self, error: CallError) {
        self.settle(Err(error));
    }

    pub fn settle(self, outcome: Outcome<T>) {
        // The caller may have dropped its future; nobody is left to tell.
        let _ = self.tx.send(outcome);
    }
}

/// Caller-facing handle for a deferred call.
#[must_use = "the outcome of a deferred call is only visible through its future"]
pub struct CallFuture<T> {
    rx: oneshot::Receiver<Outcome<T>>,
}

impl<T> CallFuture<T> {
    pub(crate) fn rejected(error: CallError) -> Self {
        let (settle, future) = pair();
        settle.reject(error);
        future
    }

    /// Takes the outcome if the call has settled, without waiting.
    /// Once taken, later polls report `Disposed`.
    pub fn try_take(&mut self) -> Option<Outcome<T>> {
        match self.rx.try_recv() {
            Ok(outcome) => outcome,
            Err(oneshot::Canceled) => Some(Err(CallError::Disposed)),
        }
    }
}

impl<T> Future for CallFuture<T> {
    type Output = Outcome<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(CallError::Disposed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use futures::executor::block_on;

    #[test]
    fn pending_until_resolved() {
        let (settle, mut future) = pair::<i32>();
        assert!(future.try_take().is_none());
        assert!((&mut future).now_or_never().is_none());

        settle.resolve(10);
        assert_eq!(block_on(future).unwrap(), 10);
    }

    #[test]
    fn dropped_settle_means_disposed() {
        let (settle, future) = pair::<()>();
        drop(settle);
        assert!(matches!(block_on(future), Err(CallError::Disposed)));
    }

    #[test]
    fn rejected_future_is_ready() {
        let mut future = CallFuture::<()>::rejected(CallError::UnknownOperation("nope".into()));
        assert!(matches!(future.try_take(), Some(Err(CallError::UnknownOperation(_)))));
    }
}
