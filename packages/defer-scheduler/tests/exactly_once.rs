use defer_scheduler::{CallError, HandlerTable, Scheduler, SchedulerState};
use futures::FutureExt;
use futures::executor::block_on;
use std::cell::Cell;
use std::rc::Rc;

#[test]
fn test_double_resolves_after_flush() {
    let scheduler = Scheduler::new(HandlerTable::new().with("double", |x: i32| Ok(x * 2)));
    let mut future = scheduler.call().get("double").unwrap().call(5);

    assert!((&mut future).now_or_never().is_none(), "unsettled before flush");
    scheduler.flush();
    assert_eq!(block_on(future).unwrap(), 10);
}

#[test]
fn test_fail_rejects_with_original_message() {
    let scheduler = Scheduler::new(HandlerTable::new().with("fail", |_: ()| -> anyhow::Result<()> {
        Err(anyhow::anyhow!("boom"))
    }));
    let future = scheduler.call().call("fail", ()).unwrap();
    scheduler.flush();

    let err = block_on(future).unwrap_err();
    assert_eq!(err.to_string(), "boom");
    assert_eq!(err.handler_error().unwrap().to_string(), "boom");
}

#[test]
fn test_each_call_runs_once_across_repeated_flushes() {
    let hits = Rc::new(Cell::new(0));
    let scheduler = {
        let hits = hits.clone();
        Scheduler::new(HandlerTable::new().with("hit", move |_: ()| {
            hits.set(hits.get() + 1);
            Ok(hits.get())
        }))
    };

    let mut future = scheduler.call().call("hit", ()).unwrap();
    for _ in 0..5 {
        scheduler.flush();
    }
    assert_eq!(hits.get(), 1);
    assert_eq!(future.try_take().unwrap().unwrap(), 1);
}

#[test]
fn test_flushing_an_executed_queue_is_a_no_op() {
    let scheduler = Scheduler::new(HandlerTable::new().with("id", |x: u8| Ok(x)));
    let future = scheduler.call().call("id", 7).unwrap();

    assert_eq!(scheduler.flush().ran, 1);
    assert_eq!(scheduler.flush().ran, 0);
    assert_eq!(scheduler.flush().ran, 0);
    assert_eq!(scheduler.state(), SchedulerState::Idle);
    assert_eq!(block_on(future).unwrap(), 7);
}

#[test]
fn test_flush_with_nothing_queued() {
    let scheduler = Scheduler::<(), ()>::new(HandlerTable::new());
    assert_eq!(scheduler.flush().ran, 0);
    assert!(scheduler.call().is_empty());
}

#[test]
fn test_dropping_scheduler_disposes_pending_calls() {
    let scheduler = Scheduler::new(HandlerTable::new().with("double", |x: i32| Ok(x * 2)));
    let call = scheduler.call();
    let pending = call.call("double", 1).unwrap();

    drop(scheduler);
    assert!(matches!(block_on(pending), Err(CallError::Disposed)));

    // Wrappers outliving the scheduler reject straight away.
    let late = call.call("double", 2).unwrap();
    assert!(matches!(block_on(late), Err(CallError::Disposed)));
}

#[test]
fn test_nested_flush_is_ignored() {
    let observed = Rc::new(Cell::new(None));
    let slot = Rc::new(std::cell::RefCell::new(None::<defer_scheduler::FlushHandle>));

    let scheduler = {
        let observed = observed.clone();
        let slot = slot.clone();
        Scheduler::new(HandlerTable::new().with("reenter", move |_: ()| {
            if let Some(handle) = slot.borrow().as_ref() {
                observed.set(Some(handle.flush().ran));
            }
            Ok(())
        }))
    };
    *slot.borrow_mut() = Some(scheduler.flush_handle());

    let _ = scheduler.call().call("reenter", ()).unwrap();
    let _ = scheduler.call().call("reenter", ()).unwrap();
    assert_eq!(scheduler.flush().ran, 2);
    assert_eq!(observed.get(), Some(0));
}
