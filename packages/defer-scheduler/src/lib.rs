//! Deferred invocation scheduling.
//!
//! Calls are queued when they are made and run later, exactly once, when the
//! host decides it is safe to flush. Two disciplines share the same queue:
//!
//! - [`Scheduler`]: request/response. Each call returns a [`CallFuture`]
//!   settled by the handler's result.
//! - [`EffectQueue`]: fire-and-forget closures. Failures go to a
//!   [`DiagnosticSink`] instead of a caller.
//!
//! ```
//! use defer_scheduler::{HandlerTable, Scheduler};
//! use futures::executor::block_on;
//!
//! let scheduler = Scheduler::new(HandlerTable::new().with("double", |x: i32| Ok(x * 2)));
//! let future = scheduler.call().call("double", 5).unwrap();
//! scheduler.flush();
//! assert_eq!(block_on(future).unwrap(), 10);
//! ```

pub mod config;
pub mod driver;
pub mod effects;
pub mod error;
pub mod future;
pub mod host;
pub mod logging;
pub mod proxy;
pub mod queue;
pub mod record;
pub mod sink;

pub use config::{Phase, SchedulerConfig};
pub use driver::{Action, Scheduler, SchedulerState};
pub use effects::{EffectHandle, EffectQueue};
pub use error::{CallError, SchedulerError};
pub use future::{CallFuture, Settle};
pub use host::{Flush, FlushHandle, FlushRequest, NoHost};
pub use proxy::{CallTable, Handler, HandlerTable, Method};
pub use queue::{CoalescePolicy, FlushReport, PendingQueue};
pub use record::Record;
pub use sink::{DiagnosticSink, TracingSink};
