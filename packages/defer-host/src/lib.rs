//! A single-threaded reference host for `defer-scheduler`.
//!
//! [`LocalHost`] stands in for a UI runtime's commit loop: schedulers signal
//! it on enqueue through [`LocalHost::signal`], and [`LocalHost::tick`] runs a
//! commit that flushes every registered handle, layout phase first.

pub mod local;

pub use local::{CommitReport, HostKey, HostSignal, LocalHost};
