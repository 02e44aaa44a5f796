//! Background Tasks Module
//!
//! Contains background tasks that keep a long-lived cache tidy.
//!
//! # Tasks
//! - Sweep: removes expired keys and entries past the retention window at a fixed interval

mod sweep;

pub use sweep::{run_sweep, spawn_sweep_task, SweepPolicy, SweepReport};
