//! Background jobs: the weather monitor and the rescheduling worker.

pub mod monitor_loop;
pub mod reschedule_loop;

pub use monitor_loop::{run_monitor_loop, run_monitor_once};
pub use reschedule_loop::{process_conflict, run_reschedule_loop, ConflictOutcome};
