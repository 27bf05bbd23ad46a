//! Weather risk monitoring and rescheduling service for flight-training
//! bookings.
//!
//! Two background jobs do the work: the monitor evaluates upcoming lessons
//! against per-tier weather minimums, and the worker turns conflicts into
//! validated reschedule candidates. A small REST API exposes their state.

pub mod api;
pub mod backoff;
pub mod config;
pub mod loops;
pub mod notify;
pub mod persistence;
pub mod state;
pub mod suggest;
