//! SQLite persistence for bookings, checks, candidates, and the queue.

pub mod bookings;
pub mod candidates;
pub mod db;
pub mod queue;
pub mod weather_checks;

pub use db::{init_database, Database};
