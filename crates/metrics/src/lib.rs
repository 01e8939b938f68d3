//! Metric names for the indus agent.
//!
//! Recording goes through the `metrics` crate facade; without an installed
//! recorder every call is a no-op.
//!
//! ```rust,ignore
//! use indus_metrics::{agent, counter};
//!
//! counter!(agent::TASKS_TOTAL, "outcome" => "executed").increment(1);
//! ```

mod definitions;

pub use definitions::*;

pub use metrics::{counter, gauge, histogram};
