//! Execution engine for provision
//!
//! Wraps the declarative executor with terminal progress and a summary.

pub mod executor;

pub use executor::{run_plan, run_plan_after};
