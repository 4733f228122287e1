//! # Declarative
//!
//! Ordered, idempotent application of remote resources.
//!
//! ## Core Concepts
//!
//! - **Resource**: one remote object with a desired body and an apply policy
//! - **Chain**: resources that depend on their predecessor; a failure ends it
//! - **ExecutionPlan**: chains run one after another
//! - **Executor**: applies sequentially and enforces the [`FailurePolicy`]
//!
//! ## Example
//!
//! ```
//! use declarative::{
//!     ApplyContext, ApplyResult, Chain, ExecuteOptions, ExecutionPlan, Resource, execute_simple,
//! };
//!
//! #[derive(Debug)]
//! struct Step(&'static str);
//!
//! impl Resource for Step {
//!     fn id(&self) -> String { self.0.to_string() }
//!     fn description(&self) -> String { format!("Step {}", self.0) }
//!     fn resource_type(&self) -> &'static str { "step" }
//!     fn apply(&self, _ctx: &ApplyContext) -> anyhow::Result<ApplyResult> {
//!         Ok(ApplyResult::Created)
//!     }
//! }
//!
//! let mut plan = ExecutionPlan::new();
//! plan.add_chain(Chain::new("rag").then(Step("datasource")).then(Step("index")));
//!
//! let summary = execute_simple(plan, &ExecuteOptions::default())?;
//! assert_eq!(summary.created, 2);
//! # Ok::<(), declarative::Aborted>(())
//! ```

pub mod context;
pub mod executor;
pub mod planner;
pub mod resource;
pub mod types;

// Re-export main types at crate root
pub use context::{ApplyContext, NoProgress, ProgressCallback};
pub use executor::{Aborted, execute, execute_simple};
pub use planner::{Chain, ExecutionPlan};
pub use resource::{BoxedResource, Resource};
pub use types::{ApplyResult, ExecuteOptions, ExecuteSummary, FailurePolicy};
