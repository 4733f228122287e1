//! Resource trait for declarative application
//!
//! A Resource is one remote object with a desired body. Applying it makes the
//! remote side match, using whatever idempotency policy the resource needs.

use crate::context::ApplyContext;
use crate::types::ApplyResult;
use anyhow::Result;
use std::fmt;

/// Core trait for declarative resources
///
/// # Example
///
/// ```
/// use declarative::{ApplyContext, ApplyResult, Resource};
///
/// #[derive(Debug)]
/// struct Index { name: String }
///
/// impl Resource for Index {
///     fn id(&self) -> String { format!("search_index:{}", self.name) }
///     fn description(&self) -> String { format!("Search index {}", self.name) }
///     fn resource_type(&self) -> &'static str { "search_index" }
///     fn apply(&self, _ctx: &ApplyContext) -> anyhow::Result<ApplyResult> {
///         Ok(ApplyResult::Replaced)
///     }
/// }
/// ```
pub trait Resource: Send + Sync + fmt::Debug {
    /// Unique identifier for this resource within a plan
    ///
    /// Examples:
    /// - "connection:aoai-main"
    /// - "search_datasource:docs-datasource"
    /// - "rai_policy:MainRAIpolicy"
    fn id(&self) -> String;

    /// Human-readable description of what this resource does
    fn description(&self) -> String;

    /// Resource type category
    ///
    /// Used for grouping and by [`ExecutionPlan::filter_by_target`](crate::ExecutionPlan::filter_by_target).
    fn resource_type(&self) -> &'static str;

    /// Ids of resources outside this resource's chain that must have been
    /// applied successfully first
    fn depends_on(&self) -> Vec<String> {
        Vec::new()
    }

    /// Make the remote state match the desired body
    fn apply(&self, ctx: &ApplyContext) -> Result<ApplyResult>;
}

/// A boxed resource for type-erased storage
pub type BoxedResource = Box<dyn Resource>;
