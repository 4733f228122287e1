//! Apply context and progress reporting

use crate::types::ApplyResult;

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback {
    /// Called when starting a chain of dependent resources
    fn on_chain_start(&mut self, name: &str, count: usize);

    /// Called when starting to apply a single resource
    fn on_resource_start(&mut self, id: &str, description: &str);

    /// Called when a resource application completes
    fn on_resource_complete(&mut self, id: &str, result: &ApplyResult);

    /// Called when a chain completes
    fn on_chain_complete(&mut self, name: &str);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_chain_start(&mut self, _name: &str, _count: usize) {}
    fn on_resource_start(&mut self, _id: &str, _description: &str) {}
    fn on_resource_complete(&mut self, _id: &str, _result: &ApplyResult) {}
    fn on_chain_complete(&mut self, _name: &str) {}
}

/// Context passed to resource apply operations
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyContext {
    /// Whether to output verbose information
    pub verbose: bool,
}

impl ApplyContext {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}
