//! Core types for declarative resource application

use std::fmt;

/// Result of applying a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyResult {
    /// Remote state already matched
    NoChange,
    /// Resource did not exist and was created
    Created,
    /// Existing resource was updated in place
    Modified,
    /// Existing resource was deleted and recreated
    Replaced,
    /// Apply failed
    Failed { error: String },
    /// Apply was not attempted
    Skipped { reason: String },
}

impl ApplyResult {
    /// Check if the result represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Check if the result represents a change
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Created | Self::Modified | Self::Replaced)
    }

    /// Whether resources that depend on this one may still be applied
    pub fn unblocks_dependents(&self) -> bool {
        !matches!(self, Self::Failed { .. } | Self::Skipped { .. })
    }
}

impl fmt::Display for ApplyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoChange => write!(f, "unchanged"),
            Self::Created => write!(f, "created"),
            Self::Modified => write!(f, "updated"),
            Self::Replaced => write!(f, "replaced"),
            Self::Failed { error } => write!(f, "failed: {error}"),
            Self::Skipped { reason } => write!(f, "skipped: {reason}"),
        }
    }
}

/// What the executor does when a resource fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Abort the whole run on the first failure
    #[default]
    Strict,
    /// Skip the rest of the failed chain and keep going
    BestEffort,
}

/// Summary of execution results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteSummary {
    pub created: usize,
    pub modified: usize,
    pub replaced: usize,
    pub skipped: usize,
    pub failed: usize,
    pub no_change: usize,
    /// Ids of failed resources with their error, in execution order
    pub failures: Vec<(String, String)>,
}

impl ExecuteSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.modified + self.replaced
    }

    /// Resources that ended in a good state (changed or already correct)
    pub fn succeeded(&self) -> usize {
        self.total_changes() + self.no_change
    }

    /// Check if execution was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of resources processed
    pub fn total(&self) -> usize {
        self.succeeded() + self.skipped + self.failed
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: &ExecuteSummary) {
        self.created += other.created;
        self.modified += other.modified;
        self.replaced += other.replaced;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.no_change += other.no_change;
        self.failures.extend(other.failures.iter().cloned());
    }

    /// Add a result to the summary
    pub fn add_result(&mut self, id: &str, result: &ApplyResult) {
        match result {
            ApplyResult::NoChange => self.no_change += 1,
            ApplyResult::Created => self.created += 1,
            ApplyResult::Modified => self.modified += 1,
            ApplyResult::Replaced => self.replaced += 1,
            ApplyResult::Failed { error } => {
                self.failed += 1;
                self.failures.push((id.to_string(), error.clone()));
            }
            ApplyResult::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// Options for execution
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Verbose output
    pub verbose: bool,
    pub policy: FailurePolicy,
    /// Only apply resources matching `type` or `type.name`
    pub target: Option<String>,
}

impl ExecuteOptions {
    pub fn best_effort(mut self) -> Self {
        self.policy = FailurePolicy::BestEffort;
        self
    }

    pub fn with_target(mut self, target: Option<String>) -> Self {
        self.target = target;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let mut summary = ExecuteSummary::default();
        summary.add_result("a", &ApplyResult::Created);
        summary.add_result("b", &ApplyResult::Replaced);
        summary.add_result("c", &ApplyResult::NoChange);
        summary.add_result("d", &ApplyResult::Failed { error: "409".into() });
        summary.add_result("e", &ApplyResult::Skipped { reason: "dep".into() });

        assert_eq!(summary.total(), 5);
        assert_eq!(summary.total_changes(), 2);
        assert_eq!(summary.succeeded(), 3);
        assert!(!summary.is_success());
        assert_eq!(summary.failures, vec![("d".to_string(), "409".to_string())]);
    }

    #[test]
    fn test_merge() {
        let mut a = ExecuteSummary::default();
        a.add_result("x", &ApplyResult::Created);
        let mut b = ExecuteSummary::default();
        b.add_result("y", &ApplyResult::Failed { error: "boom".into() });

        a.merge(&b);

        assert_eq!(a.created, 1);
        assert_eq!(a.failed, 1);
        assert_eq!(a.failures.len(), 1);
    }

    #[test]
    fn test_unblocks_dependents() {
        assert!(ApplyResult::NoChange.unblocks_dependents());
        assert!(ApplyResult::Replaced.unblocks_dependents());
        assert!(!ApplyResult::Failed { error: String::new() }.unblocks_dependents());
        assert!(!ApplyResult::Skipped { reason: String::new() }.unblocks_dependents());
    }
}
