//! Execution engine - applies chains strictly in order

use std::collections::HashSet;

use crate::context::{ApplyContext, NoProgress, ProgressCallback};
use crate::planner::ExecutionPlan;
use crate::resource::Resource;
use crate::types::{ApplyResult, ExecuteOptions, ExecuteSummary, FailurePolicy};

/// Raised when a [`FailurePolicy::Strict`] run hits a failure
#[derive(Debug, thiserror::Error)]
#[error("{id} failed: {error}")]
pub struct Aborted {
    pub id: String,
    pub error: String,
    /// Results up to and including the failure
    pub summary: ExecuteSummary,
}

/// Execute a plan with the given options and progress callback
///
/// Resources run one at a time. Within a chain, a failure skips the
/// remaining steps. Across chains, a resource is skipped when any id in its
/// [`Resource::depends_on`] did not complete.
///
/// With [`ExecuteOptions::target`] set, resources outside the target are
/// dropped before anything runs and never block their dependents.
///
/// # Errors
/// Returns [`Aborted`] on the first failure under [`FailurePolicy::Strict`].
pub fn execute<P: ProgressCallback>(
    plan: ExecutionPlan,
    opts: &ExecuteOptions,
    progress: &mut P,
) -> Result<ExecuteSummary, Aborted> {
    let plan = plan.filter_by_target(opts.target.as_deref());
    log::debug!("{} resources to apply", plan.total_resources());

    let ctx = ApplyContext::new(opts.verbose);
    let mut summary = ExecuteSummary::default();
    let mut blocked: HashSet<String> = HashSet::new();

    for chain in &plan.chains {
        progress.on_chain_start(&chain.name, chain.len());
        let mut broken: Option<String> = None;

        for resource in &chain.resources {
            let id = resource.id();
            progress.on_resource_start(&id, &resource.description());

            let result = match (&broken, unmet_dependency(resource.as_ref(), &blocked)) {
                (Some(failed), _) => ApplyResult::Skipped {
                    reason: format!("previous step '{failed}' did not complete"),
                },
                (None, Some(dep)) => ApplyResult::Skipped {
                    reason: format!("dependency '{dep}' did not complete"),
                },
                (None, None) if opts.dry_run => ApplyResult::Skipped {
                    reason: "dry run".to_string(),
                },
                (None, None) => apply_resource(resource.as_ref(), &ctx),
            };

            progress.on_resource_complete(&id, &result);
            summary.add_result(&id, &result);

            if let ApplyResult::Failed { error } = &result {
                log::error!("{id}: {error}");
                if opts.policy == FailurePolicy::Strict {
                    return Err(Aborted {
                        id,
                        error: error.clone(),
                        summary,
                    });
                }
            }

            if !result.unblocks_dependents() && !opts.dry_run {
                if broken.is_none() {
                    broken = Some(id.clone());
                }
                blocked.insert(id);
            }
        }

        progress.on_chain_complete(&chain.name);
    }

    Ok(summary)
}

fn unmet_dependency(resource: &dyn Resource, blocked: &HashSet<String>) -> Option<String> {
    resource.depends_on().into_iter().find(|dep| blocked.contains(dep))
}

/// Apply a single resource
fn apply_resource(resource: &dyn Resource, ctx: &ApplyContext) -> ApplyResult {
    match resource.apply(ctx) {
        Ok(result) => result,
        Err(e) => ApplyResult::Failed {
            error: format!("{e:#}"),
        },
    }
}

/// Simple execution without callbacks
pub fn execute_simple(plan: ExecutionPlan, opts: &ExecuteOptions) -> Result<ExecuteSummary, Aborted> {
    execute(plan, opts, &mut NoProgress)
}
