//! Execution engine - provision-specific executor with UI integration

use anyhow::Result;
use colored::Colorize;

use declarative::{ApplyResult, ExecuteOptions, ExecuteSummary, ExecutionPlan, ProgressCallback, execute};

/// Prints one line per resource as the plan runs
#[derive(Debug, Default)]
pub struct UiProgress {
    verbose: bool,
}

impl UiProgress {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

fn symbol(result: &ApplyResult) -> &'static str {
    match result {
        ApplyResult::NoChange => "○",
        ApplyResult::Created | ApplyResult::Modified | ApplyResult::Replaced => "✓",
        ApplyResult::Failed { .. } => "✗",
        ApplyResult::Skipped { .. } => "⊘",
    }
}

/// One progress line, uncoloured
pub fn result_line(id: &str, result: &ApplyResult) -> String {
    format!("{} {id} {result}", symbol(result))
}

impl ProgressCallback for UiProgress {
    fn on_chain_start(&mut self, name: &str, count: usize) {
        if count > 1 {
            println!("  {} {name} {}", "→".cyan(), format!("({count} steps)").dimmed());
        }
    }

    fn on_resource_start(&mut self, id: &str, description: &str) {
        if self.verbose {
            log::debug!("{id}: {description}");
        }
    }

    fn on_resource_complete(&mut self, id: &str, result: &ApplyResult) {
        let mark = symbol(result);
        let mark = match result {
            ApplyResult::NoChange => mark.dimmed(),
            ApplyResult::Failed { .. } => mark.red(),
            ApplyResult::Skipped { .. } => mark.yellow(),
            _ => mark.green(),
        };
        println!("    {mark} {id} {}", result.to_string().dimmed());
        if self.verbose {
            log::debug!("{}", result_line(id, result));
        }
    }

    fn on_chain_complete(&mut self, _name: &str) {}
}

/// Run a plan with terminal progress and print the summary.
///
/// A strict abort is returned as an error after printing what completed.
pub fn run_plan(plan: ExecutionPlan, opts: &ExecuteOptions) -> Result<ExecuteSummary> {
    run_plan_after(plan, opts, ExecuteSummary::default())
}

/// [`run_plan`], with `prior` results (resources dropped before planning)
/// counted in the printed and returned summary, including on abort.
pub fn run_plan_after(plan: ExecutionPlan, opts: &ExecuteOptions, prior: ExecuteSummary) -> Result<ExecuteSummary> {
    if plan.is_empty() {
        println!("  {} Nothing to apply", "ℹ".blue());
        if prior.total() > 0 {
            print_summary(&prior, opts.dry_run);
        }
        return Ok(prior);
    }

    let mut progress = UiProgress::new(opts.verbose);
    match execute(plan, opts, &mut progress) {
        Ok(mut summary) => {
            summary.merge(&prior);
            print_summary(&summary, opts.dry_run);
            Ok(summary)
        }
        Err(mut aborted) => {
            aborted.summary.merge(&prior);
            print_summary(&aborted.summary, opts.dry_run);
            Err(aborted.into())
        }
    }
}

/// Print final summary
pub fn print_summary(summary: &ExecuteSummary, dry_run: bool) {
    println!();
    if dry_run {
        println!("  {} Dry run - no changes made", "ℹ".blue());
    } else if summary.is_success() {
        println!("  {} Provisioning applied successfully!", "✓".green().bold());
    } else {
        println!("  {} Provisioning applied with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} resources created", summary.created);
    }
    if summary.modified > 0 {
        println!("    • {} resources updated", summary.modified);
    }
    if summary.replaced > 0 {
        println!("    • {} resources replaced", summary.replaced);
    }
    if summary.no_change > 0 {
        println!("    • {} resources unchanged", summary.no_change);
    }
    if summary.skipped > 0 {
        println!("    • {} resources skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
        for (id, error) in &summary.failures {
            println!("      {} {id}: {error}", "✗".red());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{Aborted, ApplyContext, Chain, FailurePolicy, Resource};

    #[derive(Debug)]
    struct Fixed(&'static str, bool);

    impl Resource for Fixed {
        fn id(&self) -> String {
            self.0.to_string()
        }

        fn description(&self) -> String {
            format!("fixed {}", self.0)
        }

        fn resource_type(&self) -> &'static str {
            "fixed"
        }

        fn apply(&self, _ctx: &ApplyContext) -> Result<ApplyResult> {
            if self.1 {
                anyhow::bail!("boom");
            }
            Ok(ApplyResult::Created)
        }
    }

    fn plan() -> ExecutionPlan {
        let mut plan = ExecutionPlan::new();
        plan.add_chain(Chain::new("pair").then(Fixed("a", true)).then(Fixed("b", false)));
        plan
    }

    #[test]
    fn test_result_lines() {
        assert_eq!(result_line("a", &ApplyResult::Created), "✓ a created");
        assert_eq!(result_line("a", &ApplyResult::NoChange), "○ a unchanged");
        assert_eq!(
            result_line("b", &ApplyResult::Failed { error: "boom".into() }),
            "✗ b failed: boom"
        );
        assert_eq!(
            result_line("c", &ApplyResult::Skipped { reason: "dry run".into() }),
            "⊘ c skipped: dry run"
        );
    }

    #[test]
    fn test_run_plan_best_effort_reports_failure() {
        let summary = run_plan(plan(), &ExecuteOptions::default().best_effort()).unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
    }

    #[test]
    fn test_run_plan_strict_abort_is_error() {
        let opts = ExecuteOptions {
            policy: FailurePolicy::Strict,
            ..Default::default()
        };
        let err = run_plan(plan(), &opts).unwrap_err();
        assert!(err.to_string().contains("a failed: boom"));
    }

    #[test]
    fn test_prior_results_survive_abort() {
        let opts = ExecuteOptions {
            policy: FailurePolicy::Strict,
            ..Default::default()
        };
        let mut prior = ExecuteSummary::default();
        prior.add_result("c", &ApplyResult::Skipped { reason: "invalid".into() });

        let err = run_plan_after(plan(), &opts, prior).unwrap_err();

        let aborted = err.downcast_ref::<Aborted>().unwrap();
        assert_eq!(aborted.summary.failed, 1);
        assert_eq!(aborted.summary.skipped, 1);
    }

    #[test]
    fn test_prior_results_with_empty_plan() {
        let mut prior = ExecuteSummary::default();
        prior.add_result("c", &ApplyResult::Skipped { reason: "invalid".into() });

        let summary = run_plan_after(ExecutionPlan::new(), &ExecuteOptions::default(), prior).unwrap();
        assert_eq!(summary.skipped, 1);
    }

    #[test]
    fn test_run_plan_empty() {
        let summary = run_plan(ExecutionPlan::new(), &ExecuteOptions::default()).unwrap();
        assert_eq!(summary.total(), 0);
    }
}
