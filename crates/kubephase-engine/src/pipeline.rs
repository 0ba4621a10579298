use kubephase_domain::{PhasePlan, RunConfig, RunReport};
use serde_json::Value;
use tracing::{info, warn};

use crate::cluster::Cluster;
use crate::discovery::discover_all;
use crate::error::RunError;
use crate::partition::partition;
use crate::runner::run_phase;

/// Discover manifests under every configured root and group them into phases.
///
/// # Errors
///
/// Returns an error when any root cannot be walked.
pub fn plan_from_roots(config: &RunConfig) -> std::result::Result<PhasePlan, RunError> {
    let manifests = discover_all(&config.roots)?;
    let plan = partition(manifests);
    info!(
        phases = plan.phases().len(),
        "planned {}",
        plan.iter()
            .map(|phase| format!("{}({})", phase.label(), phase.manifests.len()))
            .collect::<Vec<_>>()
            .join(" ")
    );
    Ok(plan)
}

/// Run every phase of `plan` in order.
///
/// Phases run one after another. A phase aborted by a registration failure does
/// not stop the run: later phases are still applied even though they may depend
/// on resources the aborted phase never created.
///
/// # Errors
///
/// Returns the first fatal phase error; no later phase runs after it.
pub fn run_plan<C: Cluster>(
    plan: &PhasePlan,
    data: Option<&Value>,
    config: &RunConfig,
    cluster: &C,
) -> std::result::Result<RunReport, RunError> {
    let mut report = RunReport::default();
    for phase in plan {
        let outcome = run_phase(phase, data, config, cluster)?;
        if outcome.aborted {
            warn!(
                phase = %outcome.label(),
                "phase aborted; continuing with later phases, which may depend on its resources"
            );
        }
        report.outcomes.push(outcome);
    }
    Ok(report)
}

/// Plan from the configured roots, then run every phase.
///
/// # Errors
///
/// Returns an error when discovery fails or any phase hits a fatal error.
pub fn run<C: Cluster>(
    config: &RunConfig,
    data: Option<&Value>,
    cluster: &C,
) -> std::result::Result<RunReport, RunError> {
    let plan = plan_from_roots(config)?;
    run_plan(&plan, data, config, cluster)
}
