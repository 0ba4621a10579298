use std::fs;

use kubephase_domain::{Phase, PhaseOutcome, RenderedFile, RunConfig};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::cluster::{Cluster, ReadinessWatcher};
use crate::error::{PhaseError, display_chain};
use crate::template::expand;

/// Run one phase: expand, register, apply, clean up, then wait for readiness.
///
/// A registration failure on any file skips the apply and the wait for the
/// whole phase and is reported through [`PhaseOutcome::aborted`]. Rendered files
/// that registered cleanly are removed unless `config.debug` is set; files that
/// failed registration are always kept.
///
/// # Errors
///
/// Returns an error when template expansion fails, the apply fails, the
/// readiness watcher cannot query the cluster, or resources are not ready
/// before `config.timeout`. All of these end the run.
pub fn run_phase<C: Cluster>(
    phase: &Phase,
    data: Option<&Value>,
    config: &RunConfig,
    cluster: &C,
) -> std::result::Result<PhaseOutcome, PhaseError> {
    let label = phase.label();
    info!(phase = %label, files = phase.manifests.len(), "starting phase");

    let rendered_paths = expand(&phase.manifests, data).map_err(|source| PhaseError::Expand {
        phase: label.clone(),
        source,
    })?;

    let mut watcher = cluster.new_watcher();
    let mut rendered = Vec::with_capacity(rendered_paths.len());
    let mut aborted = false;
    for path in rendered_paths {
        match watcher.scan(&path) {
            Ok(()) => rendered.push(RenderedFile { path, valid: true }),
            Err(scan_error) => {
                error!("{}: {}", path.display(), display_chain(&scan_error));
                aborted = true;
                rendered.push(RenderedFile { path, valid: false });
            }
        }
    }

    let mut outcome = PhaseOutcome {
        key: phase.key.clone(),
        rendered,
        aborted,
        applied: false,
        waited: false,
    };

    if outcome.rendered.is_empty() {
        info!(phase = %label, "nothing to apply");
        return Ok(outcome);
    }

    if !outcome.aborted {
        let batch: Vec<_> = outcome
            .rendered
            .iter()
            .map(|file| file.path.clone())
            .collect();
        cluster.apply(&batch).map_err(|source| PhaseError::Apply {
            phase: label.clone(),
            source,
        })?;
        outcome.applied = true;
    }

    if !config.debug {
        for file in outcome.rendered.iter().filter(|file| file.valid) {
            if let Err(remove_error) = fs::remove_file(&file.path) {
                warn!("failed to remove {}: {remove_error}", file.path.display());
            }
        }
    }

    if outcome.aborted {
        warn!(phase = %label, "registration failed; skipped apply and readiness wait");
        return Ok(outcome);
    }

    let ready = watcher
        .wait(config.timeout)
        .map_err(|source| PhaseError::Watch {
            phase: label.clone(),
            source,
        })?;
    if !ready {
        return Err(PhaseError::NotReady {
            phase: label,
            timeout_secs: config.timeout.as_secs(),
        });
    }
    outcome.waited = true;
    info!(phase = %label, "phase ready");
    Ok(outcome)
}
