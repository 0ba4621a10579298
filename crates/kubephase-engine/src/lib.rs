mod cluster;
mod discovery;
mod error;
mod kubectl;
mod partition;
mod pipeline;
mod runner;
mod template;
#[cfg(test)]
mod testing;
mod watcher;

pub use cluster::{Cluster, ReadinessWatcher};
pub use discovery::{discover_all, discover_manifests};
pub use error::{
    ApplyError, DiscoveryError, ExpandError, PhaseError, RunError, WatchError, display_chain,
};
pub use kubectl::{Kubectl, apply_args};
pub use partition::{extract_phase_key, partition};
pub use pipeline::{plan_from_roots, run, run_plan};
pub use runner::run_phase;
pub use template::{build_context, expand, render_manifest};
pub use watcher::{KubectlWatcher, ResourceRef, parse_resources, resource_ready};
