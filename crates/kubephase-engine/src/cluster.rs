use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ApplyError, WatchError};

/// Tracks resources declared in rendered manifests until they become ready.
pub trait ReadinessWatcher {
    /// Register every resource declared in one rendered manifest.
    ///
    /// # Errors
    ///
    /// Returns an error when the manifest cannot be read or does not describe
    /// recognisable resources. Nothing from the file is registered in that case.
    fn scan(&mut self, rendered: &Path) -> Result<(), WatchError>;

    /// Block until every registered resource is ready or `timeout` elapses.
    ///
    /// Returns `Ok(false)` on timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the cluster cannot be queried at all.
    fn wait(&mut self, timeout: Duration) -> Result<bool, WatchError>;
}

/// The cluster a run is applied to.
pub trait Cluster {
    type Watcher: ReadinessWatcher;

    /// Fresh watcher with nothing registered; one is used per phase.
    fn new_watcher(&self) -> Self::Watcher;

    /// Submit a batch of rendered manifests in a single apply.
    ///
    /// # Errors
    ///
    /// Returns an error when the apply tool cannot be launched, its output
    /// cannot be forwarded, or it exits unsuccessfully.
    fn apply(&self, rendered: &[PathBuf]) -> Result<(), ApplyError>;
}
