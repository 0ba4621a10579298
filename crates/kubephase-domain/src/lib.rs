use std::ffi::OsString;
use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Extension (without the dot) a file must carry to take part in a run.
pub const MANIFEST_EXTENSION: &str = "yaml";

/// Suffix appended to a manifest path to name its rendered output.
pub const RENDERED_SUFFIX: &str = ".o";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);
pub const DEFAULT_KUBECTL: &str = "kubectl";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainValidationError {
    #[error("not a manifest file (expected a .{MANIFEST_EXTENSION} file): {path}")]
    NotAManifest { path: PathBuf },
    #[error("phase key must be exactly two decimal digits, got \"{key}\"")]
    InvalidPhaseKey { key: String },
}

/// Returns true when `path` carries the recognised manifest extension.
#[must_use]
pub fn is_manifest_name(path: &Path) -> bool {
    path.file_name().is_some_and(|name| {
        name.as_encoded_bytes()
            .strip_suffix(MANIFEST_EXTENSION.as_bytes())
            .is_some_and(|stem| stem.ends_with(b"."))
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "PathBuf", into = "PathBuf")]
pub struct ManifestPath(PathBuf);

impl ManifestPath {
    /// Wrap a manifest path, rejecting paths without the manifest extension.
    ///
    /// # Errors
    ///
    /// Returns an error when `path` does not end in `.yaml`.
    pub fn new(path: PathBuf) -> Result<Self, DomainValidationError> {
        if is_manifest_name(&path) {
            Ok(Self(path))
        } else {
            Err(DomainValidationError::NotAManifest { path })
        }
    }

    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Where the rendered form of this manifest is written.
    #[must_use]
    pub fn rendered_path(&self) -> PathBuf {
        let mut raw: OsString = self.0.clone().into_os_string();
        raw.push(RENDERED_SUFFIX);
        PathBuf::from(raw)
    }
}

impl TryFrom<PathBuf> for ManifestPath {
    type Error = DomainValidationError;

    fn try_from(value: PathBuf) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&Path> for ManifestPath {
    type Error = DomainValidationError;

    fn try_from(value: &Path) -> Result<Self, Self::Error> {
        Self::new(value.to_path_buf())
    }
}

impl AsRef<Path> for ManifestPath {
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}

impl Deref for ManifestPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        self.as_path()
    }
}

impl fmt::Display for ManifestPath {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.display().fmt(formatter)
    }
}

impl From<ManifestPath> for PathBuf {
    fn from(value: ManifestPath) -> Self {
        value.0
    }
}

/// Two-digit ordering key taken from a manifest's file name prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhaseKey(String);

impl PhaseKey {
    /// Create a phase key from a two-digit string.
    ///
    /// # Errors
    ///
    /// Returns an error unless `key` is exactly two ASCII decimal digits.
    pub fn new(key: String) -> Result<Self, DomainValidationError> {
        let bytes = key.as_bytes();
        if bytes.len() == 2 && bytes.iter().all(u8::is_ascii_digit) {
            Ok(Self(key))
        } else {
            Err(DomainValidationError::InvalidPhaseKey { key })
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PhaseKey {
    type Error = DomainValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for PhaseKey {
    type Error = DomainValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value.to_string())
    }
}

impl fmt::Display for PhaseKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(formatter)
    }
}

impl From<PhaseKey> for String {
    fn from(value: PhaseKey) -> Self {
        value.0
    }
}

/// Manifests applied and awaited together. `key` is `None` for the catch-all phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub key: Option<PhaseKey>,
    pub manifests: Vec<ManifestPath>,
}

impl Phase {
    #[must_use]
    pub fn keyed(key: PhaseKey, manifests: Vec<ManifestPath>) -> Self {
        Self {
            key: Some(key),
            manifests,
        }
    }

    #[must_use]
    pub fn catch_all(manifests: Vec<ManifestPath>) -> Self {
        Self {
            key: None,
            manifests,
        }
    }

    #[must_use]
    pub fn is_catch_all(&self) -> bool {
        self.key.is_none()
    }

    #[must_use]
    pub fn label(&self) -> String {
        phase_label(self.key.as_ref())
    }
}

#[must_use]
pub fn phase_label(key: Option<&PhaseKey>) -> String {
    key.map_or_else(|| "catch-all".to_string(), |key| key.to_string())
}

/// Phases in execution order: keyed phases ascending, then exactly one catch-all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhasePlan {
    phases: Vec<Phase>,
}

impl PhasePlan {
    /// Assemble a plan from keyed phases and the catch-all group.
    ///
    /// Keyed phases are sorted by key; the catch-all phase is always appended last,
    /// even when it holds no manifests.
    #[must_use]
    pub fn new(mut keyed: Vec<(PhaseKey, Vec<ManifestPath>)>, catch_all: Vec<ManifestPath>) -> Self {
        keyed.sort_by(|left, right| left.0.cmp(&right.0));
        let mut phases: Vec<Phase> = keyed
            .into_iter()
            .map(|(key, manifests)| Phase::keyed(key, manifests))
            .collect();
        phases.push(Phase::catch_all(catch_all));
        Self { phases }
    }

    #[must_use]
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Phase> {
        self.phases.iter()
    }
}

impl<'a> IntoIterator for &'a PhasePlan {
    type Item = &'a Phase;
    type IntoIter = std::slice::Iter<'a, Phase>;

    fn into_iter(self) -> Self::IntoIter {
        self.phases.iter()
    }
}

/// Settings shared by every phase of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Keep rendered files on disk after each phase.
    pub debug: bool,
    pub timeout: Duration,
    pub roots: Vec<PathBuf>,
    pub kubectl: String,
    pub poll_interval: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            debug: false,
            timeout: DEFAULT_TIMEOUT,
            roots: Vec::new(),
            kubectl: DEFAULT_KUBECTL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedFile {
    pub path: PathBuf,
    /// Set when the readiness watcher accepted the file's resources.
    pub valid: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseOutcome {
    pub key: Option<PhaseKey>,
    pub rendered: Vec<RenderedFile>,
    /// True when at least one rendered file failed registration.
    pub aborted: bool,
    pub applied: bool,
    pub waited: bool,
}

impl PhaseOutcome {
    #[must_use]
    pub fn label(&self) -> String {
        phase_label(self.key.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<PhaseOutcome>,
}

impl RunReport {
    #[must_use]
    pub fn aborted_phases(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.aborted)
            .map(PhaseOutcome::label)
            .collect()
    }

    #[must_use]
    pub fn has_aborted_phases(&self) -> bool {
        self.outcomes.iter().any(|outcome| outcome.aborted)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use std::path::{Path, PathBuf};

    use super::{ManifestPath, PhaseKey, PhasePlan, is_manifest_name};

    fn manifest(path: &str) -> ManifestPath {
        ManifestPath::try_from(PathBuf::from(path)).expect("manifest path")
    }

    #[test]
    fn manifest_path_requires_yaml_extension() {
        assert!(ManifestPath::try_from(PathBuf::from("deploy/00-ns.yaml")).is_ok());
        assert!(ManifestPath::try_from(PathBuf::from("deploy/00-ns.yml")).is_err());
        assert!(ManifestPath::try_from(PathBuf::from("deploy")).is_err());
        assert!(ManifestPath::try_from(PathBuf::from("deploy/yaml")).is_err());
    }

    #[test]
    fn bare_yaml_file_name_is_a_manifest() {
        assert!(is_manifest_name(Path::new("deploy/.yaml")));
        assert!(is_manifest_name(Path::new(".yaml")));
        assert!(!is_manifest_name(Path::new("deploy/.yml")));
    }

    #[test]
    fn rendered_path_appends_suffix() {
        let path = manifest("deploy/00-ns.yaml");
        assert_eq!(path.rendered_path(), PathBuf::from("deploy/00-ns.yaml.o"));
    }

    #[test]
    fn phase_key_accepts_only_two_digits() {
        assert!(PhaseKey::try_from("07").is_ok());
        assert!(PhaseKey::try_from("7").is_err());
        assert!(PhaseKey::try_from("a7").is_err());
        assert!(PhaseKey::try_from("007").is_err());
    }

    #[test]
    fn plan_sorts_keys_and_appends_catch_all() {
        let plan = PhasePlan::new(
            vec![
                (PhaseKey::try_from("10").expect("key"), vec![manifest("10-b.yaml")]),
                (PhaseKey::try_from("00").expect("key"), vec![manifest("00-a.yaml")]),
            ],
            Vec::new(),
        );

        let labels: Vec<String> = plan.iter().map(super::Phase::label).collect();
        assert_eq!(labels, vec!["00", "10", "catch-all"]);
        assert!(plan.phases()[2].manifests.is_empty());
    }

    #[test]
    fn phase_key_serializes_as_plain_string() {
        let key = PhaseKey::try_from("42").expect("key");
        let encoded = serde_json::to_string(&key).expect("serialize");
        assert_eq!(encoded, "\"42\"");
        let decoded: Result<PhaseKey, _> = serde_json::from_str("\"4x\"");
        assert!(decoded.is_err());
    }
}
