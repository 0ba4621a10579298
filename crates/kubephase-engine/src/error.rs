use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("manifest root does not exist: {root}")]
    RootDoesNotExist { root: PathBuf },
    #[error("failed while walking manifest root {root}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

#[derive(Debug, Error)]
pub enum ExpandError {
    #[error("{path}: failed to read template")]
    ReadTemplate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path}: failed to parse template")]
    Parse {
        path: PathBuf,
        #[source]
        source: tera::Error,
    },
    #[error("{path}: failed to render template")]
    Render {
        path: PathBuf,
        #[source]
        source: tera::Error,
    },
    #[error("{path}: failed to write rendered manifest")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("data context must be a mapping, got {found}")]
    ContextNotMapping { found: &'static str },
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to read manifest")]
    Read {
        #[source]
        source: io::Error,
    },
    #[error("document {index}: invalid YAML")]
    Yaml {
        index: usize,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("document {index}: expected a mapping")]
    NotAMapping { index: usize },
    #[error("document {index}: missing \"{field}\"")]
    MissingField { index: usize, field: &'static str },
    #[error("failed to execute {binary}")]
    CommandSpawn {
        binary: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("binary \"{binary}\" not found on PATH")]
    BinaryNotFound { binary: String },
    #[error("failed to execute {binary}")]
    CommandSpawn {
        binary: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to forward {stream} of {binary}")]
    StreamCopy {
        binary: String,
        stream: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("{stream} forwarder of {binary} panicked")]
    StreamThread { binary: String, stream: &'static str },
    #[error("{binary} apply exited with non-zero status: {status}")]
    CommandFailed { binary: String, status: ExitStatus },
}

#[derive(Debug, Error)]
pub enum PhaseError {
    #[error("phase {phase}: expansion failed")]
    Expand {
        phase: String,
        #[source]
        source: ExpandError,
    },
    #[error("phase {phase}: apply failed")]
    Apply {
        phase: String,
        #[source]
        source: ApplyError,
    },
    #[error("phase {phase}: readiness check failed")]
    Watch {
        phase: String,
        #[source]
        source: WatchError,
    },
    #[error("phase {phase}: resources not ready after {timeout_secs}s")]
    NotReady { phase: String, timeout_secs: u64 },
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Phase(#[from] PhaseError),
}

/// Render an error and its `source()` chain as `outer: inner: root`.
#[must_use]
pub fn display_chain(error: &dyn std::error::Error) -> String {
    let mut full = error.to_string();
    let mut current = error.source();
    while let Some(source) = current {
        full.push_str(": ");
        full.push_str(&source.to_string());
        current = source.source();
    }
    full
}
