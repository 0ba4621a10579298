use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    ArgumentParse(#[from] clap::Error),
    #[error("failed to read values file: {path}")]
    ReadValues {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse values file: {path}")]
    ParseValues {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("values file {path} is not usable as a template context")]
    InvalidValues {
        path: PathBuf,
        #[source]
        source: kubephase_engine::ExpandError,
    },
    #[error(transparent)]
    Run(#[from] kubephase_engine::RunError),
}
