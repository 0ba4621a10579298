use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use clap::error::ErrorKind;
use kubephase_domain::{DEFAULT_KUBECTL, RunConfig};
use kubephase_engine::{Kubectl, build_context, run as run_phases};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod error;

pub use error::CliError;
pub use kubephase_engine::display_chain;

/// Environment variable consulted for debug mode when `--debug` is not given.
pub const DEBUG_ENV: &str = "KUBEAPPLY_DEBUG";

#[derive(Debug, Parser)]
#[command(
    name = "kubephase",
    about = "Apply manifest trees to a cluster in ordered phases, waiting for readiness between them"
)]
struct Cli {
    /// Manifest file or directory; repeat to add more roots.
    #[arg(short = 'f', long = "file", value_name = "PATH", required = true)]
    files: Vec<PathBuf>,
    /// Keep expanded files after each phase (defaults to $KUBEAPPLY_DEBUG).
    #[arg(
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    debug: Option<bool>,
    /// Seconds to wait for each phase to become ready.
    #[arg(short = 't', long = "timeout", value_name = "SECONDS", default_value_t = 60)]
    timeout: u64,
    /// kubectl binary used for apply and readiness checks.
    #[arg(long, value_name = "BIN", default_value = DEFAULT_KUBECTL)]
    kubectl: String,
    #[arg(long = "poll-interval-ms", value_name = "MILLIS", default_value_t = 1000)]
    poll_interval_ms: u64,
    /// YAML or JSON mapping exposed to every template.
    #[arg(long, value_name = "FILE")]
    values: Option<PathBuf>,
    #[arg(long)]
    verbose: bool,
}

/// Interpret an environment value as a boolean.
///
/// `true`, `yes`, `1` are true; `false`, `no`, `0` and the empty string are false.
/// Matching ignores case and surrounding whitespace. Any other value is true.
#[must_use]
pub fn env_bool(value: &str) -> bool {
    !matches!(
        value.trim().to_lowercase().as_str(),
        "false" | "no" | "0" | ""
    )
}

/// The flag wins when given; otherwise the environment value decides.
#[must_use]
pub fn resolve_debug(flag: Option<bool>, env_value: Option<&str>) -> bool {
    flag.unwrap_or_else(|| env_value.is_some_and(env_bool))
}

impl Cli {
    fn run_config(&self, env_debug: Option<&str>) -> RunConfig {
        RunConfig {
            debug: resolve_debug(self.debug, env_debug),
            timeout: Duration::from_secs(self.timeout),
            roots: self.files.clone(),
            kubectl: self.kubectl.clone(),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

/// Load the template data context from a YAML or JSON file.
///
/// # Errors
///
/// Returns an error when the file cannot be read or parsed, or is not a mapping.
pub fn load_values(path: &Path) -> std::result::Result<Value, CliError> {
    let text = fs::read_to_string(path).map_err(|source| CliError::ReadValues {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_yaml::from_str(&text).map_err(|source| CliError::ParseValues {
        path: path.to_path_buf(),
        source,
    })?;
    build_context(Some(&value)).map_err(|source| CliError::InvalidValues {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(value)
}

fn init_tracing(verbose: bool) {
    let default_directives = if verbose {
        "kubephase_engine=debug,kubephase_cli=debug"
    } else {
        "kubephase_engine=info,kubephase_cli=info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Run the CLI using process arguments.
///
/// # Errors
///
/// Returns an error when argument parsing fails (excluding help/version), the
/// values file is unusable, or the run hits a fatal error.
pub fn run() -> std::result::Result<i32, CliError> {
    run_from(std::env::args_os())
}

fn run_from<I, T>(args: I) -> std::result::Result<i32, CliError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(parsed) => parsed,
        Err(error) => match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{error}");
                return Ok(0);
            }
            _ => return Err(error.into()),
        },
    };
    init_tracing(cli.verbose);

    let env_debug = std::env::var_os(DEBUG_ENV).map(|value| value.to_string_lossy().into_owned());
    let config = cli.run_config(env_debug.as_deref());
    let data = cli.values.as_deref().map(load_values).transpose()?;
    let cluster = Kubectl::from_config(&config);

    let report = run_phases(&config, data.as_ref(), &cluster)?;
    if report.has_aborted_phases() {
        warn!(
            "phases aborted by registration errors: {}",
            report.aborted_phases().join(", ")
        );
    }
    info!(phases = report.outcomes.len(), "run complete");
    Ok(0)
}
