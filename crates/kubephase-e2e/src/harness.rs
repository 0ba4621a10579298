use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

static BUILD_KUBEPHASE: OnceLock<Result<(), String>> = OnceLock::new();

/// Environment variable the fake `kubectl` appends its arguments to.
pub const FAKE_LOG_ENV: &str = "KUBEPHASE_FAKE_LOG";
/// When set, the fake `kubectl` reports every resource as missing.
pub const FAKE_NOT_READY_ENV: &str = "KUBEPHASE_FAKE_NOT_READY";

const FAKE_KUBECTL: &str = r#"#!/bin/sh
echo "$@" >> "$KUBEPHASE_FAKE_LOG"
case "$1" in
  apply)
    echo "applied"
    ;;
  get)
    if [ -n "$KUBEPHASE_FAKE_NOT_READY" ]; then
      echo "not found" >&2
      exit 1
    fi
    echo '{"status":{"phase":"Active"}}'
    ;;
esac
"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub command_line: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RunResult {
    #[must_use]
    pub fn transcript(&self) -> String {
        format!(
            "$ {}\n[exit: {}]\n[stdout]\n{}[stderr]\n{}",
            self.command_line, self.exit_code, self.stdout, self.stderr
        )
    }
}

/// Install a fake `kubectl` into `bin_dir` that records its arguments.
///
/// # Errors
///
/// Returns an error if the script cannot be written or made executable.
#[cfg(unix)]
pub fn install_fake_kubectl(bin_dir: &Path) -> std::io::Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    fs::create_dir_all(bin_dir)?;
    let path = bin_dir.join("kubectl");
    fs::write(&path, FAKE_KUBECTL)?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
    Ok(path)
}

/// Run `kubephase` as an external process with `bin_dir` first on `PATH`.
///
/// `KUBEAPPLY_DEBUG` and `RUST_LOG` are cleared unless overridden.
///
/// # Errors
///
/// Returns an error if building/running the `kubephase` binary fails.
pub fn run_kubephase(
    bin_dir: &Path,
    args: &[&str],
    env_overrides: &[(String, String)],
) -> Result<RunResult, String> {
    ensure_kubephase_built()?;
    let bin = kubephase_bin()?;

    let mut search_path = OsString::from(bin_dir.as_os_str());
    if let Some(existing) = std::env::var_os("PATH") {
        search_path.push(":");
        search_path.push(existing);
    }

    let mut command = Command::new(bin);
    command.env("PATH", search_path);
    command.env_remove("KUBEAPPLY_DEBUG");
    command.env_remove("RUST_LOG");
    command.args(args);
    for (name, value) in env_overrides {
        command.env(name, value);
    }

    let mut command_parts = vec!["kubephase".to_string()];
    command_parts.extend(args.iter().map(|arg| (*arg).to_string()));

    let output = command
        .output()
        .map_err(|error| format!("failed to run kubephase: {error}"))?;

    Ok(RunResult {
        command_line: command_parts.join(" "),
        exit_code: output.status.code().unwrap_or(1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Write a text file, creating parent directories if needed.
///
/// # Errors
///
/// Returns an error if directories or file contents cannot be written.
pub fn write_file(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)
}

fn ensure_kubephase_built() -> Result<(), String> {
    match BUILD_KUBEPHASE.get_or_init(|| {
        let status = Command::new("cargo")
            .arg("build")
            .arg("-q")
            .arg("-p")
            .arg("kubephase")
            .status()
            .map_err(|error| format!("failed to build kubephase binary: {error}"))?;

        if status.success() {
            Ok(())
        } else {
            Err(format!(
                "failed to build kubephase binary: cargo exited with status {status}"
            ))
        }
    }) {
        Ok(()) => Ok(()),
        Err(error) => Err(error.clone()),
    }
}

fn kubephase_bin() -> Result<PathBuf, String> {
    let mut path = std::env::current_exe()
        .map_err(|error| format!("failed to determine current executable: {error}"))?;
    if !path.pop() {
        return Err("failed to resolve test executable directory".to_string());
    }
    if path.ends_with("deps") {
        let _ = path.pop();
    }
    Ok(path.join(format!("kubephase{}", std::env::consts::EXE_SUFFIX)))
}
