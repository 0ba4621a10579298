use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use kubephase_domain::RunConfig;
use tracing::info;

use crate::cluster::Cluster;
use crate::error::ApplyError;
use crate::watcher::KubectlWatcher;

/// A cluster reached through the `kubectl` command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kubectl {
    binary: String,
    poll_interval: Duration,
}

impl Kubectl {
    #[must_use]
    pub fn new(binary: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            binary: binary.into(),
            poll_interval,
        }
    }

    #[must_use]
    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(config.kubectl.clone(), config.poll_interval)
    }
}

#[must_use]
pub fn apply_args(rendered: &[PathBuf]) -> Vec<OsString> {
    let mut args = Vec::with_capacity(rendered.len() * 2 + 1);
    args.push(OsString::from("apply"));
    for path in rendered {
        args.push(OsString::from("-f"));
        args.push(path.clone().into_os_string());
    }
    args
}

fn forward<R: Read, W: Write>(source: Option<R>, mut sink: W) -> io::Result<u64> {
    let Some(mut source) = source else {
        return Ok(0);
    };
    let copied = io::copy(&mut source, &mut sink)?;
    sink.flush()?;
    Ok(copied)
}

impl Cluster for Kubectl {
    type Watcher = KubectlWatcher;

    fn new_watcher(&self) -> Self::Watcher {
        KubectlWatcher::new(self.binary.clone(), self.poll_interval)
    }

    fn apply(&self, rendered: &[PathBuf]) -> Result<(), ApplyError> {
        let binary_path = which::which(&self.binary).map_err(|_| ApplyError::BinaryNotFound {
            binary: self.binary.clone(),
        })?;
        let args = apply_args(rendered);
        info!(
            "{} {}",
            self.binary,
            args.iter()
                .map(|arg| arg.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let mut child = Command::new(binary_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ApplyError::CommandSpawn {
                binary: self.binary.clone(),
                source,
            })?;

        let child_stdout = child.stdout.take();
        let child_stderr = child.stderr.take();
        let (status, stdout_copy, stderr_copy) = thread::scope(|scope| {
            let stdout_task = scope.spawn(move || forward(child_stdout, io::stdout()));
            let stderr_task = scope.spawn(move || forward(child_stderr, io::stderr()));
            let status = child.wait();
            (status, stdout_task.join(), stderr_task.join())
        });

        let status = status.map_err(|source| ApplyError::CommandSpawn {
            binary: self.binary.clone(),
            source,
        })?;
        for (stream, copied) in [("stdout", stdout_copy), ("stderr", stderr_copy)] {
            match copied {
                Ok(Ok(_)) => {}
                Ok(Err(source)) => {
                    return Err(ApplyError::StreamCopy {
                        binary: self.binary.clone(),
                        stream,
                        source,
                    });
                }
                Err(_) => {
                    return Err(ApplyError::StreamThread {
                        binary: self.binary.clone(),
                        stream,
                    });
                }
            }
        }

        if status.success() {
            Ok(())
        } else {
            Err(ApplyError::CommandFailed {
                binary: self.binary.clone(),
                status,
            })
        }
    }
}
