#![allow(clippy::expect_used, clippy::new_without_default)]

use std::cell::{Ref, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use kubephase_domain::ManifestPath;

use crate::cluster::{Cluster, ReadinessWatcher};
use crate::error::{ApplyError, WatchError};

/// Rendered content containing this text fails registration.
pub const INVALID_MARKER: &str = "invalid: true";

pub fn write_manifest(dir: &Path, name: &str, content: &str) -> ManifestPath {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent directories");
    }
    fs::write(&path, content).expect("write manifest");
    ManifestPath::try_from(path).expect("manifest path")
}

#[derive(Debug, Default)]
pub struct Calls {
    pub scans: Vec<PathBuf>,
    pub applies: Vec<Vec<PathBuf>>,
    pub waits: usize,
    pub rendered_present_at_wait: Vec<bool>,
}

pub struct FakeCluster {
    calls: Rc<RefCell<Calls>>,
    ready: bool,
    fail_apply: bool,
    fail_wait: bool,
    block_cleanup: bool,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self {
            calls: Rc::default(),
            ready: true,
            fail_apply: false,
            fail_wait: false,
            block_cleanup: false,
        }
    }

    pub fn never_ready() -> Self {
        Self {
            ready: false,
            ..Self::new()
        }
    }

    pub fn failing_apply() -> Self {
        Self {
            fail_apply: true,
            ..Self::new()
        }
    }

    pub fn failing_wait() -> Self {
        Self {
            fail_wait: true,
            ..Self::new()
        }
    }

    /// Registered files are swapped for non-empty directories so cleanup fails.
    pub fn blocking_cleanup() -> Self {
        Self {
            block_cleanup: true,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Ref<'_, Calls> {
        self.calls.borrow()
    }
}

pub struct FakeWatcher {
    calls: Rc<RefCell<Calls>>,
    ready: bool,
    fail_wait: bool,
    block_cleanup: bool,
    registered: Vec<PathBuf>,
}

impl ReadinessWatcher for FakeWatcher {
    fn scan(&mut self, rendered: &Path) -> Result<(), WatchError> {
        self.calls.borrow_mut().scans.push(rendered.to_path_buf());
        let content = fs::read_to_string(rendered).map_err(|source| WatchError::Read { source })?;
        if content.contains(INVALID_MARKER) {
            return Err(WatchError::MissingField {
                index: 0,
                field: "kind",
            });
        }
        if self.block_cleanup {
            fs::remove_file(rendered).expect("remove rendered file");
            fs::create_dir(rendered).expect("replace rendered file with a directory");
            fs::write(rendered.join("keep"), "").expect("populate directory");
        }
        self.registered.push(rendered.to_path_buf());
        Ok(())
    }

    fn wait(&mut self, _timeout: Duration) -> Result<bool, WatchError> {
        let mut calls = self.calls.borrow_mut();
        calls.waits += 1;
        calls
            .rendered_present_at_wait
            .extend(self.registered.iter().map(|path| path.exists()));
        if self.fail_wait {
            return Err(WatchError::CommandSpawn {
                binary: "fake-kubectl".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "cluster unreachable"),
            });
        }
        Ok(self.ready)
    }
}

impl Cluster for FakeCluster {
    type Watcher = FakeWatcher;

    fn new_watcher(&self) -> Self::Watcher {
        FakeWatcher {
            calls: Rc::clone(&self.calls),
            ready: self.ready,
            fail_wait: self.fail_wait,
            block_cleanup: self.block_cleanup,
            registered: Vec::new(),
        }
    }

    fn apply(&self, rendered: &[PathBuf]) -> Result<(), ApplyError> {
        if self.fail_apply {
            return Err(ApplyError::BinaryNotFound {
                binary: "fake-kubectl".to_string(),
            });
        }
        self.calls.borrow_mut().applies.push(rendered.to_vec());
        Ok(())
    }
}
